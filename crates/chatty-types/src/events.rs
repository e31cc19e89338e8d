use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::models::{ChatMetadata, Message, Post, User};

/// A subscribable subtree of the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorePath {
    /// `users`
    Users,
    /// `users/{id}`
    User(String),
    /// `messages/{channelId}`
    Messages(ChannelId),
    /// `posts`
    Posts,
    /// `chatMetadata/{channelId}`
    ChatMetadata(ChannelId),
}

impl StorePath {
    /// True if a change at `changed` alters the value under `self`.
    pub fn covers(&self, changed: &StorePath) -> bool {
        match (self, changed) {
            (Self::Users, Self::Users | Self::User(_)) => true,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Users => f.write_str("users"),
            Self::User(id) => write!(f, "users/{id}"),
            Self::Messages(channel) => write!(f, "messages/{channel}"),
            Self::Posts => f.write_str("posts"),
            Self::ChatMetadata(channel) => write!(f, "chatMetadata/{channel}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPath(pub String);

impl fmt::Display for InvalidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid store path '{}'", self.0)
    }
}

impl std::error::Error for InvalidPath {}

impl FromStr for StorePath {
    type Err = InvalidPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches('/');
        let (root, rest) = match trimmed.split_once('/') {
            Some((root, rest)) => (root, Some(rest)),
            None => (trimmed, None),
        };

        match (root, rest) {
            ("users", None) => Ok(Self::Users),
            ("users", Some(id)) if !id.is_empty() && !id.contains('/') => Ok(Self::User(id.to_string())),
            ("messages", Some(channel)) if !channel.is_empty() && !channel.contains('/') => {
                Ok(Self::Messages(ChannelId::from_raw(channel)))
            }
            ("posts", None) => Ok(Self::Posts),
            ("chatMetadata", Some(channel)) if !channel.is_empty() && !channel.contains('/') => {
                Ok(Self::ChatMetadata(ChannelId::from_raw(channel)))
            }
            _ => Err(InvalidPath(s.to_string())),
        }
    }
}

impl Serialize for StorePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StorePath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Full current value of a subscribed subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum SnapshotValue {
    User(Option<User>),
    Users(Vec<User>),
    /// In store-assigned order.
    Messages(Vec<Message>),
    /// Newest first.
    Posts(Vec<Post>),
    ChatMetadata(ChatMetadata),
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: String, username: String },

    /// Current value of a subscribed path, sent on subscribe and after every change
    Snapshot { path: StorePath, value: SnapshotValue },

    /// A generation call for this channel started or finished
    ResponderActivity { channel_id: ChannelId, active: bool },

    /// Non-fatal, user-visible notice addressed to one user
    Notice { user_id: String, message: String },
}

impl GatewayEvent {
    /// Returns the channel_id if this event is scoped to a specific channel.
    pub fn channel_id(&self) -> Option<&ChannelId> {
        match self {
            Self::ResponderActivity { channel_id, .. } => Some(channel_id),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Start live snapshots for these paths
    Subscribe { paths: Vec<StorePath> },

    /// Stop live snapshots for these paths
    Unsubscribe { paths: Vec<StorePath> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_parse_and_print() {
        for raw in ["users", "users/u1", "messages/a_b", "posts", "chatMetadata/a_b"] {
            let path: StorePath = raw.parse().unwrap();
            assert_eq!(path.to_string(), raw);
        }
        assert!("messages".parse::<StorePath>().is_err());
        assert!("users/a/b".parse::<StorePath>().is_err());
        assert!("friends/a".parse::<StorePath>().is_err());
    }

    #[test]
    fn users_covers_each_user() {
        let users = StorePath::Users;
        assert!(users.covers(&StorePath::User("u1".into())));
        assert!(!StorePath::User("u1".into()).covers(&StorePath::User("u2".into())));
        assert!(!users.covers(&StorePath::Posts));
    }

    #[test]
    fn subscribe_command_wire_format() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"Subscribe","data":{"paths":["messages/a_b","users/a"]}}"#).unwrap();
        match cmd {
            GatewayCommand::Subscribe { paths } => {
                assert_eq!(paths[0], StorePath::Messages(ChannelId::between("b", "a")));
                assert_eq!(paths[1], StorePath::User("a".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
