use std::fmt;

use serde::{Deserialize, Serialize};

/// Joins the two participant ids of a channel.
pub const CHANNEL_SEPARATOR: char = '_';

/// Address of the message stream between two users.
///
/// Derived from the participant ids alone: both ids are sorted and joined
/// with `_`, so either participant computes the same value without any
/// negotiation. Ids are used verbatim; authenticated ids never contain the
/// separator, only the built-in persona ids do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn between(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{first}{CHANNEL_SEPARATOR}{second}"))
    }

    /// Wraps an id read back from storage or a subscription path.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The other participant, if `between(user_id, peer)` yields exactly
    /// this channel.
    pub fn peer_of(&self, user_id: &str) -> Option<&str> {
        let as_first = self
            .0
            .strip_prefix(user_id)
            .and_then(|rest| rest.strip_prefix(CHANNEL_SEPARATOR))
            .filter(|peer| user_id <= *peer);
        let as_second = || {
            self.0
                .strip_suffix(user_id)
                .and_then(|rest| rest.strip_suffix(CHANNEL_SEPARATOR))
                .filter(|peer| *peer <= user_id)
        };
        as_first.or_else(as_second)
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.peer_of(user_id).is_some()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commutative() {
        assert_eq!(ChannelId::between("alice", "bob"), ChannelId::between("bob", "alice"));
        assert_eq!(ChannelId::between("bob", "alice").as_str(), "alice_bob");
    }

    #[test]
    fn deterministic() {
        let first = ChannelId::between("uid-9", "uid-10");
        for _ in 0..10 {
            assert_eq!(ChannelId::between("uid-10", "uid-9"), first);
        }
    }

    #[test]
    fn distinct_pairs_get_distinct_channels() {
        let ab = ChannelId::between("a", "b");
        let ac = ChannelId::between("a", "c");
        let bc = ChannelId::between("b", "c");
        assert_ne!(ab, ac);
        assert_ne!(ab, bc);
        assert_ne!(ac, bc);
    }

    #[test]
    fn involves_participants_only() {
        let channel = ChannelId::between("alice", "bob");
        assert!(channel.involves("alice"));
        assert!(channel.involves("bob"));
        assert!(!channel.involves("ali"));
        assert!(!channel.involves("carol"));
        assert_eq!(channel.peer_of("alice"), Some("bob"));
        assert_eq!(channel.peer_of("bob"), Some("alice"));
    }

    #[test]
    fn separator_inside_an_id_grants_nothing() {
        let channel = ChannelId::between("bot_1", "zed");
        assert_eq!(channel.as_str(), "bot_1_zed");
        assert!(!channel.involves("bot"));
        assert!(!channel.involves("1_zed"));
        assert_eq!(channel.peer_of("zed"), Some("bot_1"));
        assert_eq!(channel.peer_of("bot_1"), Some("zed"));

        let channel = ChannelId::between("abc", "bot_1");
        assert!(!channel.involves("1"));
        assert!(!channel.involves("abc_bot"));
        assert_eq!(channel.peer_of("abc"), Some("bot_1"));
    }
}
