use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Empty until profile setup completes.
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub avatar_style: Option<String>,
    pub bio: Option<String>,
    pub is_bot: bool,
    /// Extra prompt framing for automated counterparts.
    pub persona: Option<String>,
    pub friends: BTreeSet<String>,
    pub sent_requests: BTreeSet<String>,
    pub received_requests: BTreeSet<String>,
    pub liked_profiles: BTreeSet<String>,
}

impl User {
    pub fn is_profile_complete(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn is_friend(&self, other_id: &str) -> bool {
        self.friends.contains(other_id)
    }

    /// Resolves the bot flag into the participant variant used at send time.
    pub fn participant(&self) -> Participant {
        if self.is_bot {
            Participant::Automated(Persona {
                username: self.username.clone(),
                prompt: self.persona.clone(),
            })
        } else {
            Participant::Human
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participant {
    Human,
    Automated(Persona),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub username: String,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    TruthDare,
    Astro,
    Report,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TruthDare => "truthdare",
            Self::Astro => "astro",
            Self::Report => "report",
        }
    }
}

impl FromStr for GameType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "truthdare" => Ok(Self::TruthDare),
            "astro" => Ok(Self::Astro),
            "report" => Ok(Self::Report),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Lifecycle of an interactive game message: `pending` moves to exactly one
/// terminal state and never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Pending,
    Completed,
    Failed,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn can_transition_to(&self, next: GameStatus) -> bool {
        matches!(self, Self::Pending) && next.is_terminal()
    }
}

impl FromStr for GameStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Plain,
    Media,
    Voice,
    Ephemeral,
    Game,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned key.
    pub id: String,
    /// Store-assigned insertion order. The only ordering authority within a channel.
    pub seq: i64,
    pub channel_id: ChannelId,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub image: Option<String>,
    pub voice_note: Option<String>,
    /// Sender clock, epoch millis. Display only.
    pub timestamp: i64,
    pub is_ephemeral: bool,
    pub is_system: bool,
    pub game_type: Option<GameType>,
    pub status: Option<GameStatus>,
    pub has_been_seen: bool,
    /// Derived from the flags and attachments when the store reads the row.
    #[serde(default)]
    pub kind: MessageKind,
}

impl Message {
    pub fn is_game(&self) -> bool {
        self.game_type.is_some()
    }

    /// System beats game beats ephemeral beats voice beats image.
    pub fn classify(&self) -> MessageKind {
        if self.is_system {
            MessageKind::System
        } else if self.is_game() {
            MessageKind::Game
        } else if self.is_ephemeral {
            MessageKind::Ephemeral
        } else if self.voice_note.is_some() {
            MessageKind::Voice
        } else if self.image.is_some() {
            MessageKind::Media
        } else {
            MessageKind::Plain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub image: Option<String>,
    pub timestamp: i64,
    pub likes: BTreeSet<String>,
}

/// Per-channel, per-participant birth details used by the astro persona.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaDetails {
    pub name: String,
    pub dob: String,
    pub time: String,
    pub place: String,
}

/// `chatMetadata/{channel}/astro`: participant id -> details.
pub type ChatMetadata = BTreeMap<String, PersonaDetails>;
