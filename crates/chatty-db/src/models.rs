//! Insert payloads. Store-assigned fields (key, seq, store clock) are filled
//! in by the append queries.

use chatty_types::ChannelId;
use chatty_types::models::{GameStatus, GameType};

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub channel_id: ChannelId,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub image: Option<String>,
    pub voice_note: Option<String>,
    pub timestamp: i64,
    pub is_ephemeral: bool,
    pub is_system: bool,
    pub game_type: Option<GameType>,
    pub status: Option<GameStatus>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub image: Option<String>,
    pub timestamp: i64,
}

/// Profile fields written by profile setup.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub username: String,
    pub bio: Option<String>,
    pub avatar: String,
    pub avatar_style: Option<String>,
}

/// Relationship state between two users as seen from `a`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relation {
    pub friends: bool,
    /// `a` has a pending request to `b`.
    pub outgoing: bool,
    /// `b` has a pending request to `a`.
    pub incoming: bool,
}
