use serde::{Deserialize, Serialize};

use crate::models::{GameStatus, Message, PersonaDetails, User};

// -- JWT Claims --

/// Claims of the bearer token issued by the external authenticator.
/// `sub` is the stable user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

// -- Profiles --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupProfileRequest {
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_style: Option<String>,
}

// -- Relationships --

#[derive(Debug, Deserialize)]
pub struct PeopleQuery {
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeopleEntry {
    pub user: User,
    pub request_sent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactRelation {
    Friend,
    Match,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactEntry {
    pub user: User,
    pub relation: ContactRelation,
}

// -- Discovery --

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryResponse {
    pub position: usize,
    pub candidate: Option<User>,
    pub exhausted: bool,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub voice_note: Option<String>,
    #[serde(default)]
    pub is_ephemeral: bool,
    /// Sender clock, epoch millis. Filled in by the server when absent.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameStatusRequest {
    pub status: GameStatus,
}

#[derive(Debug, Serialize)]
pub struct SeenResponse {
    pub updated: usize,
}

// -- Assist modes --

/// Language register for generated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    #[default]
    Hinglish,
    Hindi,
}

impl Register {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hinglish => "hinglish",
            Self::Hindi => "hindi",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftRequest {
    pub draft: String,
    #[serde(default)]
    pub register: Register,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonaQueryRequest {
    pub query: String,
    #[serde(default)]
    pub register: Register,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    /// `None` when generation failed or produced nothing.
    pub text: Option<String>,
}

/// Result of a mode that posts into the channel. `message` is `None` when
/// generation degraded.
#[derive(Debug, Serialize)]
pub struct GeneratedMessageResponse {
    pub message: Option<Message>,
}

pub type PersonaDetailsRequest = PersonaDetails;

// -- Feed --

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub liked: bool,
}
