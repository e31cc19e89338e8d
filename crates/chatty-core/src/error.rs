use thiserror::Error;

/// Why an operation was refused. Every variant is user-correctable or an
/// invariant guard; none of them leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("message is empty")]
    EmptyMessage,
    #[error("non-friends can only send messages up to {limit} words (this one has {words})")]
    TooManyWords { words: usize, limit: usize },
    #[error("you cannot befriend yourself")]
    SelfRelationship,
    #[error("you are already friends")]
    AlreadyFriends,
    #[error("a friend request is already pending")]
    RequestAlreadyPending,
    #[error("they already sent you a request; accept it instead")]
    ReverseRequestPending,
    #[error("there is no pending request from this user")]
    NoPendingRequest,
    #[error("unknown user")]
    UnknownUser,
    #[error("invalid user id; ids may not be empty or contain '{separator}'")]
    InvalidUserId { separator: char },
    #[error("unknown message")]
    UnknownMessage,
    #[error("unknown post")]
    UnknownPost,
    #[error("message is not a game awaiting a result")]
    NotAGame,
    #[error("this game is already resolved")]
    GameAlreadyResolved,
    #[error("only the challenged participant can resolve this game")]
    NotGameRecipient,
    #[error("a game can only move from pending to completed or failed")]
    InvalidGameTransition,
    #[error("username must be at least {min} characters")]
    UsernameTooShort { min: usize },
    #[error("username is taken")]
    UsernameTaken,
    #[error("nothing to work with; type something first")]
    EmptyPrompt,
}

impl Rejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "empty_message",
            Self::TooManyWords { .. } => "too_many_words",
            Self::SelfRelationship => "self_relationship",
            Self::AlreadyFriends => "already_friends",
            Self::RequestAlreadyPending => "request_already_pending",
            Self::ReverseRequestPending => "reverse_request_pending",
            Self::NoPendingRequest => "no_pending_request",
            Self::UnknownUser => "unknown_user",
            Self::InvalidUserId { .. } => "invalid_user_id",
            Self::UnknownMessage => "unknown_message",
            Self::UnknownPost => "unknown_post",
            Self::NotAGame => "not_a_game",
            Self::GameAlreadyResolved => "game_already_resolved",
            Self::NotGameRecipient => "not_game_recipient",
            Self::InvalidGameTransition => "invalid_game_transition",
            Self::UsernameTooShort { .. } => "username_too_short",
            Self::UsernameTaken => "username_taken",
            Self::EmptyPrompt => "empty_prompt",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Policy or invariant refusal, surfaced to the caller as-is.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Store read/write failure. Retryable by the caller.
    #[error("store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            Self::Store(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
