use std::time::Duration;

/// Engine tunables. Defaults match the production client.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model hint passed to the completion service.
    pub model: String,
    /// Upper bound on a single completion call.
    pub completion_timeout: Duration,
    /// Artificial latency before an automated reply is appended.
    pub reply_delay: Duration,
    /// Word limit for messages between users who are not friends.
    pub non_friend_word_limit: usize,
    /// Ephemeral messages older than this are deleted. Zero keeps the flag display-only.
    pub ephemeral_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-flash-preview".into(),
            completion_timeout: Duration::from_secs(20),
            reply_delay: Duration::from_millis(1500),
            non_friend_word_limit: 50,
            ephemeral_ttl: Duration::ZERO,
        }
    }
}
