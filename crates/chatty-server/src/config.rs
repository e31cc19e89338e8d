use std::time::Duration;

use anyhow::{Context, Result};
use chatty_core::EngineConfig;

const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Everything read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    /// Unset disables generation; every mode then degrades.
    pub completion_url: Option<String>,
    pub completion_key: Option<String>,
    pub seed_bots: bool,
    pub engine: EngineConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let defaults = EngineConfig::default();

        let port = var("CHATTY_PORT", "3000").parse().context("CHATTY_PORT")?;
        let timeout_secs: u64 = var("CHATTY_COMPLETION_TIMEOUT_SECS", "20")
            .parse()
            .context("CHATTY_COMPLETION_TIMEOUT_SECS")?;
        let reply_delay_ms: u64 = var("CHATTY_REPLY_DELAY_MS", "1500")
            .parse()
            .context("CHATTY_REPLY_DELAY_MS")?;
        let word_limit: usize = var("CHATTY_NON_FRIEND_WORD_LIMIT", "50")
            .parse()
            .context("CHATTY_NON_FRIEND_WORD_LIMIT")?;
        let ttl_secs: u64 = var("CHATTY_EPHEMERAL_TTL_SECS", "0")
            .parse()
            .context("CHATTY_EPHEMERAL_TTL_SECS")?;
        let seed_bots = !matches!(
            var("CHATTY_SEED_BOTS", "true").to_lowercase().as_str(),
            "false" | "0" | "no"
        );

        Ok(Self {
            host: var("CHATTY_HOST", "0.0.0.0"),
            port,
            db_path: var("CHATTY_DB_PATH", "chatty.db"),
            jwt_secret: var("CHATTY_JWT_SECRET", DEFAULT_JWT_SECRET),
            completion_url: lookup("CHATTY_COMPLETION_URL").filter(|u| !u.trim().is_empty()),
            completion_key: lookup("CHATTY_COMPLETION_KEY").filter(|k| !k.is_empty()),
            seed_bots,
            engine: EngineConfig {
                model: var("CHATTY_COMPLETION_MODEL", &defaults.model),
                completion_timeout: Duration::from_secs(timeout_secs),
                reply_delay: Duration::from_millis(reply_delay_ms),
                non_friend_word_limit: word_limit,
                ephemeral_ttl: Duration::from_secs(ttl_secs),
            },
        })
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, "chatty.db");
        assert!(cfg.completion_url.is_none());
        assert!(cfg.seed_bots);
        assert!(cfg.uses_default_secret());
        assert_eq!(cfg.engine.non_friend_word_limit, 50);
        assert_eq!(cfg.engine.reply_delay, Duration::from_millis(1500));
        assert!(cfg.engine.ephemeral_ttl.is_zero());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("CHATTY_PORT", "8080"),
            ("CHATTY_COMPLETION_URL", "https://llm.example/v1beta"),
            ("CHATTY_SEED_BOTS", "false"),
            ("CHATTY_EPHEMERAL_TTL_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.completion_url.as_deref(), Some("https://llm.example/v1beta"));
        assert!(!cfg.seed_bots);
        assert_eq!(cfg.engine.ephemeral_ttl, Duration::from_secs(30));
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("CHATTY_PORT", "eighty")]).is_err());
    }
}
