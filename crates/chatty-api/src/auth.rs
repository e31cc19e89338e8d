use std::sync::Arc;

use chatty_core::Engine;
use chatty_types::api::Claims;
use jsonwebtoken::{EncodingKey, Header, encode};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: Engine,
    pub jwt_secret: String,
}

/// Signs a bearer token the way the external authenticator does. Used by
/// local tooling and tests; production tokens come from the authenticator.
pub fn issue_token(secret: &str, user_id: &str, email: &str, ttl_secs: i64) -> anyhow::Result<String> {
    let exp = (chrono::Utc::now().timestamp() + ttl_secs).max(0) as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?;
    Ok(token)
}
