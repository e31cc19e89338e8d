use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use chatty_types::api::Claims;
use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::auth::AppState;

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = verify_token(&state.jwt_secret, token).ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_token;

    #[test]
    fn issued_tokens_verify_with_the_same_secret() {
        let token = issue_token("s3cret", "u1", "u1@test", 3600).unwrap();
        let claims = verify_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "u1@test");

        assert!(verify_token("other", &token).is_none());
    }

    #[test]
    fn expired_tokens_are_refused() {
        let token = issue_token("s3cret", "u1", "", -3600).unwrap();
        assert!(verify_token("s3cret", &token).is_none());
    }
}
