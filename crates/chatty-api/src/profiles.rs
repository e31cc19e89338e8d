use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use chatty_core::Rejection;
use chatty_types::api::{Claims, SetupProfileRequest};

use crate::auth::AppState;
use crate::error::ApiResult;

/// Current user, created as a placeholder on first sight.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = state.engine.profiles().ensure_user(&claims.sub, &claims.email).await?;
    Ok(Json(user))
}

pub async fn setup_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetupProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let profiles = state.engine.profiles();
    profiles.ensure_user(&claims.sub, &claims.email).await?;
    let user = profiles
        .setup_profile(&claims.sub, &req.username, req.bio, req.avatar_style)
        .await?;
    Ok(Json(user))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .engine
        .profiles()
        .get_user(&user_id)
        .await?
        .ok_or(Rejection::UnknownUser)?;
    Ok(Json(user))
}

/// Astro reading generated from the caller's bio.
pub async fn get_reading(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = state.engine.profiles().ensure_user(&claims.sub, &claims.email).await?;
    let reading = state.engine.responder().reading(&user).await;
    Ok(Json(json!({ "reading": reading })))
}
