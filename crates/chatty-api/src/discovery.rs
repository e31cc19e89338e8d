use axum::{Extension, Json, extract::State, response::IntoResponse};

use chatty_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiResult;

pub async fn current(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.discovery().current(&claims.sub).await?))
}

pub async fn like(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.discovery().like(&claims.sub).await?))
}

pub async fn skip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.discovery().skip(&claims.sub).await?))
}

pub async fn refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.discovery().refresh(&claims.sub).await?))
}
