use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use chatty_core::graph::AcceptOutcome;
use chatty_types::api::{Claims, PeopleQuery};

use crate::auth::AppState;
use crate::error::ApiResult;

pub async fn people(
    State(state): State<AppState>,
    Query(query): Query<PeopleQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let entries = state.engine.graph().people(&claims.sub, &query.search).await?;
    Ok(Json(entries))
}

pub async fn contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let entries = state.engine.graph().contacts(&claims.sub).await?;
    Ok(Json(entries))
}

pub async fn send_request(
    State(state): State<AppState>,
    Path(to_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state.engine.graph().send_friend_request(&claims.sub, &to_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn accept_request(
    State(state): State<AppState>,
    Path(from_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.engine.graph().accept_friend_request(&claims.sub, &from_id).await?;
    Ok(Json(json!({ "accepted": outcome == AcceptOutcome::Accepted })))
}

pub async fn decline_request(
    State(state): State<AppState>,
    Path(from_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state.engine.graph().decline_friend_request(&claims.sub, &from_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
