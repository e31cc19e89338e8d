use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use chatty_types::api::{Claims, CreatePostRequest, PostQuery, ToggleLikeResponse};

use crate::auth::AppState;
use crate::error::ApiResult;

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let posts = state.engine.feed().list_posts(query.user.as_deref()).await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    let post = state
        .engine
        .feed()
        .create_post(&claims.sub, req.content, req.image)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let liked = state.engine.feed().toggle_post_like(&post_id, &claims.sub).await?;
    Ok(Json(ToggleLikeResponse { liked }))
}
