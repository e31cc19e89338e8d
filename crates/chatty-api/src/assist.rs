use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use chatty_types::api::{
    Claims, DraftRequest, GeneratedMessageResponse, PersonaQueryRequest, SuggestionsResponse, TranslateResponse,
};

use crate::auth::AppState;
use crate::error::ApiResult;

// -- Draft helpers: nothing is posted --

pub async fn rephrase(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DraftRequest>,
) -> ApiResult<impl IntoResponse> {
    let suggestions = state
        .engine
        .responder()
        .rephrase(&claims.sub, &peer_id, &req.draft, req.register)
        .await?;
    Ok(Json(SuggestionsResponse { suggestions }))
}

pub async fn translate(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DraftRequest>,
) -> ApiResult<impl IntoResponse> {
    let text = state
        .engine
        .responder()
        .translate(&claims.sub, &peer_id, &req.draft)
        .await?;
    Ok(Json(TranslateResponse { text }))
}

pub async fn suggest(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let suggestions = state.engine.responder().suggest(&claims.sub, &peer_id).await?;
    Ok(Json(SuggestionsResponse { suggestions }))
}

// -- Games: the result is posted into the channel --

pub async fn truth_or_dare(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let message = state.engine.responder().truth_or_dare(&claims.sub, &peer_id).await?;
    Ok(Json(GeneratedMessageResponse { message }))
}

pub async fn report(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let message = state
        .engine
        .responder()
        .relationship_report(&claims.sub, &peer_id)
        .await?;
    Ok(Json(GeneratedMessageResponse { message }))
}

pub async fn astro(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PersonaQueryRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = state
        .engine
        .responder()
        .persona_query(&claims.sub, &peer_id, &req.query, req.register)
        .await?;
    Ok(Json(GeneratedMessageResponse { message }))
}
