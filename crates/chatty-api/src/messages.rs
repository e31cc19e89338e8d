use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use chatty_core::stream::OutgoingMessage;
use chatty_types::api::{Claims, GameStatusRequest, PersonaDetailsRequest, SeenResponse, SendMessageRequest};

use crate::auth::AppState;
use crate::error::ApiResult;

/// The caller's channel with `peer`, oldest first. A channel only ever
/// involves the caller, so there is nothing else to authorize.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let stream = state.engine.stream();
    let channel = stream.channel_for(&claims.sub, &peer_id);
    Ok(Json(stream.history(&channel).await?))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let outgoing = OutgoingMessage {
        sender_id: claims.sub,
        receiver_id: peer_id,
        content: req.content,
        image: req.image,
        voice_note: req.voice_note,
        timestamp: req.timestamp,
        is_ephemeral: req.is_ephemeral,
        ..Default::default()
    };
    let message = state.engine.stream().send(outgoing).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn set_game_status(
    State(state): State<AppState>,
    Path((peer_id, message_id)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<GameStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = state
        .engine
        .stream()
        .advance_game_status(&claims.sub, &peer_id, &message_id, req.status)
        .await?;
    Ok(Json(message))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let updated = state.engine.stream().mark_seen(&claims.sub, &peer_id).await?;
    Ok(Json(SeenResponse { updated }))
}

pub async fn get_persona_details(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let stream = state.engine.stream();
    let channel = stream.channel_for(&claims.sub, &peer_id);
    Ok(Json(stream.get_persona_details(&channel).await?))
}

/// Stores the caller's own birth details for this channel.
pub async fn set_persona_details(
    State(state): State<AppState>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PersonaDetailsRequest>,
) -> ApiResult<impl IntoResponse> {
    let stream = state.engine.stream();
    let channel = stream.channel_for(&claims.sub, &peer_id);
    Ok(Json(stream.set_persona_details(&channel, &claims.sub, req).await?))
}
