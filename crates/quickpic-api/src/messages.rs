use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use uuid::Uuid;

use quickpic_core::OutgoingMessage;
use quickpic_types::api::{InfoResponse, MessageResponse, SendMessageRequest, SendMessageResponse};
use quickpic_types::models::MessageWithSender;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam};
use crate::middleware::AuthUser;
use crate::state::{AppState, blocking};

pub async fn send_message(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    WithRejection(Json(req), _): JsonBody<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let encrypted_content = B64
        .decode(&req.encrypted_content)
        .map_err(|_| ApiError::BadRequest("encrypted_content must be base64".into()))?;

    let outgoing = OutgoingMessage {
        encrypted_content,
        content_type: req.content_type,
        signature: req.signature,
    };
    let message = blocking(&state, move |s| s.relay.send(user_id, &req.to_username, outgoing)).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            id: message.id,
            created_at: message.created_at,
        }),
    ))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let pending = blocking(&state, move |s| s.relay.fetch(user_id)).await?;
    Ok(Json(pending.into_iter().map(to_response).collect()))
}

pub async fn acknowledge(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    WithRejection(Path(message_id), _): PathParam<Uuid>,
) -> Result<Json<InfoResponse>, ApiError> {
    blocking(&state, move |s| s.relay.acknowledge(message_id, user_id)).await?;
    Ok(Json(InfoResponse::new("message acknowledged and deleted")))
}

fn to_response(m: MessageWithSender) -> MessageResponse {
    MessageResponse {
        id: m.message.id,
        from_user_id: m.message.from_user_id,
        to_user_id: m.message.to_user_id,
        encrypted_content: B64.encode(&m.message.encrypted_content),
        content_type: m.message.content_type,
        signature: m.message.signature,
        created_at: m.message.created_at,
        from_username: m.from_username,
        from_public_key: m.from_public_key,
        from_signing_key: m.from_signing_key,
    }
}
