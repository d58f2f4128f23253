use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::warn;

use messagely_types::api::{Claims, ReadResponse, SendMessageRequest};
use messagely_types::models::MessageDetail;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::{is_correct_message_user, is_receiving_message_user};

/// GET /messages/{id} — only the sender and the recipient may read it.
pub async fn get_message(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageDetail>, ApiError> {
    let message = state.messages.get(id).await?;

    if !is_correct_message_user(&claims.username, &message) {
        warn!("{} is not a party to message {}", claims.username, id);
        return Err(ApiError::Unauthorized);
    }

    Ok(Json(message))
}

/// POST /messages — the sender is always the caller.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(from) = &req.from_username {
        if from != &claims.username {
            warn!("{} tried to send as {}", claims.username, from);
            return Err(ApiError::Unauthorized);
        }
    }

    let message = state
        .messages
        .create(&claims.username, &req.to_username, &req.body)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /messages/{id}/read — only the recipient may mark it read.
pub async fn mark_read(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ReadResponse>, ApiError> {
    if !is_receiving_message_user(&state.messages, &claims.username, id).await? {
        warn!("{} is not the recipient of message {}", claims.username, id);
        return Err(ApiError::Unauthorized);
    }

    let receipt = state.messages.mark_read(id).await?;
    Ok(Json(ReadResponse { message: receipt }))
}
