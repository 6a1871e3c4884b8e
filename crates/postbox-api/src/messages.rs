use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::info;

use postbox_db::StoreError;
use postbox_types::api::{MessageListResponse, MessageRequest, MessageResponse};
use postbox_types::models::NewMessage;

use crate::error::{ApiError, render};
use crate::extract::JsonBody;
use crate::middleware::{Identity, OwnedMessage};
use crate::state::{AppState, with_db};

/// POST / — send a message to one or more users.
pub async fn create_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(req): JsonBody<MessageRequest>,
) -> Result<Response, ApiError> {
    validate_message(&req)?;

    let msg = NewMessage {
        content: req.content,
        sender_id: identity.user_id,
        sent_at: Utc::now(),
    };
    let recipients = req.recipients;

    let message_id = with_db(&state, "create message", move |db| {
        db.create_message(&msg, &recipients)
    })
    .await?
    .map_err(|e| classify_write_error("create message", e))?;

    info!(message_id, sender_id = identity.user_id, "Message created");
    Ok(StatusCode::CREATED.into_response())
}

/// GET / — every message the caller is a recipient of.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Response, ApiError> {
    let user_id = identity.user_id;
    let messages = with_db(&state, "list messages", move |db| {
        db.get_messages_for_recipient(user_id)
    })
    .await?
    .map_err(|e| ApiError::internal("list messages", e))?;

    Ok(render(
        StatusCode::OK,
        &MessageListResponse {
            messages: messages.into_iter().map(MessageResponse::from).collect(),
        },
    ))
}

/// POST /{id}/ — replace content and the whole recipient set.
pub async fn update_message(
    State(state): State<AppState>,
    Extension(OwnedMessage(msg)): Extension<OwnedMessage>,
    JsonBody(req): JsonBody<MessageRequest>,
) -> Result<Response, ApiError> {
    validate_message(&req)?;

    let message_id = msg.id;
    let updated_at = Utc::now();
    with_db(&state, "update message", move |db| {
        db.update_message(message_id, &req.content, updated_at, &req.recipients)
    })
    .await?
    .map_err(|e| classify_write_error("update message", e))?;

    info!(message_id, "Message updated");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// DELETE /{id}/
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(OwnedMessage(msg)): Extension<OwnedMessage>,
) -> Result<Response, ApiError> {
    let message_id = msg.id;
    with_db(&state, "delete message", move |db| db.delete_message(message_id))
        .await?
        .map_err(|e| classify_write_error("delete message", e))?;

    info!(message_id, "Message deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn validate_message(req: &MessageRequest) -> Result<(), ApiError> {
    if req.content.is_empty() {
        return Err(ApiError::Validation("content is empty".into()));
    }
    if req.recipients.is_empty() {
        return Err(ApiError::Validation("recipients is empty".into()));
    }
    Ok(())
}

fn classify_write_error(op: &'static str, err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::NotFound("invalid message id".into()),
        StoreError::Duplicate => ApiError::Duplicate("duplicate recipient".into()),
        StoreError::UnknownReference => ApiError::Validation("unknown recipient".into()),
        e @ (StoreError::Sqlite(_) | StoreError::Poisoned) => {
            ApiError::internal(op, e)
        }
    }
}
