use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;

use crate::database::models::message::CONTENT_MAX_LENGTH;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Session};
use crate::perms::Perm;
use crate::services::messages::{
    can_access, found_message, get_client_message, get_message_by_unsafe_id, update_unread_messages,
    update_unread_messages_for, ClientMessage,
};
use crate::state::AppState;
use crate::types::validate_length;

/// GET /api/messages/:messageID
pub async fn message_get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(message_id): Path<String>,
) -> ApiResult<ClientMessage> {
    let user = session.require("You must be signed in to view messages.")?;
    let message = get_message_by_unsafe_id(state.messages.as_ref(), &message_id).await?;

    if !can_access(&message, user) {
        return Err(ApiError::forbidden("You do not have permission to access the specified message."));
    }

    Ok(ApiResponse::success(get_client_message(&message, user)))
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

/// PATCH /api/messages/:messageID - edit content (sender or sudoWrite)
pub async fn message_patch(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(message_id): Path<String>,
    ApiJson(body): ApiJson<EditMessageRequest>,
) -> ApiResult<ClientMessage> {
    let user = session.require("You must be signed in to edit messages.")?;
    let message = get_message_by_unsafe_id(state.messages.as_ref(), &message_id).await?;

    if message.from != user.id && !user.perms.intersects(Perm::SUDO_WRITE) {
        return Err(ApiError::forbidden("You do not have permission to edit the specified message."));
    }

    if body.content.trim().is_empty() {
        return Err(ApiError::invalid_field("content", "Content cannot be empty"));
    }
    validate_length(&body.content, CONTENT_MAX_LENGTH).map_err(|e| ApiError::invalid_field("content", e))?;

    let edited = state.messages.edit_content(message.id, &body.content, Utc::now()).await?;
    let message = found_message(edited)?;

    Ok(ApiResponse::success(get_client_message(&message, user)))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub read: bool,
}

/// PUT /api/messages/:messageID/read - mark read or unread for yourself
pub async fn message_read_put(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(message_id): Path<String>,
    ApiJson(body): ApiJson<MarkReadRequest>,
) -> ApiResult<ClientMessage> {
    let user = session.require("You must be signed in to read messages.")?;
    let message = get_message_by_unsafe_id(state.messages.as_ref(), &message_id).await?;

    if !message.to.contains(&user.id) {
        return Err(ApiError::forbidden("Only recipients of the specified message can mark it as read."));
    }
    if message.is_unread_by(user.id) != body.read && message.not_deleted_by.contains(&user.id) {
        return Ok(ApiResponse::success(get_client_message(&message, user)));
    }

    // A recipient who deleted the message gets a miss here, not a resurrected unread flag.
    let message = found_message(state.messages.set_read(message.id, user.id, body.read).await?)?;
    update_unread_messages(state.users.as_ref(), state.messages.as_ref(), user.id).await?;

    Ok(ApiResponse::success(get_client_message(&message, user)))
}

/// DELETE /api/messages/:messageID
///
/// Participants delete the message for themselves only; it is removed from
/// storage once no participant keeps it. Staff with sudoDelete who are not
/// participants remove it for everyone.
pub async fn message_delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(message_id): Path<String>,
) -> ApiResult<()> {
    let user = session.require("You must be signed in to delete messages.")?;
    let message = get_message_by_unsafe_id(state.messages.as_ref(), &message_id).await?;

    let affected = if message.is_participant(user.id) {
        let kept = found_message(state.messages.remove_keeper(message.id, user.id).await?)?;
        if kept.not_deleted_by.is_empty() {
            tracing::debug!(message_id = %kept.id, "Message deleted by every participant");
        }
        vec![user.id]
    } else if user.perms.intersects(Perm::SUDO_DELETE) {
        let message = found_message(state.messages.delete(message.id).await?)?;
        tracing::info!(message_id = %message.id, deleted_by = %user.id, "Message deleted by staff");
        message
            .not_read_by
            .iter()
            .copied()
            .filter(|id| message.not_deleted_by.contains(id))
            .collect()
    } else {
        return Err(ApiError::forbidden("You do not have permission to delete the specified message."));
    };

    update_unread_messages_for(state.users.as_ref(), state.messages.as_ref(), &affected).await?;

    Ok(ApiResponse::no_content())
}
