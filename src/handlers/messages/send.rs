use axum::{extract::State, Extension};
use chrono::Utc;
use futures::future::try_join_all;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::message::{CONTENT_MAX_LENGTH, MAX_RECIPIENTS, SUBJECT_MAX_LENGTH};
use crate::database::models::MessageDocument;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Session};
use crate::services::messages::{
    can_access, get_client_message, get_message_by_unsafe_id, reply_recipients, reply_subject, uniq,
    update_unread_messages_for, ClientMessage,
};
use crate::services::users::get_user_by_unsafe_id;
use crate::state::AppState;
use crate::types::validate_length;

/// Either `{to, subject, content}` or `{replyTo, content}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub to: Option<Vec<String>>,
    pub subject: Option<String>,
    pub reply_to: Option<String>,
    pub content: String,
}

enum Addressing {
    Direct { to: Vec<String>, subject: String },
    Reply { reply_to: String },
}

impl SendMessageRequest {
    fn addressing(&mut self) -> Result<Addressing, ApiError> {
        match (self.to.take(), self.subject.take(), self.reply_to.take()) {
            (Some(to), Some(subject), None) => Ok(Addressing::Direct { to, subject }),
            (None, None, Some(reply_to)) => Ok(Addressing::Reply { reply_to }),
            _ => Err(ApiError::bad_request(
                "A message must specify either `to` and `subject`, or `replyTo`.",
            )),
        }
    }
}

/// POST /api/messages
pub async fn message_send(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(mut body): ApiJson<SendMessageRequest>,
) -> ApiResult<ClientMessage> {
    let addressing = body.addressing()?;
    let user = session.require("You must be signed in to send messages.")?;

    if body.content.trim().is_empty() {
        return Err(ApiError::invalid_field("content", "Content cannot be empty"));
    }
    validate_length(&body.content, CONTENT_MAX_LENGTH).map_err(|e| ApiError::invalid_field("content", e))?;

    let (reply_to, recipients, subject) = match addressing {
        Addressing::Direct { to, subject } => {
            if subject.trim().is_empty() {
                return Err(ApiError::invalid_field("subject", "Subject cannot be empty"));
            }
            validate_length(&subject, SUBJECT_MAX_LENGTH).map_err(|e| ApiError::invalid_field("subject", e))?;
            if to.is_empty() || to.len() > MAX_RECIPIENTS {
                return Err(ApiError::invalid_field(
                    "to",
                    format!("A message must have between 1 and {} recipients", MAX_RECIPIENTS),
                ));
            }

            let users = state.users.as_ref();
            let resolved = try_join_all(to.iter().map(|id| get_user_by_unsafe_id(users, id))).await?;
            let recipients = uniq(resolved.into_iter().map(|recipient| recipient.id));

            (None, recipients, subject)
        }
        Addressing::Reply { reply_to } => {
            let replied = get_message_by_unsafe_id(state.messages.as_ref(), &reply_to).await?;
            if !can_access(&replied, user) {
                return Err(ApiError::forbidden(
                    "You do not have permission to reply to the specified message.",
                ));
            }

            (
                Some(replied.id),
                reply_recipients(&replied, user.id),
                reply_subject(&replied.subject),
            )
        }
    };

    let message = MessageDocument {
        id: Uuid::new_v4(),
        reply_to,
        sent: Utc::now(),
        edited: None,
        from: user.id,
        not_deleted_by: uniq(std::iter::once(user.id).chain(recipients.iter().copied())),
        not_read_by: recipients.clone(),
        to: recipients,
        subject,
        content: body.content,
    };

    state.messages.insert(&message).await?;
    update_unread_messages_for(state.users.as_ref(), state.messages.as_ref(), &message.not_read_by).await?;

    tracing::info!(
        message_id = %message.id,
        from = %user.id,
        recipients = message.to.len(),
        "Message sent"
    );

    Ok(ApiResponse::created(get_client_message(&message, user)))
}
