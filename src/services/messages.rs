//! Message delivery rules and unread bookkeeping.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::message::SUBJECT_MAX_LENGTH;
use crate::database::models::{MessageDocument, UserDocument};
use crate::database::repository::{MessageRepository, UserRepository};
use crate::error::ApiError;
use crate::perms::Perm;

/// A message as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
    pub sent: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited: Option<DateTime<Utc>>,
    pub from: Uuid,
    pub to: Vec<Uuid>,
    pub subject: String,
    pub content: String,
    pub read: bool,
}

pub fn get_client_message(message: &MessageDocument, viewer: &UserDocument) -> ClientMessage {
    ClientMessage {
        id: message.id,
        reply_to: message.reply_to,
        sent: message.sent,
        edited: message.edited,
        from: message.from,
        to: message.to.clone(),
        subject: message.subject.clone(),
        content: message.content.clone(),
        read: !message.is_unread_by(viewer.id),
    }
}

/// Whether `user` may read `message`. Participants lose access once they delete it.
pub fn can_access(message: &MessageDocument, user: &UserDocument) -> bool {
    message.not_deleted_by.contains(&user.id) || user.perms.intersects(Perm::SUDO_READ)
}

fn message_not_found() -> ApiError {
    ApiError::not_found("No message was found with the specified ID.")
}

/// Drop repeated IDs, keeping the first occurrence of each.
pub fn uniq(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut unique: Vec<Uuid> = Vec::new();
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

/// Subject of a reply: `Re: ` is prepended once, and anything past the
/// limit is cut to 49 characters plus an ellipsis.
pub fn reply_subject(subject: &str) -> String {
    let subject = if subject.starts_with("Re: ") {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    };

    if subject.chars().count() > SUBJECT_MAX_LENGTH {
        let mut truncated: String = subject.chars().take(SUBJECT_MAX_LENGTH - 1).collect();
        truncated.push('…');
        truncated
    } else {
        subject
    }
}

/// Recipients of a reply: the replied message's sender, then its other
/// recipients, never including the person replying (unless they sent it).
pub fn reply_recipients(replied: &MessageDocument, sender: Uuid) -> Vec<Uuid> {
    uniq(
        std::iter::once(replied.from).chain(replied.to.iter().copied().filter(|id| *id != sender)),
    )
}

/// Recompute and store a user's unread message count.
pub async fn update_unread_messages(
    users: &dyn UserRepository,
    messages: &dyn MessageRepository,
    user_id: Uuid,
) -> Result<u32, ApiError> {
    let count = messages.count_unread(user_id).await?;
    users.set_unread_message_count(user_id, count).await?;
    tracing::debug!(%user_id, count, "updated unread message count");
    Ok(count)
}

/// [`update_unread_messages`] for several users concurrently.
pub async fn update_unread_messages_for(
    users: &dyn UserRepository,
    messages: &dyn MessageRepository,
    user_ids: &[Uuid],
) -> Result<(), ApiError> {
    try_join_all(
        user_ids
            .iter()
            .map(|user_id| update_unread_messages(users, messages, *user_id)),
    )
    .await?;
    Ok(())
}

pub async fn get_message_by_unsafe_id(
    messages: &dyn MessageRepository,
    id: &str,
) -> Result<MessageDocument, ApiError> {
    let message = match Uuid::parse_str(id) {
        Ok(id) => messages.find_by_id(id).await?,
        Err(_) => None,
    };

    message.ok_or_else(message_not_found)
}

/// Turn a storage miss from a conditional message write into a 404.
pub fn found_message(message: Option<MessageDocument>) -> Result<MessageDocument, ApiError> {
    message.ok_or_else(message_not_found)
}
