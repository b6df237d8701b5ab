use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const SUBJECT_MAX_LENGTH: usize = 50;
pub const CONTENT_MAX_LENGTH: usize = 20_000;
pub const MAX_RECIPIENTS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct MessageDocument {
    pub id: Uuid,
    /// The message this is a reply to.
    pub reply_to: Option<Uuid>,
    pub sent: DateTime<Utc>,
    pub edited: Option<DateTime<Utc>>,
    pub from: Uuid,
    pub to: Vec<Uuid>,
    /// Participants who still keep the message in their inbox.
    pub not_deleted_by: Vec<Uuid>,
    /// Recipients who haven't read the message yet.
    pub not_read_by: Vec<Uuid>,
    pub subject: String,
    pub content: String,
}

impl MessageDocument {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.from == user_id || self.to.contains(&user_id)
    }

    pub fn is_unread_by(&self, user_id: Uuid) -> bool {
        self.not_read_by.contains(&user_id)
    }
}
