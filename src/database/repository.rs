//! Collection accessors. Handlers only see these traits; the PostgreSQL
//! implementations live in `database::postgres`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{ComicDocument, ComicId, MessageDocument, ProfileUpdate, UserDocument};
use crate::perms::Perm;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserDocument>, DatabaseError>;

    /// Look up a user by verified email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserDocument>, DatabaseError>;

    /// Whether any user has `email` as their verified or unverified email.
    async fn email_taken(&self, email: &str) -> Result<bool, DatabaseError>;

    /// Fails with `DatabaseError::Conflict` when the email is already used.
    async fn insert(&self, user: &UserDocument) -> Result<(), DatabaseError>;

    /// Write only the profile fields named in `update`, returning the stored
    /// user. Email conflicts fail with `DatabaseError::Conflict`.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<UserDocument, DatabaseError>;

    async fn set_perms(&self, id: Uuid, perms: Perm, perm_level: Option<u32>) -> Result<UserDocument, DatabaseError>;

    async fn touch_last_seen(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError>;

    async fn set_unread_message_count(&self, id: Uuid, count: u32) -> Result<(), DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: &MessageDocument) -> Result<(), DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MessageDocument>, DatabaseError>;

    /// Messages still kept by `user_id`, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<MessageDocument>, DatabaseError>;

    /// Messages `user_id` has neither read nor deleted.
    async fn count_unread(&self, user_id: Uuid) -> Result<u32, DatabaseError>;

    async fn edit_content(
        &self,
        id: Uuid,
        content: &str,
        edited: DateTime<Utc>,
    ) -> Result<Option<MessageDocument>, DatabaseError>;

    /// Mark the message read or unread for `user_id`. `None` when the message
    /// is gone or the user no longer keeps it.
    async fn set_read(&self, id: Uuid, user_id: Uuid, read: bool) -> Result<Option<MessageDocument>, DatabaseError>;

    /// Drop `user_id` from the message's keepers, deleting the message once
    /// nobody keeps it. `None` when the user was not keeping it.
    async fn remove_keeper(&self, id: Uuid, user_id: Uuid) -> Result<Option<MessageDocument>, DatabaseError>;

    /// Delete for everyone, returning the message as it was removed.
    async fn delete(&self, id: Uuid) -> Result<Option<MessageDocument>, DatabaseError>;
}

#[async_trait]
pub trait ComicRepository: Send + Sync {
    /// Store a new comic, returning it with its assigned ID.
    async fn insert(&self, comic: ComicDocument) -> Result<ComicDocument, DatabaseError>;

    async fn find_by_id(&self, id: ComicId) -> Result<Option<ComicDocument>, DatabaseError>;

    /// Comics the user owns or edits, oldest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ComicDocument>, DatabaseError>;

    /// Hold the comic exclusively until the lock is committed or dropped.
    async fn lock(&self, id: ComicId) -> Result<Option<Box<dyn ComicLock>>, DatabaseError>;

    async fn delete(&self, id: ComicId) -> Result<(), DatabaseError>;
}

/// An exclusively held comic. Edits made through `comic_mut` are stored by
/// `commit`; dropping the lock discards them.
#[async_trait]
pub trait ComicLock: Send {
    fn comic(&self) -> &ComicDocument;

    fn comic_mut(&mut self) -> &mut ComicDocument;

    async fn commit(self: Box<Self>) -> Result<ComicDocument, DatabaseError>;
}

/// Backing-store liveness for `/health`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;
}
