use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::user::{UserDocument, UserSettings};
use crate::database::repository::UserRepository;
use crate::error::ApiError;
use crate::perms::Perm;

/// A user as anyone may see them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub created: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
}

impl From<&UserDocument> for PublicUser {
    fn from(user: &UserDocument) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            created: user.created,
            last_seen: user.last_seen,
            description: user.description.clone(),
            icon: user.icon.clone(),
            site: user.site.clone(),
            email: user.email.clone().filter(|_| user.settings.email_public),
            birthdate: user.birthdate.filter(|_| user.settings.birthdate_public),
        }
    }
}

/// A user as they (or staff) see themselves. Never carries secrets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateUser {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unverified_email: Option<String>,
    pub name: String,
    pub created: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    pub perms: Perm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perm_level: Option<u32>,
    pub unread_message_count: u32,
    pub settings: UserSettings,
}

impl From<&UserDocument> for PrivateUser {
    fn from(user: &UserDocument) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            unverified_email: user.unverified_email.clone(),
            name: user.name.clone(),
            created: user.created,
            last_seen: user.last_seen,
            birthdate: user.birthdate,
            description: user.description.clone(),
            icon: user.icon.clone(),
            site: user.site.clone(),
            perms: user.perms,
            perm_level: user.perm_level,
            unread_message_count: user.unread_message_count,
            settings: user.settings.clone(),
        }
    }
}

/// Resolve a client-supplied user ID, or 404.
pub async fn get_user_by_unsafe_id(users: &dyn UserRepository, id: &str) -> Result<UserDocument, ApiError> {
    let user = match Uuid::parse_str(id) {
        Ok(id) => users.find_by_id(id).await?,
        Err(_) => None,
    };

    user.ok_or_else(|| ApiError::not_found("No user was found with the specified ID."))
}
