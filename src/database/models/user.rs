use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::perms::Perm;

pub const NAME_MAX_LENGTH: usize = 32;
pub const DESCRIPTION_MAX_LENGTH: usize = 2000;
pub const PASSWORD_MIN_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct UserDocument {
    pub id: Uuid,
    pub email: Option<String>,
    /// An email change waiting for verification.
    pub unverified_email: Option<String>,
    pub email_verification_token: Option<String>,
    pub name: String,
    pub password_hash: String,
    pub created: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub birthdate: Option<NaiveDate>,
    pub description: String,
    pub icon: Option<String>,
    pub site: Option<String>,
    pub perms: Perm,
    /// `None` means the user has no permission level at all.
    pub perm_level: Option<u32>,
    pub unread_message_count: u32,
    pub settings: UserSettings,
}

impl UserDocument {
    pub fn new(name: String, email: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: Some(email),
            unverified_email: None,
            email_verification_token: None,
            name,
            password_hash,
            created: now,
            last_seen: now,
            birthdate: None,
            description: String::new(),
            icon: None,
            site: None,
            perms: Perm::NONE,
            perm_level: None,
            unread_message_count: 0,
            settings: UserSettings::default(),
        }
    }
}

/// Profile fields to change. `None` leaves a field alone; for nullable
/// fields `Some(None)` clears it. Never carries perms, counters or secrets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<Option<String>>,
    pub site: Option<Option<String>>,
    pub birthdate: Option<NaiveDate>,
    pub settings: Option<UserSettings>,
    pub email: Option<Option<String>>,
    pub unverified_email: Option<Option<String>>,
    pub email_verification_token: Option<Option<String>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, user: &mut UserDocument) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(description) = &self.description {
            user.description = description.clone();
        }
        if let Some(icon) = &self.icon {
            user.icon = icon.clone();
        }
        if let Some(site) = &self.site {
            user.site = site.clone();
        }
        if let Some(birthdate) = self.birthdate {
            user.birthdate = Some(birthdate);
        }
        if let Some(settings) = &self.settings {
            user.settings = settings.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(unverified_email) = &self.unverified_email {
            user.unverified_email = unverified_email.clone();
        }
        if let Some(token) = &self.email_verification_token {
            user.email_verification_token = token.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Standard,
    Dark,
    Felt,
    Sbahj,
    Trickster,
}

/// Where a kind of notification is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSetting {
    pub email: bool,
    pub site: bool,
}

impl NotificationSetting {
    const fn new(email: bool, site: bool) -> Self {
        Self { email, site }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub messages: NotificationSetting,
    pub user_tags: NotificationSetting,
    pub comment_replies: NotificationSetting,
    pub comic_updates: NotificationSetting,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            messages: NotificationSetting::new(true, true),
            user_tags: NotificationSetting::new(true, true),
            comment_replies: NotificationSetting::new(false, true),
            comic_updates: NotificationSetting::new(false, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub email_public: bool,
    pub birthdate_public: bool,
    pub theme: Theme,
    pub notifications: NotificationSettings,
}
