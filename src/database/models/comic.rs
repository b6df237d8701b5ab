use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::perms::Perm;

pub type ComicId = i64;

pub const TITLE_MAX_LENGTH: usize = 50;
pub const DESCRIPTION_MAX_LENGTH: usize = 2000;
pub const COMMENT_MAX_LENGTH: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicPage {
    pub published: DateTime<Utc>,
    pub title: String,
    pub content: String,
    /// Page numbers this page links to.
    pub next_pages: Vec<u32>,
    pub tags: Vec<String>,
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicPageDraft {
    #[serde(flatten)]
    pub page: ComicPage,
    /// Whether readers are notified when the draft is published.
    pub notify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ComicStatus {
    #[default]
    Inactive = 0,
    Ongoing = 1,
    Complete = 2,
    Discontinued = 3,
}

impl TryFrom<u8> for ComicStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ComicStatus::Inactive),
            1 => Ok(ComicStatus::Ongoing),
            2 => Ok(ComicStatus::Complete),
            3 => Ok(ComicStatus::Discontinued),
            other => Err(format!("unknown comic status {}", other)),
        }
    }
}

impl From<ComicStatus> for u8 {
    fn from(status: ComicStatus) -> u8 {
        status as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicComment {
    pub posted: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<DateTime<Utc>>,
    /// Page number (from 1) the comment was posted on.
    pub page: u32,
    pub author: Uuid,
    pub content: String,
    pub likes: Vec<Uuid>,
    pub dislikes: Vec<Uuid>,
    pub private: bool,
}

impl ComicComment {
    /// Apply a user's rating: 1 likes, -1 dislikes, 0 clears.
    pub fn rate(&mut self, user_id: Uuid, rating: i8) {
        self.likes.retain(|id| *id != user_id);
        self.dislikes.retain(|id| *id != user_id);
        match rating {
            1 => self.likes.push(user_id),
            -1 => self.dislikes.push(user_id),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicColor {
    pub value: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComicScript {
    pub unverified: String,
    pub verified: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpoilerLabels {
    pub open_label: String,
    pub close_label: String,
}

/// Properties of the comic which are only used in the comic editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSettings {
    pub default_page_title: String,
    pub default_spoiler: SpoilerLabels,
    pub colors: Vec<ComicColor>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            default_page_title: "Next.".to_string(),
            default_spoiler: SpoilerLabels {
                open_label: "Show Pesterlog".to_string(),
                close_label: "Hide Pesterlog".to_string(),
            },
            colors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicDocument {
    pub id: ComicId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub title: String,
    pub status: ComicStatus,
    pub owner: Uuid,
    pub editors: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<ComicAuthor>,
    pub pages: Vec<ComicPage>,
    pub drafts: Vec<ComicPageDraft>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    pub style: String,
    /// Whether the comic should ignore the reader's theme setting.
    pub disable_user_theme: bool,
    pub script: ComicScript,
    pub tags: Vec<String>,
    pub comments_enabled: bool,
    pub comments: Vec<ComicComment>,
    pub editor_settings: EditorSettings,
}

impl ComicDocument {
    /// A fresh comic; the store assigns the real ID on insert.
    pub fn new(owner: Uuid, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            created: now,
            updated: now,
            title,
            status: ComicStatus::Inactive,
            owner,
            editors: Vec::new(),
            author: None,
            pages: Vec::new(),
            drafts: Vec::new(),
            description: String::new(),
            icon: None,
            banner: None,
            style: String::new(),
            disable_user_theme: false,
            script: ComicScript::default(),
            tags: Vec::new(),
            comments_enabled: true,
            comments: Vec::new(),
            editor_settings: EditorSettings::default(),
        }
    }

    /// Owner or one of the editors.
    pub fn is_editor(&self, user_id: Uuid) -> bool {
        self.owner == user_id || self.editors.contains(&user_id)
    }

    pub fn can_edit(&self, user_id: Uuid, perms: Perm) -> bool {
        self.is_editor(user_id) || perms.intersects(Perm::SUDO_WRITE)
    }

    pub fn can_delete(&self, user_id: Uuid, perms: Perm) -> bool {
        self.owner == user_id || perms.intersects(Perm::SUDO_DELETE)
    }

    /// Whether the viewer sees everything a comic editor would.
    pub fn can_view_private(&self, user_id: Uuid, perms: Perm) -> bool {
        self.is_editor(user_id) || perms.intersects(Perm::SUDO_READ)
    }

    /// Page by its number (from 1).
    pub fn page(&self, number: u32) -> Option<&ComicPage> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.pages.get(index)
    }
}
