use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::comic::{
    ComicAuthor, ComicComment, ComicDocument, ComicId, ComicPage, ComicPageDraft, ComicStatus, EditorSettings,
};
use crate::database::models::UserDocument;
use crate::database::repository::{ComicLock, ComicRepository};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientScript {
    pub verified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unverified: Option<String>,
}

/// A comment along with its position, which is how clients address it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientComment {
    pub index: usize,
    #[serde(flatten)]
    pub comment: ComicComment,
}

/// A comic as seen by one viewer.
///
/// Hidden pages stay in `pages` as `null` so page numbers line up for every
/// viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientComic {
    pub id: ComicId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub title: String,
    pub status: ComicStatus,
    pub owner: Uuid,
    pub editors: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<ComicAuthor>,
    pub pages: Vec<Option<ComicPage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drafts: Option<Vec<ComicPageDraft>>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    pub style: String,
    pub disable_user_theme: bool,
    pub script: ClientScript,
    pub tags: Vec<String>,
    pub comments_enabled: bool,
    pub comments: Vec<ClientComment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_settings: Option<EditorSettings>,
}

/// Whether page `number` (from 1) exists and `viewer` may see it.
pub fn page_is_visible(comic: &ComicDocument, number: u32, viewer: Option<&UserDocument>) -> bool {
    match comic.page(number) {
        Some(page) => !page.hidden || is_privileged(comic, viewer),
        None => false,
    }
}

fn is_privileged(comic: &ComicDocument, viewer: Option<&UserDocument>) -> bool {
    viewer.is_some_and(|user| comic.can_view_private(user.id, user.perms))
}

pub fn can_see_comment(comic: &ComicDocument, comment: &ComicComment, viewer: Option<&UserDocument>) -> bool {
    if is_privileged(comic, viewer) {
        return true;
    }
    if !page_is_visible(comic, comment.page, viewer) {
        return false;
    }
    !comment.private || viewer.is_some_and(|user| user.id == comment.author)
}

pub fn get_client_comic(comic: &ComicDocument, viewer: Option<&UserDocument>) -> ClientComic {
    let privileged = is_privileged(comic, viewer);

    let pages = comic
        .pages
        .iter()
        .map(|page| (privileged || !page.hidden).then(|| page.clone()))
        .collect();

    let comments = comic
        .comments
        .iter()
        .enumerate()
        .filter(|(_, comment)| can_see_comment(comic, comment, viewer))
        .map(|(index, comment)| ClientComment {
            index,
            comment: comment.clone(),
        })
        .collect();

    ClientComic {
        id: comic.id,
        created: comic.created,
        updated: comic.updated,
        title: comic.title.clone(),
        status: comic.status,
        owner: comic.owner,
        editors: comic.editors.clone(),
        author: comic.author.clone(),
        pages,
        drafts: privileged.then(|| comic.drafts.clone()),
        description: comic.description.clone(),
        icon: comic.icon.clone(),
        banner: comic.banner.clone(),
        style: comic.style.clone(),
        disable_user_theme: comic.disable_user_theme,
        script: ClientScript {
            verified: comic.script.verified.clone(),
            unverified: privileged.then(|| comic.script.unverified.clone()),
        },
        tags: comic.tags.clone(),
        comments_enabled: comic.comments_enabled,
        comments,
        editor_settings: privileged.then(|| comic.editor_settings.clone()),
    }
}

pub async fn get_comic_by_unsafe_id(comics: &dyn ComicRepository, id: &str) -> Result<ComicDocument, ApiError> {
    let comic = match id.parse::<ComicId>() {
        Ok(id) => comics.find_by_id(id).await?,
        Err(_) => None,
    };

    comic.ok_or_else(|| ApiError::not_found("No comic was found with the specified ID."))
}

/// Like [`get_comic_by_unsafe_id`], but holds the comic for editing.
pub async fn lock_comic_by_unsafe_id(comics: &dyn ComicRepository, id: &str) -> Result<Box<dyn ComicLock>, ApiError> {
    let lock = match id.parse::<ComicId>() {
        Ok(id) => comics.lock(id).await?,
        Err(_) => None,
    };

    lock.ok_or_else(|| ApiError::not_found("No comic was found with the specified ID."))
}
