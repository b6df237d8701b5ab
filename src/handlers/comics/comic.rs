use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;
use futures::future::try_join_all;
use serde::Deserialize;

use crate::database::models::comic::{
    ComicAuthor, ComicDocument, ComicStatus, EditorSettings, DESCRIPTION_MAX_LENGTH, TITLE_MAX_LENGTH,
};
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Session};
use crate::perms::Perm;
use crate::services::comics::{get_client_comic, get_comic_by_unsafe_id, lock_comic_by_unsafe_id, ClientComic};
use crate::services::messages::uniq;
use crate::services::users::get_user_by_unsafe_id;
use crate::state::AppState;
use crate::types::{validate_length, validate_url};

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::invalid_field("title", "Title cannot be empty"));
    }
    validate_length(title, TITLE_MAX_LENGTH).map_err(|e| ApiError::invalid_field("title", e))
}

fn validate_description(description: &str) -> Result<(), ApiError> {
    validate_length(description, DESCRIPTION_MAX_LENGTH).map_err(|e| ApiError::invalid_field("description", e))
}

#[derive(Debug, Deserialize)]
pub struct CreateComicRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// POST /api/comics
pub async fn comic_create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(body): ApiJson<CreateComicRequest>,
) -> ApiResult<ClientComic> {
    let user = session.require("You must be signed in to create comics.")?;

    validate_title(&body.title)?;
    validate_description(&body.description)?;

    let mut comic = ComicDocument::new(user.id, body.title, Utc::now());
    comic.description = body.description;
    comic.tags = body.tags;

    let comic = state.comics.insert(comic).await?;
    tracing::info!(comic_id = comic.id, owner = %user.id, "Created comic");

    Ok(ApiResponse::created(get_client_comic(&comic, Some(user))))
}

/// GET /api/comics/:comicID
pub async fn comic_get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(comic_id): Path<String>,
) -> ApiResult<ClientComic> {
    let comic = get_comic_by_unsafe_id(state.comics.as_ref(), &comic_id).await?;
    Ok(ApiResponse::success(get_client_comic(&comic, session.user())))
}

/// Comic properties editors may change. Empty `icon`/`banner` clear them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicPatch {
    pub title: Option<String>,
    pub status: Option<ComicStatus>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub banner: Option<String>,
    pub style: Option<String>,
    pub disable_user_theme: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub comments_enabled: Option<bool>,
    pub author: Option<ComicAuthor>,
    pub editors: Option<Vec<String>>,
    pub editor_settings: Option<EditorSettings>,
    /// Replaces the unverified script; it runs only once verified.
    pub script: Option<String>,
}

fn optional_url(field: &str, value: String) -> Result<Option<String>, ApiError> {
    if value.is_empty() {
        return Ok(None);
    }
    validate_url(&value).map_err(|e| ApiError::invalid_field(field, e))?;
    Ok(Some(value))
}

/// PATCH /api/comics/:comicID
pub async fn comic_patch(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(comic_id): Path<String>,
    ApiJson(patch): ApiJson<ComicPatch>,
) -> ApiResult<ClientComic> {
    let user = session.require("You must be signed in to edit comics.")?;

    // Resolve editors before taking the comic so the lock is held only for the write.
    let editors = match &patch.editors {
        Some(editors) => {
            let users = state.users.as_ref();
            let resolved = try_join_all(editors.iter().map(|id| get_user_by_unsafe_id(users, id))).await?;
            Some(resolved.into_iter().map(|editor| editor.id).collect::<Vec<_>>())
        }
        None => None,
    };

    let mut lock = lock_comic_by_unsafe_id(state.comics.as_ref(), &comic_id).await?;
    let comic = lock.comic_mut();

    if !comic.can_edit(user.id, user.perms) {
        return Err(ApiError::forbidden("You do not have permission to edit the specified comic."));
    }

    if let Some(editors) = editors {
        if comic.owner != user.id && !user.perms.intersects(Perm::SUDO_WRITE) {
            return Err(ApiError::forbidden("Only the comic's owner can change its editors."));
        }

        let owner = comic.owner;
        comic.editors = uniq(editors.into_iter().filter(|id| *id != owner));
    }

    if let Some(title) = patch.title {
        validate_title(&title)?;
        comic.title = title;
    }
    if let Some(status) = patch.status {
        comic.status = status;
    }
    if let Some(description) = patch.description {
        validate_description(&description)?;
        comic.description = description;
    }
    if let Some(icon) = patch.icon {
        comic.icon = optional_url("icon", icon)?;
    }
    if let Some(banner) = patch.banner {
        comic.banner = optional_url("banner", banner)?;
    }
    if let Some(author) = patch.author {
        if let Some(site) = &author.site {
            validate_url(site).map_err(|e| ApiError::invalid_field("author.site", e))?;
        }
        comic.author = Some(author);
    }
    if let Some(style) = patch.style {
        comic.style = style;
    }
    if let Some(disable_user_theme) = patch.disable_user_theme {
        comic.disable_user_theme = disable_user_theme;
    }
    if let Some(tags) = patch.tags {
        comic.tags = tags;
    }
    if let Some(comments_enabled) = patch.comments_enabled {
        comic.comments_enabled = comments_enabled;
    }
    if let Some(editor_settings) = patch.editor_settings {
        comic.editor_settings = editor_settings;
    }
    if let Some(script) = patch.script {
        comic.script.unverified = script;
    }

    comic.updated = Utc::now();
    let comic = lock.commit().await?;

    Ok(ApiResponse::success(get_client_comic(&comic, Some(user))))
}

/// DELETE /api/comics/:comicID - owner or sudoDelete
pub async fn comic_delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(comic_id): Path<String>,
) -> ApiResult<()> {
    let user = session.require("You must be signed in to delete comics.")?;
    let comic = get_comic_by_unsafe_id(state.comics.as_ref(), &comic_id).await?;

    if !comic.can_delete(user.id, user.perms) {
        return Err(ApiError::forbidden("You do not have permission to delete the specified comic."));
    }

    state.comics.delete(comic.id).await?;
    tracing::info!(comic_id = comic.id, deleted_by = %user.id, "Deleted comic");

    Ok(ApiResponse::no_content())
}
