use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::database::models::comic::{ComicDocument, ComicPage, ComicPageDraft};
use crate::database::models::UserDocument;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Session};
use crate::database::repository::ComicLock;
use crate::services::comics::{get_client_comic, lock_comic_by_unsafe_id, ClientComic};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInput {
    pub title: Option<String>,
    pub content: String,
    pub next_pages: Option<Vec<u32>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
    pub commentary: Option<String>,
    /// Only meaningful for drafts.
    #[serde(default)]
    pub notify: bool,
}

impl PageInput {
    /// Page `number`, with the editor defaults filled in.
    fn into_page(self, comic: &ComicDocument, number: u32) -> ComicPage {
        ComicPage {
            published: Utc::now(),
            title: self
                .title
                .unwrap_or_else(|| comic.editor_settings.default_page_title.clone()),
            content: self.content,
            next_pages: self.next_pages.unwrap_or_else(|| vec![number + 1]),
            tags: self.tags,
            hidden: self.hidden,
            commentary: self.commentary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedPage {
    /// Page number (from 1) for pages, position in the draft list for drafts.
    pub number: u32,
    pub page: ComicPage,
}

/// Hold the comic and make sure the session user may edit it.
async fn editable_comic(
    state: &AppState,
    user: &UserDocument,
    comic_id: &str,
) -> Result<Box<dyn ComicLock>, ApiError> {
    let lock = lock_comic_by_unsafe_id(state.comics.as_ref(), comic_id).await?;
    if !lock.comic().can_edit(user.id, user.perms) {
        return Err(ApiError::forbidden("You do not have permission to edit the specified comic."));
    }
    Ok(lock)
}

fn page_count(comic: &ComicDocument) -> u32 {
    u32::try_from(comic.pages.len()).unwrap_or(u32::MAX)
}

/// POST /api/comics/:comicID/pages - publish a page immediately
pub async fn comic_page_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(comic_id): Path<String>,
    ApiJson(body): ApiJson<PageInput>,
) -> ApiResult<CreatedPage> {
    let user = session.require("You must be signed in to edit comics.")?;
    let mut lock = editable_comic(&state, user, &comic_id).await?;
    let comic = lock.comic_mut();

    let number = page_count(comic) + 1;
    let page = body.into_page(comic, number);
    comic.pages.push(page.clone());
    comic.updated = Utc::now();
    let comic = lock.commit().await?;

    tracing::info!(comic_id = comic.id, page = number, "Published page");
    Ok(ApiResponse::created(CreatedPage { number, page }))
}

/// POST /api/comics/:comicID/drafts
pub async fn comic_draft_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(comic_id): Path<String>,
    ApiJson(body): ApiJson<PageInput>,
) -> ApiResult<CreatedPage> {
    let user = session.require("You must be signed in to edit comics.")?;
    let mut lock = editable_comic(&state, user, &comic_id).await?;
    let comic = lock.comic_mut();

    // Drafts publish in order, so their eventual page numbers follow the current pages.
    let draft_number = u32::try_from(comic.drafts.len()).unwrap_or(u32::MAX) + 1;
    let notify = body.notify;
    let page = body.into_page(comic, page_count(comic) + draft_number);
    comic.drafts.push(ComicPageDraft {
        page: page.clone(),
        notify,
    });
    lock.commit().await?;

    Ok(ApiResponse::created(CreatedPage {
        number: draft_number,
        page,
    }))
}

/// POST /api/comics/:comicID/drafts/publish - move every draft onto the end of the comic
pub async fn comic_drafts_publish(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(comic_id): Path<String>,
) -> ApiResult<ClientComic> {
    let user = session.require("You must be signed in to edit comics.")?;
    let mut lock = editable_comic(&state, user, &comic_id).await?;
    let comic = lock.comic_mut();

    if comic.drafts.is_empty() {
        return Err(ApiError::bad_request("The specified comic has no drafts to publish."));
    }

    let now = Utc::now();
    let drafts = std::mem::take(&mut comic.drafts);
    let notify = drafts.iter().any(|draft| draft.notify);
    let published = drafts.len();
    comic.pages.extend(drafts.into_iter().map(|draft| ComicPage {
        published: now,
        ..draft.page
    }));
    comic.updated = now;
    let comic = lock.commit().await?;

    if notify {
        // Reader notifications are not delivered yet; record that one was requested.
        tracing::info!(comic_id = comic.id, pages = published, "Publish notification requested");
    }
    tracing::info!(comic_id = comic.id, pages = published, "Published drafts");

    Ok(ApiResponse::success(get_client_comic(&comic, Some(user))))
}
