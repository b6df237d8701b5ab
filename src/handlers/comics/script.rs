use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Session};
use crate::perms::{Perm, PermDenied};
use crate::services::comics::{get_client_comic, lock_comic_by_unsafe_id, ClientComic};
use crate::state::AppState;

/// POST /api/comics/:comicID/script/verify - approve the comic's pending script
pub async fn comic_script_verify(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(comic_id): Path<String>,
) -> ApiResult<ClientComic> {
    let user = session.require("You are not authenticated.")?;
    if !user.perms.intersects(Perm::VERIFY_SCRIPTS) {
        return Err(PermDenied::InsufficientPerms {
            user_perms: user.perms,
            required_perms: Perm::VERIFY_SCRIPTS,
        }
        .into());
    }

    let mut lock = lock_comic_by_unsafe_id(state.comics.as_ref(), &comic_id).await?;
    let comic = lock.comic_mut();
    if comic.script.verified == comic.script.unverified {
        return Err(ApiError::bad_request("The specified comic has no unverified script changes."));
    }

    comic.script.verified = comic.script.unverified.clone();
    comic.updated = Utc::now();
    let comic = lock.commit().await?;

    tracing::info!(comic_id = comic.id, verified_by = %user.id, "Verified comic script");
    Ok(ApiResponse::success(get_client_comic(&comic, Some(user))))
}
