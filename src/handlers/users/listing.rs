use axum::{
    extract::{Path, State},
    Extension,
};

use crate::middleware::{ApiResponse, ApiResult, Session};
use crate::perms::{perm_to_get_user_in_api, Perm};
use crate::services::comics::{get_client_comic, ClientComic};
use crate::services::messages::{get_client_message, ClientMessage};
use crate::services::users::get_user_by_unsafe_id;
use crate::state::AppState;

/// GET /api/users/:userID/messages - the user's inbox, newest first
pub async fn user_messages_get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<ClientMessage>> {
    let user = perm_to_get_user_in_api(&state, &session, &user_id, Perm::SUDO_READ).await?;

    let messages = state.messages.list_for_user(user.id).await?;
    let client_messages = messages
        .iter()
        .map(|message| get_client_message(message, &user))
        .collect();

    Ok(ApiResponse::success(client_messages))
}

/// GET /api/users/:userID/comics - comics the user owns or edits
pub async fn user_comics_get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<ClientComic>> {
    let user = get_user_by_unsafe_id(state.users.as_ref(), &user_id).await?;

    let comics = state.comics.list_for_user(user.id).await?;
    let client_comics = comics
        .iter()
        .map(|comic| get_client_comic(comic, session.user()))
        .collect();

    Ok(ApiResponse::success(client_comics))
}
