use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;

use crate::database::models::comic::{ComicComment, ComicDocument, COMMENT_MAX_LENGTH};
use crate::database::models::UserDocument;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Session};
use crate::perms::Perm;
use crate::services::comics::{can_see_comment, lock_comic_by_unsafe_id, page_is_visible, ClientComment};
use crate::state::AppState;
use crate::types::validate_length;

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub page: u32,
    pub content: String,
    #[serde(default)]
    pub private: bool,
}

/// Index of a comment `viewer` can see, or 404.
fn visible_comment_index(
    comic: &ComicDocument,
    index: &str,
    viewer: &UserDocument,
) -> Result<usize, ApiError> {
    index
        .parse::<usize>()
        .ok()
        .filter(|index| {
            comic
                .comments
                .get(*index)
                .is_some_and(|comment| can_see_comment(comic, comment, Some(viewer)))
        })
        .ok_or_else(|| ApiError::not_found("No comment was found with the specified index."))
}

/// POST /api/comics/:comicID/comments
pub async fn comic_comment_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(comic_id): Path<String>,
    ApiJson(body): ApiJson<CommentRequest>,
) -> ApiResult<ClientComment> {
    let user = session.require("You must be signed in to comment.")?;
    let mut lock = lock_comic_by_unsafe_id(state.comics.as_ref(), &comic_id).await?;
    let comic = lock.comic_mut();

    if !comic.comments_enabled {
        return Err(ApiError::forbidden("Comments are disabled on the specified comic."));
    }
    if !page_is_visible(comic, body.page, Some(user)) {
        return Err(ApiError::not_found("No page was found with the specified number."));
    }
    if body.content.trim().is_empty() {
        return Err(ApiError::invalid_field("content", "Content cannot be empty"));
    }
    validate_length(&body.content, COMMENT_MAX_LENGTH).map_err(|e| ApiError::invalid_field("content", e))?;

    let comment = ComicComment {
        posted: Utc::now(),
        edited: None,
        page: body.page,
        author: user.id,
        content: body.content,
        likes: Vec::new(),
        dislikes: Vec::new(),
        private: body.private,
    };
    comic.comments.push(comment.clone());
    let index = comic.comments.len() - 1;
    lock.commit().await?;

    Ok(ApiResponse::created(ClientComment { index, comment }))
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    /// 1 likes, -1 dislikes, 0 clears.
    pub rating: i8,
}

/// PUT /api/comics/:comicID/comments/:index/rating
pub async fn comic_comment_rating_put(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((comic_id, index)): Path<(String, String)>,
    ApiJson(body): ApiJson<RatingRequest>,
) -> ApiResult<ClientComment> {
    let user = session.require("You must be signed in to rate comments.")?;
    if !(-1..=1).contains(&body.rating) {
        return Err(ApiError::invalid_field("rating", "Rating must be -1, 0 or 1"));
    }

    let mut lock = lock_comic_by_unsafe_id(state.comics.as_ref(), &comic_id).await?;
    let index = visible_comment_index(lock.comic(), &index, user)?;

    let comment = &mut lock.comic_mut().comments[index];
    comment.rate(user.id, body.rating);
    let comment = comment.clone();
    lock.commit().await?;

    Ok(ApiResponse::success(ClientComment { index, comment }))
}

/// DELETE /api/comics/:comicID/comments/:index
///
/// Later comments shift down by one index.
pub async fn comic_comment_delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((comic_id, index)): Path<(String, String)>,
) -> ApiResult<()> {
    let user = session.require("You must be signed in to delete comments.")?;
    let mut lock = lock_comic_by_unsafe_id(state.comics.as_ref(), &comic_id).await?;
    let comic = lock.comic_mut();
    let index = visible_comment_index(comic, &index, user)?;

    let allowed = comic.comments[index].author == user.id
        || comic.is_editor(user.id)
        || user.perms.intersects(Perm::SUDO_DELETE);
    if !allowed {
        return Err(ApiError::forbidden("You do not have permission to delete the specified comment."));
    }

    comic.comments.remove(index);
    lock.commit().await?;

    Ok(ApiResponse::no_content())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::database::models::comic::ComicDocument;
    use crate::database::repository::ComicRepository;
    use crate::perms::Perm;
    use crate::testing::{fixture_page, TestApp};

    async fn comic_with_pages(app: &TestApp, owner: &crate::database::models::UserDocument) -> ComicDocument {
        let mut comic = app.comic(owner).await;
        comic.pages.push(fixture_page("one", false));
        comic.pages.push(fixture_page("secret", true));
        app.comics.replace(&comic).await;
        comic
    }

    #[tokio::test]
    async fn commenting_rules() {
        let app = TestApp::new();
        let owner = app.user("owner").await;
        let reader = app.user("reader").await;
        let mut comic = comic_with_pages(&app, &owner).await;
        let uri = format!("/api/comics/{}/comments", comic.id);

        let (status, _) = app
            .send(Method::POST, &uri, None, Some(json!({"page": 1, "content": "hi"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        for page in [0, 2, 3] {
            let (status, _) = app
                .send(Method::POST, &uri, Some(&reader), Some(json!({"page": page, "content": "hi"})))
                .await;
            assert_eq!(status, StatusCode::NOT_FOUND, "page {}", page);
        }

        let (status, body) = app
            .send(Method::POST, &uri, Some(&reader), Some(json!({"page": 1, "content": "great page"})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["index"], 0);
        assert_eq!(body["data"]["author"], json!(reader.id));

        comic.comments_enabled = false;
        let stored = app.comics.find_by_id(comic.id).await.unwrap().unwrap();
        comic.comments = stored.comments;
        app.comics.replace(&comic).await;
        let (status, _) = app
            .send(Method::POST, &uri, Some(&reader), Some(json!({"page": 1, "content": "again"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn rating_toggles_between_likes_and_dislikes() {
        let app = TestApp::new();
        let owner = app.user("owner").await;
        let reader = app.user("reader").await;
        let comic = comic_with_pages(&app, &owner).await;

        app.send(
            Method::POST,
            &format!("/api/comics/{}/comments", comic.id),
            Some(&owner),
            Some(json!({"page": 1, "content": "author's note"})),
        )
        .await;

        let uri = format!("/api/comics/{}/comments/0/rating", comic.id);
        let (status, body) = app.send(Method::PUT, &uri, Some(&reader), Some(json!({"rating": 1}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["likes"], json!([reader.id]));

        let (_, body) = app.send(Method::PUT, &uri, Some(&reader), Some(json!({"rating": -1}))).await;
        assert_eq!(body["data"]["likes"], json!([]));
        assert_eq!(body["data"]["dislikes"], json!([reader.id]));

        let (status, _) = app.send(Method::PUT, &uri, Some(&reader), Some(json!({"rating": 5}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(
                Method::PUT,
                &format!("/api/comics/{}/comments/7/rating", comic.id),
                Some(&reader),
                Some(json!({"rating": 1})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn comment_deletion_permissions() {
        let app = TestApp::new();
        let owner = app.user("owner").await;
        let author = app.user("author").await;
        let other = app.user("other").await;
        let moderator = app.staff("mod", Perm::SUDO_DELETE, 1).await;
        let comic = comic_with_pages(&app, &owner).await;
        let comments_uri = format!("/api/comics/{}/comments", comic.id);

        for _ in 0..3 {
            app.send(
                Method::POST,
                &comments_uri,
                Some(&author),
                Some(json!({"page": 1, "content": "comment"})),
            )
            .await;
        }

        let first = format!("/api/comics/{}/comments/0", comic.id);
        let (status, _) = app.send(Method::DELETE, &first, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        for user in [&author, &owner, &moderator] {
            let (status, _) = app.send(Method::DELETE, &first, Some(user), None).await;
            assert_eq!(status, StatusCode::NO_CONTENT, "{}", user.name);
        }

        let stored = app.comics.find_by_id(comic.id).await.unwrap().unwrap();
        assert!(stored.comments.is_empty());
    }

    #[tokio::test]
    async fn simultaneous_comments_are_both_kept() {
        let app = TestApp::new();
        let owner = app.user("owner").await;
        let first = app.user("first").await;
        let second = app.user("second").await;
        let comic = comic_with_pages(&app, &owner).await;
        let uri = format!("/api/comics/{}/comments", comic.id);

        let ((a, a_body), (b, b_body)) = tokio::join!(
            app.send(Method::POST, &uri, Some(&first), Some(json!({"page": 1, "content": "first!"}))),
            app.send(Method::POST, &uri, Some(&second), Some(json!({"page": 1, "content": "second!"}))),
        );
        assert_eq!(a, StatusCode::CREATED);
        assert_eq!(b, StatusCode::CREATED);

        let mut indexes = vec![a_body["data"]["index"].clone(), b_body["data"]["index"].clone()];
        indexes.sort_by_key(|index| index.as_u64());
        assert_eq!(indexes, vec![json!(0), json!(1)]);

        let stored = app.comics.find_by_id(comic.id).await.unwrap().unwrap();
        assert_eq!(stored.comments.len(), 2);
    }
}
