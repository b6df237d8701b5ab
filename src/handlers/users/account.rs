use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::database::manager::DatabaseError;
use crate::database::models::user::{ProfileUpdate, UserDocument, UserSettings, DESCRIPTION_MAX_LENGTH};
use crate::error::ApiError;
use crate::handlers::session::{start_session, SessionToken};
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Session};
use crate::perms::{perm_to_get_user_in_api, Perm};
use crate::services::users::{get_user_by_unsafe_id, PrivateUser, PublicUser};
use crate::state::AppState;
use crate::types::{
    validate_birthdate, validate_email_format, validate_length, validate_name, validate_password, validate_url,
};

fn email_taken_error() -> ApiError {
    let mut field_errors = HashMap::new();
    field_errors.insert("email".to_string(), "This email is taken.".to_string());
    ApiError::unprocessable_entity("The specified email is already taken.", field_errors)
}

/// Email conflicts surface as 422 like the up-front check does.
fn map_email_conflict(err: DatabaseError) -> ApiError {
    match err {
        DatabaseError::Conflict(_) => email_taken_error(),
        other => other.into(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
}

/// POST /api/users - sign up
pub async fn user_create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> ApiResult<SessionToken> {
    validate_name(&body.name).map_err(|e| ApiError::invalid_field("name", e))?;
    validate_email_format(&body.email).map_err(|e| ApiError::invalid_field("email", e))?;
    validate_password(&body.password).map_err(|e| ApiError::invalid_field("password", e))?;
    let now = Utc::now();
    if let Some(birthdate) = body.birthdate {
        validate_birthdate(birthdate, now.date_naive()).map_err(|e| ApiError::invalid_field("birthdate", e))?;
    }

    if state.users.email_taken(&body.email).await? {
        return Err(email_taken_error());
    }

    let password_hash = hash_password(&body.password).map_err(|e| {
        tracing::error!("{}", e);
        ApiError::internal_server_error("Failed to create user")
    })?;

    let mut user = UserDocument::new(body.name, body.email, password_hash, now);
    user.birthdate = body.birthdate;

    state.users.insert(&user).await.map_err(map_email_conflict)?;
    tracing::info!(user_id = %user.id, "Created user");

    Ok(ApiResponse::created(start_session(&user)?))
}

/// GET /api/users/:userID - public profile
pub async fn user_get(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<PublicUser> {
    let user = get_user_by_unsafe_id(state.users.as_ref(), &user_id).await?;
    Ok(ApiResponse::success(PublicUser::from(&user)))
}

/// GET /api/users/:userID/private
pub async fn user_private_get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
) -> ApiResult<PrivateUser> {
    let user = perm_to_get_user_in_api(&state, &session, &user_id, Perm::SUDO_READ).await?;
    Ok(ApiResponse::success(PrivateUser::from(&user)))
}

/// Fields a user may change about themselves. Empty `icon`/`site` clear them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub site: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub settings: Option<UserSettings>,
}

fn optional_url(field: &str, value: String) -> Result<Option<String>, ApiError> {
    if value.is_empty() {
        return Ok(None);
    }
    validate_url(&value).map_err(|e| ApiError::invalid_field(field, e))?;
    Ok(Some(value))
}

/// PATCH /api/users/:userID
pub async fn user_patch(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> ApiResult<PrivateUser> {
    let user = perm_to_get_user_in_api(&state, &session, &user_id, Perm::SUDO_WRITE).await?;
    let mut update = ProfileUpdate::default();

    if let Some(name) = patch.name {
        validate_name(&name).map_err(|e| ApiError::invalid_field("name", e))?;
        update.name = Some(name);
    }
    if let Some(description) = patch.description {
        validate_length(&description, DESCRIPTION_MAX_LENGTH).map_err(|e| ApiError::invalid_field("description", e))?;
        update.description = Some(description);
    }
    if let Some(icon) = patch.icon {
        update.icon = Some(optional_url("icon", icon)?);
    }
    if let Some(site) = patch.site {
        update.site = Some(optional_url("site", site)?);
    }
    if let Some(birthdate) = patch.birthdate {
        validate_birthdate(birthdate, Utc::now().date_naive()).map_err(|e| ApiError::invalid_field("birthdate", e))?;
        update.birthdate = Some(birthdate);
    }
    update.settings = patch.settings;

    if let Some(email) = patch.email {
        if user.email.as_deref() == Some(email.as_str()) {
            // Changing back to the current email cancels a pending change.
            update.unverified_email = Some(None);
            update.email_verification_token = Some(None);
        } else if user.unverified_email.as_deref() != Some(email.as_str()) {
            validate_email_format(&email).map_err(|e| ApiError::invalid_field("email", e))?;
            if state.users.email_taken(&email).await? {
                return Err(email_taken_error());
            }

            let token = Uuid::new_v4().simple().to_string();
            // Email delivery is not wired up; the token is only logged.
            tracing::info!(user_id = %user.id, email = %email, token = %token, "Email verification requested");
            update.unverified_email = Some(Some(email));
            update.email_verification_token = Some(Some(token));
        }
    }

    let stored = state
        .users
        .update_profile(user.id, &update)
        .await
        .map_err(map_email_conflict)?;
    Ok(ApiResponse::success(PrivateUser::from(&stored)))
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// POST /api/users/:userID/verifyEmail
pub async fn user_verify_email(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
    ApiJson(body): ApiJson<VerifyEmailRequest>,
) -> ApiResult<PrivateUser> {
    let user = perm_to_get_user_in_api(&state, &session, &user_id, Perm::SUDO_WRITE).await?;

    let token_matches = user.unverified_email.is_some()
        && user.email_verification_token.as_deref() == Some(body.token.as_str());
    if !token_matches {
        let mut field_errors = HashMap::new();
        field_errors.insert("token".to_string(), "Invalid verification token.".to_string());
        return Err(ApiError::unprocessable_entity(
            "The email verification token is invalid.",
            field_errors,
        ));
    }

    let update = ProfileUpdate {
        email: Some(user.unverified_email.clone()),
        unverified_email: Some(None),
        email_verification_token: Some(None),
        ..Default::default()
    };
    let stored = state
        .users
        .update_profile(user.id, &update)
        .await
        .map_err(map_email_conflict)?;

    tracing::info!(user_id = %user.id, "Email verified");
    Ok(ApiResponse::success(PrivateUser::from(&stored)))
}

/// DELETE /api/users/:userID
pub async fn user_delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
) -> ApiResult<()> {
    let user = perm_to_get_user_in_api(&state, &session, &user_id, Perm::SUDO_DELETE).await?;

    state.users.delete(user.id).await?;
    tracing::info!(
        user_id = %user.id,
        deleted_by = ?session.user().map(|acting| acting.id),
        "Deleted user"
    );

    Ok(ApiResponse::no_content())
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Path, State},
        http::{Method, StatusCode},
        Extension,
    };
    use serde_json::json;

    use super::{user_patch, UserPatch};
    use crate::database::repository::UserRepository;
    use crate::middleware::{ApiJson, Session};
    use crate::perms::Perm;
    use crate::testing::TestApp;

    #[tokio::test]
    async fn sign_up_returns_a_session() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                Method::POST,
                "/api/users",
                None,
                Some(json!({
                    "name": "alice",
                    "email": "alice@example.com",
                    "password": "longenough",
                    "birthdate": "2000-01-01"
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["data"]["token"].is_string());
        assert_eq!(body["data"]["user"]["email"], "alice@example.com");
        assert!(app.users.find_by_email("alice@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sign_up_validates_fields() {
        let app = TestApp::new();
        let cases = [
            json!({"name": "alice", "email": "alice@example.com", "password": "short"}),
            json!({"name": "", "email": "alice@example.com", "password": "longenough"}),
            json!({"name": "alice", "email": "not-an-email", "password": "longenough"}),
            json!({"name": "alice", "email": "alice@example.com", "password": "longenough", "birthdate": "2999-01-01"}),
        ];

        for case in cases {
            let (status, _) = app.send(Method::POST, "/api/users", None, Some(case.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", case);
        }
    }

    #[tokio::test]
    async fn sign_up_with_taken_email_is_unprocessable() {
        let app = TestApp::new();
        app.user("alice").await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/users",
                None,
                Some(json!({"name": "other", "email": "alice@example.com", "password": "longenough"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["field_errors"]["email"].is_string());
    }

    #[tokio::test]
    async fn profiles_are_public_but_private_data_is_not() {
        let app = TestApp::new();
        let alice = app.user("alice").await;
        let bob = app.user("bob").await;

        let (status, body) = app
            .send(Method::GET, &format!("/api/users/{}", alice.id), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "alice");
        assert!(body["data"].get("email").is_none());

        let (status, _) = app
            .send(Method::GET, &format!("/api/users/{}/private", alice.id), Some(&bob), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(Method::GET, &format!("/api/users/{}/private", alice.id), Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "alice@example.com");

        let (status, _) = app.send(Method::GET, "/api/users/unknown", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_updates_profile_fields() {
        let app = TestApp::new();
        let alice = app.user("alice").await;

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/users/{}", alice.id),
                Some(&alice),
                Some(json!({
                    "name": "Alice",
                    "description": "hi",
                    "site": "https://alice.example.com",
                    "settings": {"theme": "dark", "emailPublic": true}
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Alice");
        assert_eq!(body["data"]["settings"]["theme"], "dark");

        let (status, _) = app
            .send(
                Method::PATCH,
                &format!("/api/users/{}", alice.id),
                Some(&alice),
                Some(json!({"icon": "javascript:alert(1)"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn staff_need_sudo_write_to_patch_others() {
        let app = TestApp::new();
        let target = app.user("target").await;
        let reader = app.staff("reader", Perm::SUDO_READ, 5).await;
        let writer = app.staff("writer", Perm::SUDO_WRITE, 5).await;

        let uri = format!("/api/users/{}", target.id);
        let (status, body) = app
            .send(Method::PATCH, &uri, Some(&reader), Some(json!({"name": "renamed"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "INSUFFICIENT_PERMS");
        assert_eq!(body["userPerms"], json!(Perm::SUDO_READ.bits()));
        assert_eq!(body["requiredPerms"], json!(Perm::SUDO_WRITE.bits()));

        let (status, _) = app
            .send(Method::PATCH, &uri, Some(&writer), Some(json!({"name": "renamed"})))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn email_changes_wait_for_verification() {
        let app = TestApp::new();
        let alice = app.user("alice").await;
        app.user("bob").await;
        let uri = format!("/api/users/{}", alice.id);

        let (status, _) = app
            .send(Method::PATCH, &uri, Some(&alice), Some(json!({"email": "bob@example.com"})))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = app
            .send(Method::PATCH, &uri, Some(&alice), Some(json!({"email": "alice2@example.com"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "alice@example.com");
        assert_eq!(body["data"]["unverifiedEmail"], "alice2@example.com");

        let verify_uri = format!("/api/users/{}/verifyEmail", alice.id);
        let (status, _) = app
            .send(Method::POST, &verify_uri, Some(&alice), Some(json!({"token": "wrong"})))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let stored = app.users.find_by_id(alice.id).await.unwrap().unwrap();
        let token = stored.email_verification_token.unwrap();
        let (status, body) = app
            .send(Method::POST, &verify_uri, Some(&alice), Some(json!({"token": token})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "alice2@example.com");
        assert!(body["data"].get("unverifiedEmail").is_none());
    }

    #[tokio::test]
    async fn delete_needs_sudo_delete_for_others() {
        let app = TestApp::new();
        let target = app.user("target").await;
        let other = app.user("other").await;
        let admin = app.staff("admin", Perm::SUDO_DELETE, 1).await;
        let uri = format!("/api/users/{}", target.id);

        let (status, _) = app.send(Method::DELETE, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());
        assert!(app.users.find_by_id(target.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn patch_from_stale_session_keeps_newer_perms_and_unread_count() {
        let app = TestApp::new();
        let admin = app.staff("admin", Perm::WRITE_PERMS, 1).await;
        let alice = app.staff("alice", Perm::SUDO_READ, 5).await;
        let bob = app.user("bob").await;
        let stale = alice.clone();

        let (status, _) = app
            .send(
                Method::PUT,
                &format!("/api/users/{}/perms", alice.id),
                Some(&admin),
                Some(json!({"perms": 0})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/messages",
                Some(&bob),
                Some(json!({"to": [alice.id], "subject": "Hi", "content": "Hello!"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        // The session was resolved before both writes landed.
        let patch = UserPatch {
            description: Some("updated".to_string()),
            ..Default::default()
        };
        user_patch(
            State(app.state()),
            Extension(Session::signed_in(stale)),
            Path(alice.id.to_string()),
            ApiJson(patch),
        )
        .await
        .unwrap();

        let stored = app.users.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.description, "updated");
        assert_eq!(stored.perms, Perm::NONE);
        assert_eq!(stored.perm_level, None);
        assert_eq!(stored.unread_message_count, 1);
    }
}
