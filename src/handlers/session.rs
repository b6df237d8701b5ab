use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};

use crate::auth::{generate_jwt, verify_password, Claims};
use crate::database::models::UserDocument;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Session};
use crate::services::users::PrivateUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// A new session: the token to send as `Authorization: Bearer <token>`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
    pub user: PrivateUser,
}

/// Issue a token for `user`.
pub fn start_session(user: &UserDocument) -> Result<SessionToken, ApiError> {
    let claims = Claims::new(user.id);
    let token = generate_jwt(&claims).map_err(|e| {
        tracing::error!("Failed to sign session token: {}", e);
        ApiError::internal_server_error("Failed to create session")
    })?;

    Ok(SessionToken {
        token,
        expires_in: claims.expires_in(),
        user: PrivateUser::from(user),
    })
}

/// POST /api/session - sign in with email and password
pub async fn session_post(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SignInRequest>,
) -> ApiResult<SessionToken> {
    let user = state.users.find_by_email(&body.email).await?;

    let user = match user {
        Some(user) if verify_password(&body.password, &user.password_hash) => user,
        _ => return Err(ApiError::unauthorized("The email or password you entered is incorrect.")),
    };

    tracing::info!(user_id = %user.id, "User signed in");
    Ok(ApiResponse::success(start_session(&user)?))
}

/// GET /api/session - the signed-in user
pub async fn session_get(Extension(session): Extension<Session>) -> ApiResult<PrivateUser> {
    let user = session.require("You are not signed in.")?;
    Ok(ApiResponse::success(PrivateUser::from(user)))
}
