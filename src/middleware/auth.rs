use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::auth::decode_jwt;
use crate::database::models::UserDocument;
use crate::error::ApiError;
use crate::state::AppState;

/// The signed-in user of a request, if any.
///
/// Inserted into request extensions by [`authenticate`] for every request, so
/// handlers can always take `Extension<Session>`.
#[derive(Clone, Debug, Default)]
pub struct Session(Option<UserDocument>);

impl Session {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn signed_in(user: UserDocument) -> Self {
        Self(Some(user))
    }

    pub fn user(&self) -> Option<&UserDocument> {
        self.0.as_ref()
    }

    /// The signed-in user, or 403 with `message` when signed out.
    pub fn require(&self, message: &str) -> Result<&UserDocument, ApiError> {
        self.user().ok_or_else(|| ApiError::forbidden(message))
    }
}

/// Resolves the bearer token (if present) into a [`Session`].
///
/// A request without an Authorization header is anonymous. A header that is
/// present but unusable is rejected with 401 rather than silently ignored.
pub async fn authenticate(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = match extract_bearer(&headers).map_err(ApiError::unauthorized)? {
        None => Session::anonymous(),
        Some(token) => {
            let claims = decode_jwt(token).map_err(|e| ApiError::unauthorized(e.to_string()))?;

            let mut user = state
                .users
                .find_by_id(claims.sub)
                .await?
                .ok_or_else(|| ApiError::unauthorized("Your session's user no longer exists."))?;

            let now = Utc::now();
            match state.users.touch_last_seen(user.id, now).await {
                Ok(()) => user.last_seen = now,
                Err(e) => tracing::warn!(user_id = %user.id, "Failed to update last seen: {}", e),
            }

            Session::signed_in(user)
        }
    };

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Bearer token from the Authorization header; `Ok(None)` when there is no header.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, String> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}
