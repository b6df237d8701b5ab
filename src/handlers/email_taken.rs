use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::{ApiQuery, ApiResponse, ApiResult};
use crate::state::AppState;
use crate::types::validate_email_format;

#[derive(Debug, Deserialize)]
pub struct EmailTakenQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct EmailTaken {
    /// Whether the email is taken by an existing user.
    pub taken: bool,
}

/// GET /api/emailTaken?email=
pub async fn email_taken_get(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmailTakenQuery>,
) -> ApiResult<EmailTaken> {
    validate_email_format(&query.email).map_err(|e| ApiError::invalid_field("email", e))?;

    let taken = state.users.email_taken(&query.email).await?;
    Ok(ApiResponse::success(EmailTaken { taken }))
}
