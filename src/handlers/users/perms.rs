use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, Session};
use crate::perms::{check_staff, perm_to_get_user_in_api, Perm, PERM_LEVEL_MAX};
use crate::services::users::PrivateUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPermsRequest {
    pub perms: u32,
    /// Omitted or 0 removes the user's permission level.
    #[serde(default)]
    pub perm_level: Option<u32>,
}

/// Whether `acting_level` may hand out `new_level`. Staff can never create
/// someone who outranks or ties them, but may lower their own rank.
fn may_grant_level(acting_level: u32, new_level: u32, editing_self: bool) -> bool {
    if editing_self {
        new_level >= acting_level
    } else {
        new_level > acting_level
    }
}

/// PUT /api/users/:userID/perms
pub async fn user_perms_put(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
    ApiJson(body): ApiJson<SetPermsRequest>,
) -> ApiResult<PrivateUser> {
    let acting = session.require("You are not authenticated.")?;
    // Unlike other user routes, editing your own perms still needs writePerms.
    let acting_level = check_staff(acting, Perm::WRITE_PERMS)?;

    let user = perm_to_get_user_in_api(&state, &session, &user_id, Perm::WRITE_PERMS).await?;
    let editing_self = user.id == acting.id;

    if body.perms & !Perm::ALL.bits() != 0 {
        return Err(ApiError::invalid_field("perms", "Unknown perm bits"));
    }

    let new_level = body.perm_level.filter(|level| *level > 0);
    if let Some(level) = new_level {
        if level > PERM_LEVEL_MAX {
            return Err(ApiError::invalid_field(
                "permLevel",
                format!("Permission level cannot exceed {}", PERM_LEVEL_MAX),
            ));
        }
        if !may_grant_level(acting_level, level, editing_self) {
            return Err(ApiError::forbidden(format!(
                "Your permission level ({}) must be lower than the permission level you grant ({}).",
                acting_level, level
            )));
        }
    }

    let user = state
        .users
        .set_perms(user.id, Perm::from_bits_truncate(body.perms), new_level)
        .await?;

    tracing::info!(
        user_id = %user.id,
        granted_by = %acting.id,
        perms = %user.perms,
        perm_level = ?user.perm_level,
        "Updated perms"
    );

    Ok(ApiResponse::success(PrivateUser::from(&user)))
}
