//! Staff permissions.
//!
//! A user's `perms` is a bitmask of [`Perm`] capabilities and `perm_level` is
//! their rank among staff, where a lower number outranks a higher one. Staff
//! may only act on users they strictly outrank (or users with no rank).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::user::UserDocument;
use crate::database::repository::UserRepository;
use crate::error::ApiError;
use crate::middleware::Session;
use crate::state::AppState;

/// Highest storable permission level.
pub const PERM_LEVEL_MAX: u32 = i32::MAX as u32;

/// Bitmask of administrative capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Perm(u32);

impl Perm {
    pub const NONE: Perm = Perm(0);
    /// Grant or revoke perms for users (including yourself).
    pub const WRITE_PERMS: Perm = Perm(0b000001);
    /// Access (but not edit or delete) anything at least one normal client can access.
    pub const SUDO_READ: Perm = Perm(0b000010);
    /// Edit (but not delete) anything at least one normal client can edit.
    pub const SUDO_WRITE: Perm = Perm(0b000100);
    /// Delete anything at least one normal client can delete, and ban users.
    pub const SUDO_DELETE: Perm = Perm(0b001000);
    /// Verify the security of potentially insecure scripts written by users.
    pub const VERIFY_SCRIPTS: Perm = Perm(0b010000);
    /// Edit the achievements of users.
    pub const WRITE_ACHIEVEMENTS: Perm = Perm(0b100000);

    pub const ALL: Perm = Perm(0b111111);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Drops any bits that don't name a known perm.
    pub const fn from_bits_truncate(bits: u32) -> Perm {
        Perm(bits & Self::ALL.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether at least one bit of `other` is set in `self`.
    pub const fn intersects(self, other: Perm) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Perm {
    type Output = Perm;

    fn bitor(self, rhs: Perm) -> Perm {
        Perm(self.0 | rhs.0)
    }
}

impl BitOrAssign for Perm {
    fn bitor_assign(&mut self, rhs: Perm) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Perm {
    type Output = Perm;

    fn bitand(self, rhs: Perm) -> Perm {
        Perm(self.0 & rhs.0)
    }
}

impl fmt::Display for Perm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#08b}", self.0)
    }
}

/// Reasons a permission check can refuse access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermDenied {
    #[error("You are not authenticated.")]
    Unauthenticated,

    #[error("You have no permission level.")]
    NoPermLevel,

    #[error("You have insufficient perms.")]
    InsufficientPerms { user_perms: Perm, required_perms: Perm },

    #[error("No user was found with the specified ID.")]
    UserNotFound,

    #[error(
        "Your permission level ({user_level}) must be lower than the requested user's permission level ({requested_level})."
    )]
    PermLevelTooHigh { user_level: u32, requested_level: u32 },
}

/// Checks the acting user's own standing: they need a permission level and
/// at least one of `perms`.
pub fn check_staff(user: &UserDocument, perms: Perm) -> Result<u32, PermDenied> {
    let level = user.perm_level.ok_or(PermDenied::NoPermLevel)?;

    if !user.perms.intersects(perms) {
        return Err(PermDenied::InsufficientPerms {
            user_perms: user.perms,
            required_perms: perms,
        });
    }

    Ok(level)
}

/// Checks that `user_level` outranks the requested user.
pub fn check_outranks(user_level: u32, requested: &UserDocument) -> Result<(), PermDenied> {
    match requested.perm_level {
        Some(requested_level) if user_level >= requested_level => Err(PermDenied::PermLevelTooHigh {
            user_level,
            requested_level,
        }),
        _ => Ok(()),
    }
}

/// Requires `user` to have permission to get another user by potentially unsafe ID.
///
/// Resolves with the requested user if `user` is the requested user, or if
/// `user` has at least one of `perms` and outranks the requested user.
///
/// ```ignore
/// let target = perm_to_get_user(users, session.user(), &user_id, Perm::SUDO_READ).await?;
/// let target = perm_to_get_user(users, session.user(), &user_id, Perm::SUDO_WRITE | Perm::SUDO_DELETE).await?;
/// ```
pub async fn perm_to_get_user(
    users: &dyn UserRepository,
    user: Option<&UserDocument>,
    id: &str,
    perms: Perm,
) -> Result<UserDocument, ApiError> {
    let user = user.ok_or(PermDenied::Unauthenticated)?;

    let parsed_id = Uuid::parse_str(id).ok();
    if parsed_id == Some(user.id) {
        // The user is trying to access their own data, which is permitted.
        return Ok(user.clone());
    }

    let user_level = check_staff(user, perms)?;

    let requested_user = match parsed_id {
        Some(requested_id) => users.find_by_id(requested_id).await?,
        None => None,
    };
    let requested_user = requested_user.ok_or(PermDenied::UserNotFound)?;

    check_outranks(user_level, &requested_user)?;

    Ok(requested_user)
}

/// Requires the request's session user to have permission to get the user of
/// ID `user_id` (normally the `:userID` path parameter).
pub async fn perm_to_get_user_in_api(
    state: &AppState,
    session: &Session,
    user_id: &str,
    perms: Perm,
) -> Result<UserDocument, ApiError> {
    let result = perm_to_get_user(state.users.as_ref(), session.user(), user_id, perms).await;

    if let Err(err) = &result {
        tracing::debug!(
            acting_user = ?session.user().map(|user| user.id),
            requested_user = user_id,
            required_perms = %perms,
            "permission check refused: {}",
            err
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture_user, MemoryUsers};

    fn staff(name: &str, perms: Perm, level: u32) -> UserDocument {
        let mut user = fixture_user(name);
        user.perms = perms;
        user.perm_level = Some(level);
        user
    }

    async fn users_with(docs: &[&UserDocument]) -> MemoryUsers {
        let users = MemoryUsers::default();
        for doc in docs {
            users.insert(doc).await.unwrap();
        }
        users
    }

    #[test]
    fn perm_bits_combine() {
        let perms = Perm::SUDO_WRITE | Perm::SUDO_DELETE;
        assert_eq!(perms.bits(), 0b001100);
        assert!(perms.intersects(Perm::SUDO_DELETE | Perm::SUDO_READ));
        assert!(!perms.intersects(Perm::SUDO_READ));
        assert_eq!(perms & Perm::SUDO_WRITE, Perm::SUDO_WRITE);
        assert_eq!(Perm::from_bits_truncate(0b1_000010), Perm::SUDO_READ);
    }

    #[tokio::test]
    async fn unauthenticated_is_refused() {
        let users = MemoryUsers::default();
        let err = perm_to_get_user(&users, None, "anything", Perm::SUDO_READ)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.message(), "You are not authenticated.");
    }

    #[tokio::test]
    async fn self_access_needs_no_perms() {
        let me = fixture_user("me");
        let users = users_with(&[&me]).await;

        let found = perm_to_get_user(&users, Some(&me), &me.id.to_string(), Perm::SUDO_DELETE)
            .await
            .unwrap();
        assert_eq!(found.id, me.id);

        // Uppercase IDs still name the same user.
        let upper = me.id.to_string().to_uppercase();
        let found = perm_to_get_user(&users, Some(&me), &upper, Perm::SUDO_DELETE)
            .await
            .unwrap();
        assert_eq!(found.id, me.id);
    }

    #[tokio::test]
    async fn perms_without_level_are_refused() {
        let mut mod_without_level = fixture_user("mod");
        mod_without_level.perms = Perm::SUDO_READ;
        let target = fixture_user("target");
        let users = users_with(&[&mod_without_level, &target]).await;

        let err = perm_to_get_user(&users, Some(&mod_without_level), &target.id.to_string(), Perm::SUDO_READ)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.message(), "You have no permission level.");
    }

    #[tokio::test]
    async fn needs_one_of_the_required_perms() {
        let reader = staff("reader", Perm::SUDO_READ, 10);
        let target = fixture_user("target");
        let users = users_with(&[&reader, &target]).await;

        let err = perm_to_get_user(
            &users,
            Some(&reader),
            &target.id.to_string(),
            Perm::SUDO_WRITE | Perm::SUDO_DELETE,
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_PERMS");

        let found = perm_to_get_user(
            &users,
            Some(&reader),
            &target.id.to_string(),
            Perm::SUDO_READ | Perm::SUDO_WRITE,
        )
        .await
        .unwrap();
        assert_eq!(found.id, target.id);
    }

    #[tokio::test]
    async fn perm_checks_run_before_lookup() {
        let nobody = fixture_user("nobody");
        let users = users_with(&[&nobody]).await;

        // Not staff, so a missing user must not be revealed as 404.
        let err = perm_to_get_user(&users, Some(&nobody), "not-a-uuid", Perm::SUDO_READ)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let admin = staff("admin", Perm::ALL, 1);
        let users = users_with(&[&admin]).await;

        for id in ["not-a-uuid".to_string(), Uuid::new_v4().to_string()] {
            let err = perm_to_get_user(&users, Some(&admin), &id, Perm::SUDO_READ)
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), 404);
        }
    }

    #[tokio::test]
    async fn level_must_be_strictly_lower() {
        let senior = staff("senior", Perm::SUDO_READ, 2);
        let peer = staff("peer", Perm::SUDO_READ, 2);
        let junior = staff("junior", Perm::SUDO_READ, 3);
        let users = users_with(&[&senior, &peer, &junior]).await;

        let err = perm_to_get_user(&users, Some(&senior), &peer.id.to_string(), Perm::SUDO_READ)
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "Your permission level (2) must be lower than the requested user's permission level (2)."
        );

        let err = perm_to_get_user(&users, Some(&junior), &senior.id.to_string(), Perm::SUDO_READ)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let found = perm_to_get_user(&users, Some(&senior), &junior.id.to_string(), Perm::SUDO_READ)
            .await
            .unwrap();
        assert_eq!(found.id, junior.id);
    }

    #[tokio::test]
    async fn users_without_level_can_be_managed_by_any_staff() {
        let lowest = staff("lowest", Perm::SUDO_WRITE, 1000);
        let target = fixture_user("target");
        let users = users_with(&[&lowest, &target]).await;

        let found = perm_to_get_user(&users, Some(&lowest), &target.id.to_string(), Perm::SUDO_WRITE)
            .await
            .unwrap();
        assert_eq!(found.id, target.id);
    }
}
