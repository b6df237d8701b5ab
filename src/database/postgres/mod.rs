//! PostgreSQL implementations of the repository traits.

mod comics;
mod messages;
mod users;

pub use comics::PgComics;
pub use messages::PgMessages;
pub use users::PgUsers;

use crate::database::manager::DatabaseError;

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Turn unique-constraint failures into `DatabaseError::Conflict`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> DatabaseError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return DatabaseError::Conflict(format!("{} already exists", what));
        }
    }
    DatabaseError::Sqlx(err)
}

/// Errors when an UPDATE/DELETE touched no rows.
pub(crate) fn expect_affected(rows: u64, what: &str) -> Result<(), DatabaseError> {
    if rows == 0 {
        return Err(DatabaseError::NotFound(format!("{} not found", what)));
    }
    Ok(())
}
