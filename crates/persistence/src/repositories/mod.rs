//! Repository implementations for database operations.
//!
//! Each repository implements one of the domain storage ports.

pub mod group;
pub mod invite;
pub mod notification;
pub mod user;

pub use group::GroupRepository;
pub use invite::InviteRepository;
pub use notification::NotificationRepository;
pub use user::UserRepository;

use domain::errors::StoreError;
use tracing::error;

/// Maps a database error onto the storage port error.
///
/// Constraint violations are reported as errors the caller can act on;
/// anything else is logged and reported as unavailable.
pub(crate) fn store_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::RowNotFound = err {
        return StoreError::NotFound;
    }
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(mapped) = constraint_error(db_err.code().as_deref(), db_err.constraint()) {
            return mapped;
        }
    }
    error!(error = %err, "Database error");
    StoreError::Unavailable(err.to_string())
}

/// 23505 is a unique violation, 23514 a check violation.
fn constraint_error(code: Option<&str>, constraint: Option<&str>) -> Option<StoreError> {
    match code? {
        "23505" => Some(StoreError::Duplicate),
        "23514" => Some(StoreError::Constraint(format!(
            "Value rejected by {}",
            constraint.unwrap_or("a check constraint")
        ))),
        _ => None,
    }
}
