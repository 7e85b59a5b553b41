//! Store Error Types

use thiserror::Error;

/// Failure classes shared by the store, the transfer coordinator and the
/// HTTP gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced row is absent
    NotFound,
    /// Rejected before any write
    InvalidArgument,
    /// Concurrent modification, retryable
    Conflict,
    /// Storage unreachable, fatal
    Unavailable,
    /// Anything the caller cannot act on
    Internal,
}

/// Store error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn account_not_found(id: i64) -> Self {
        StoreError::NotFound {
            entity: "account",
            id,
        }
    }

    pub fn entry_not_found(id: i64) -> Self {
        StoreError::NotFound { entity: "entry", id }
    }

    pub fn transfer_not_found(id: i64) -> Self {
        StoreError::NotFound {
            entity: "transfer",
            id,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::InvalidArgument(_) | StoreError::Constraint(_) => {
                ErrorKind::InvalidArgument
            }
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Unavailable(_) => ErrorKind::Unavailable,
            StoreError::Database(_) => ErrorKind::Internal,
        }
    }

    /// Only conflicts are worth running the unit of work again
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// SQLSTATE codes we classify explicitly
mod sqlstate {
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(
                    sqlstate::SERIALIZATION_FAILURE
                    | sqlstate::DEADLOCK_DETECTED
                    | sqlstate::LOCK_NOT_AVAILABLE,
                ) => StoreError::Conflict(db.message().to_string()),
                Some(
                    sqlstate::FOREIGN_KEY_VIOLATION
                    | sqlstate::UNIQUE_VIOLATION
                    | sqlstate::CHECK_VIOLATION,
                ) => StoreError::Constraint(db.message().to_string()),
                Some(sqlstate::NUMERIC_VALUE_OUT_OF_RANGE) => {
                    StoreError::InvalidArgument(db.message().to_string())
                }
                _ => StoreError::Database(e.to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}
