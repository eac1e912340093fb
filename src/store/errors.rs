use std::time::Duration;
use uuid::Uuid;

use crate::utils::IsTransient;

// ============================================================================
// Store Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error("order {0} already exists")]
    AlreadyExists(Uuid),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored order is inconsistent: {0}")]
    Corrupt(String),

    #[error("order cannot be stored: {0}")]
    Unstorable(String),

    #[error("store operation cancelled")]
    Cancelled,

    #[error("{operation} failed after {attempts} attempts: {source}")]
    Fatal {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: Box<StoreError>,
    },
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout { .. } => true,
            StoreError::Database(err) => is_transient_sqlx(err),
            StoreError::NotFound(_)
            | StoreError::AlreadyExists(_)
            | StoreError::Corrupt(_)
            | StoreError::Unstorable(_)
            | StoreError::Cancelled
            | StoreError::Fatal { .. } => false,
        }
    }
}

/// PostgreSQL SQLSTATE codes the store reacts to.
/// Full list: <https://www.postgresql.org/docs/current/errcodes-appendix.html>
pub struct PgErrorCode;

impl PgErrorCode {
    /// Class 23: duplicate key
    pub const UNIQUE_VIOLATION: &'static str = "23505";
    /// Class 40: serialization failure
    pub const SERIALIZATION_FAILURE: &'static str = "40001";
    /// Class 40: deadlock detected
    pub const DEADLOCK_DETECTED: &'static str = "40P01";
    /// Class 53: too many connections
    pub const TOO_MANY_CONNECTIONS: &'static str = "53300";

    pub fn is_unique_violation(code: &str) -> bool {
        code == Self::UNIQUE_VIOLATION
    }

    /// Connection exceptions (class 08), rollbacks caused by concurrency,
    /// server shutdown (57P01..57P03) and connection exhaustion.
    pub fn is_transient(code: &str) -> bool {
        code.starts_with("08")
            || code == Self::SERIALIZATION_FAILURE
            || code == Self::DEADLOCK_DETECTED
            || code == Self::TOO_MANY_CONNECTIONS
            || matches!(code, "57P01" | "57P02" | "57P03")
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| PgErrorCode::is_transient(&code))
            .unwrap_or(false),
        _ => false,
    }
}

/// Maps a duplicate-key error on the order header to `AlreadyExists`.
pub(crate) fn map_unique_violation(err: sqlx::Error, uid: Uuid) -> StoreError {
    match &err {
        sqlx::Error::Database(db)
            if db.code().as_deref().is_some_and(PgErrorCode::is_unique_violation) =>
        {
            StoreError::AlreadyExists(uid)
        }
        _ => StoreError::Database(err),
    }
}
