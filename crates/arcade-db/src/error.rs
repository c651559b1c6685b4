//! # Database Error Types
//!
//! Error types for database operations and settlement.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context, classifies busy/locked          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SettlementError ← Core rule failures + commit/usage outcomes          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (storefront) ← Store detail logged, never shown              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use arcade_core::CoreError;
use thiserror::Error;

// SQLite primary/extended result codes that mean "someone else holds the lock".
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";
const SQLITE_BUSY_SNAPSHOT: &str = "517";
const SQLITE_BUSY_TIMEOUT: &str = "773";

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - An UPDATE/DELETE by id affects zero rows
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate username
    /// - Duplicate discount code
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Cart row referencing a non-existent game
    /// - Game referencing a non-existent category
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. a balance that would go negative).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Another writer holds the database lock.
    ///
    /// ## When This Occurs
    /// - Two settlements commit at the same moment on a file database
    /// - The busy timeout elapsed while waiting for the write lock
    ///
    /// Safe to retry: nothing was written.
    #[error("Database is busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the operation can be retried unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → busy/locked, or constraint type from message
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                let busy = matches!(
                    code.as_deref(),
                    Some(SQLITE_BUSY | SQLITE_LOCKED | SQLITE_BUSY_SNAPSHOT | SQLITE_BUSY_TIMEOUT)
                ) || msg.contains("database is locked")
                    || msg.contains("database table is locked");

                if busy {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Settlement Error
// =============================================================================

/// Errors surfaced by the settlement engine.
///
/// ## What Each Variant Guarantees
/// ```text
/// ┌──────────────────────────────┬─────────────────────────────────────────┐
/// │ Core(..)                     │ Rejected before the atomic unit.        │
/// │                              │ Nothing written.                        │
/// │ Store(..)                    │ A pre-commit read failed.               │
/// │                              │ Nothing written.                        │
/// │ CommitFailed { .. }          │ Atomic unit rolled back. Safe to retry. │
/// │ DiscountUsageUpdateFailed    │ Money moved; only bookkeeping is off.   │
/// └──────────────────────────────┴─────────────────────────────────────────┘
/// ```
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] DbError),

    #[error("Settlement could not be committed: {reason}")]
    CommitFailed { reason: String },

    /// Logged and reported on the receipt; never fails a checkout.
    #[error("Discount usage update failed for {code}: {reason}")]
    DiscountUsageUpdateFailed { code: String, reason: String },
}

impl SettlementError {
    pub fn commit_failed(reason: impl Into<String>) -> Self {
        SettlementError::CommitFailed {
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            SettlementError::CommitFailed { .. } => true,
            SettlementError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DbError::Busy("database is locked".into()).is_transient());
        assert!(DbError::PoolExhausted.is_transient());
        assert!(!DbError::not_found("Game", "g1").is_transient());
        assert!(!DbError::duplicate("code", "FIXED10").is_transient());
    }

    #[test]
    fn test_settlement_retryability() {
        assert!(SettlementError::commit_failed("catalog changed").is_retryable());
        assert!(!SettlementError::Core(CoreError::EmptyCart).is_retryable());
        assert!(SettlementError::Store(DbError::PoolExhausted).is_retryable());
    }
}
