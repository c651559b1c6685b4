//! # API Error Type
//!
//! Unified error type for storefront commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Storefront                         │
//! │                                                                         │
//! │  HTTP router (external)          Storefront                             │
//! │  ──────────────────────          ──────────                             │
//! │                                                                         │
//! │  POST /checkout                                                         │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Store error? ──── DbError::QueryFailed("...") ─── logged ──┐   │  │
//! │  │         │                                    generic message │   │  │
//! │  │         ▼                                                    ▼   │  │
//! │  │  Domain error? ─── CoreError::InsufficientFunds ───────► ApiError│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  ◄──── { "success": false, "code": "INSUFFICIENT_FUNDS", ... } ──────  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Store error detail is logged and never returned to the caller.

use arcade_core::CoreError;
use arcade_db::{DbError, SettlementError};
use serde::Serialize;

/// API error returned from storefront commands.
///
/// ## Serialization
/// ```json
/// {
///   "code": "DISCOUNT_INVALID",
///   "message": "Discount code has been used up"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Caller lacks the required role (403)
    Forbidden,

    /// Resource already exists (409)
    Conflict,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,

    /// Cart operation failed
    CartError,

    /// Wallet balance below the total
    InsufficientFunds,

    /// Supplied discount code refused
    DiscountInvalid,

    /// Game is already in the buyer's library
    AlreadyOwned,

    /// Nothing was written; the same request may be sent again
    TryAgain,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates a forbidden error.
    pub fn forbidden(action: &str) -> Self {
        ApiError::new(ErrorCode::Forbidden, format!("Admin role required to {}", action))
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                ApiError::new(ErrorCode::Conflict, format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::CheckViolation { message } => {
                tracing::error!("Constraint violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Value out of range")
            }
            DbError::Busy(e) => {
                tracing::warn!("Database busy: {}", e);
                ApiError::new(ErrorCode::TryAgain, "The store is busy, please try again")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::TryAgain, "The store is busy, please try again")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::UserNotFound(_) | CoreError::GameNotFound(_) | CoreError::NotInCart(_) => {
                ErrorCode::NotFound
            }
            CoreError::GameInactive(_) => ErrorCode::ValidationError,
            CoreError::AlreadyOwned(_) => ErrorCode::AlreadyOwned,
            CoreError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            CoreError::EmptyCart | CoreError::CartTooLarge { .. } => ErrorCode::CartError,
            CoreError::DiscountInvalid { .. } => ErrorCode::DiscountInvalid,
            CoreError::QuantityTooLarge { .. } | CoreError::Validation(_) => ErrorCode::ValidationError,
        };
        ApiError::new(code, err.to_string())
    }
}

/// Converts settlement errors to API errors.
impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::Core(e) => e.into(),
            SettlementError::Store(e) => e.into(),
            SettlementError::CommitFailed { reason } => {
                tracing::warn!("Settlement not committed: {}", reason);
                ApiError::new(
                    ErrorCode::TryAgain,
                    "Your order could not be completed and nothing was charged, please try again",
                )
            }
            // The engine reports this on the receipt; reaching here means a
            // caller surfaced it on purpose.
            SettlementError::DiscountUsageUpdateFailed { code, reason } => {
                tracing::error!(code = %code, "Discount usage update failed: {}", reason);
                ApiError::internal("Discount bookkeeping failed")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
