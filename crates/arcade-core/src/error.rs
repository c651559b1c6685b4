//! # Error Types
//!
//! Domain-specific error types for arcade-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  arcade-core errors (this file)                                        │
//! │  ├── CoreError          - Settlement & domain rule violations          │
//! │  ├── DiscountRejection  - Why a discount code was refused              │
//! │  └── ValidationError    - Input validation failures                    │
//! │                                                                         │
//! │  arcade-db errors (separate crate)                                     │
//! │  ├── DbError            - Database operation failures                  │
//! │  └── SettlementError    - Core | Store | CommitFailed | UsageFailed    │
//! │                                                                         │
//! │  storefront errors (app)                                               │
//! │  └── ApiError           - What callers see (code + reason)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SettlementError → ApiError        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (game ID, balance, etc.)
//! 3. Every discount ineligibility has its own variant and reason string
//! 4. Each error variant maps to a user-facing message

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These are the state-conflict and not-found conditions the settlement
/// engine reports. None of them implies that anything was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The acting user does not exist.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The game does not exist in the catalog.
    #[error("Game not found: {0}")]
    GameNotFound(String),

    /// The game exists but has been soft-deleted.
    #[error("Game is no longer available: {0}")]
    GameInactive(String),

    /// The user already owns the game.
    ///
    /// ## When This Occurs
    /// - Adding an owned game to the cart
    /// - Direct purchase of an owned game under `OwnedPurchasePolicy::Reject`
    ///
    /// Cart checkout never raises this; owned lines are filtered out.
    #[error("Game already in library: {0}")]
    AlreadyOwned(String),

    /// Wallet balance is lower than the amount due.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (total $50.00)
    ///      │
    ///      ▼
    /// Wallet balance: $40.00
    ///      │
    ///      ▼
    /// InsufficientFunds { balance: $40.00, required: $50.00 }
    ///      │
    ///      ▼
    /// UI shows: "Insufficient wallet balance"
    /// ```
    #[error("Insufficient wallet balance: have {balance}, need {required}")]
    InsufficientFunds { balance: Money, required: Money },

    /// Nothing left to settle (empty cart, or every line already owned).
    #[error("Cart is empty")]
    EmptyCart,

    /// A supplied discount code cannot be applied.
    #[error("{reason}")]
    DiscountInvalid { reason: DiscountRejection },

    /// Cart has exceeded maximum allowed distinct games.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Game is not in the user's cart.
    #[error("Game {0} is not in the cart")]
    NotInCart(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for a discount rejection.
    pub fn discount(reason: DiscountRejection) -> Self {
        CoreError::DiscountInvalid { reason }
    }
}

// =============================================================================
// Discount Rejection
// =============================================================================

/// Why a discount code was refused.
///
/// Each condition is distinct and carries its own reason string; they are
/// never collapsed into a generic "invalid code" message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Error)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountRejection {
    /// No code with that (normalised) name exists.
    #[error("Discount code not found")]
    NotFound,

    /// The code has been switched off.
    #[error("Discount code is not active")]
    Inactive,

    /// The code's expiry time has passed.
    #[error("Discount code has expired")]
    Expired,

    /// The usage limit has been reached.
    #[error("Discount code has been used up")]
    UsedUp,

    /// The subtotal does not reach the code's minimum spend.
    #[error("Minimum spend of {minimum} required for this discount code")]
    BelowMinimumSpend { minimum: Money },

    /// This user has already redeemed the code.
    #[error("You have already used this discount code")]
    AlreadyUsedByUser,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// They are raised before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad code characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
