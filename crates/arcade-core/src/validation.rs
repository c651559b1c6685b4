//! # Validation Module
//!
//! Input validation for storefront operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP router (external)                                       │
//! │  └── Request parsing, deserialization                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Storefront command (Rust)                                    │
//! │  └── THIS MODULE: rejected here, before any store access               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (balance_cents >= 0), CHECK (quantity > 0)                  │
//! │  ├── UNIQUE (username), UNIQUE (code)                                  │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use arcade_core::validation::{validate_discount_code, validate_quantity};
//!
//! assert_eq!(validate_discount_code(" fixed10 ").unwrap(), "FIXED10");
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::DiscountKind;
use crate::{MAX_CART_ITEMS, MAX_DISCOUNT_CODE_LEN, MAX_ITEM_QUANTITY, MAX_TOP_UP_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a username.
///
/// ## Rules
/// - 3 to 32 characters after trimming
/// - ASCII letters, digits, `_` and `-` only
///
/// ```rust
/// use arcade_core::validation::validate_username;
///
/// assert!(validate_username("player_one").is_ok());
/// assert!(validate_username("no spaces").is_err());
/// ```
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if username.len() < 3 || username.len() > 32 {
        return Err(ValidationError::OutOfRange {
            field: "username length".to_string(),
            min: 3,
            max: 32,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an email address (shape only; delivery is not our concern).
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        }),
    }
}

/// Validates a game or category name.
///
/// ## Rules
/// - Must not be empty
/// - Maximum 200 characters
pub fn validate_game_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a catalog search query.
///
/// Empty is allowed (no filter). Returns the trimmed query.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates and normalises a discount code.
///
/// ## Rules
/// - Must not be empty
/// - At most `MAX_DISCOUNT_CODE_LEN` characters
/// - ASCII letters, digits, `-` and `_`
///
/// ## Returns
/// The trimmed, upper-case code used for lookup and storage.
pub fn validate_discount_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "discount code".to_string(),
        });
    }

    if code.len() > MAX_DISCOUNT_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "discount code".to_string(),
            max: MAX_DISCOUNT_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "discount code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(code.to_uppercase())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart quantity.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Game                                                         │
/// │                                                                         │
/// │  validate_quantity(qty) ← THIS FUNCTION                                │
/// │       │                                                                 │
/// │       ├── qty <= 0?  → "quantity must be positive"                     │
/// │       ├── qty > 99?  → "quantity must be between 1 and 99"             │
/// │       └── OK → CartRepository::add_item                                │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free games).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a wallet top-up amount.
///
/// ## Rules
/// - Must be positive
/// - At most `MAX_TOP_UP_CENTS` per top-up
pub fn validate_top_up_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "top-up amount".to_string(),
        });
    }

    if cents > MAX_TOP_UP_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "top-up amount".to_string(),
            min: 1,
            max: MAX_TOP_UP_CENTS,
        });
    }

    Ok(())
}

/// Validates the terms of a new discount code.
pub fn validate_discount_terms(
    kind: DiscountKind,
    value: i64,
    min_spend_cents: i64,
    max_discount_cents: Option<i64>,
    usage_limit: i64,
) -> ValidationResult<()> {
    match kind {
        DiscountKind::Percent if !(1..=100).contains(&value) => {
            return Err(ValidationError::OutOfRange {
                field: "percent value".to_string(),
                min: 1,
                max: 100,
            });
        }
        DiscountKind::Fixed if value <= 0 => {
            return Err(ValidationError::MustBePositive {
                field: "fixed value".to_string(),
            });
        }
        _ => {}
    }

    if min_spend_cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "minimum spend".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if let Some(cap) = max_discount_cents {
        if cap <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "maximum discount".to_string(),
            });
        }
    }

    if usage_limit <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "usage limit".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more distinct game fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use arcade_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
