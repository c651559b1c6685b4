//! # arcade-core: Pure Business Logic for the Arcade Storefront
//!
//! This crate holds the storefront's business rules as pure functions with
//! zero I/O dependencies. The settlement engine in `arcade-db` feeds it
//! catalog, cart, library and discount records and commits whatever it
//! decides.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Arcade Storefront Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          HTTP router + auth (external collaborators)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Identity { user_id, role }            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 apps/storefront (commands)                      │   │
//! │  │    list_games, add_to_cart, checkout, buy_now, top_up, ...     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ arcade-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ validation│  │   │
//! │  │   │   Game    │  │   Money   │  │   Quote   │  │   rules   │  │   │
//! │  │   │  Discount │  │  percent  │  │ eligibility│ │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              arcade-db (Database Layer + Settlement)            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (User, Game, Order, DiscountCode, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Pricing & Discount Resolver
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use arcade_core::money::Money;
//!
//! let price = Money::from_cents(6000);
//! let discount = price.percent_of(10);
//! assert_eq!(discount.cents(), 600);
//! assert_eq!((price - discount).cents(), 5400);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, DiscountRejection, ValidationError};
pub use money::Money;
pub use pricing::{AppliedDiscount, DiscountRequest, PricedLine, Quote};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct games allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single game in a cart line.
///
/// Games are digital goods; quantities above one are gift copies.
pub const MAX_ITEM_QUANTITY: i64 = 99;

/// Largest single wallet top-up, in cents.
pub const MAX_TOP_UP_CENTS: i64 = 10_000_000;

/// Maximum length of a discount code after normalisation.
pub const MAX_DISCOUNT_CODE_LEN: usize = 32;
