//! # arcade-db: Database Layer for the Arcade Storefront
//!
//! SQLite storage, repositories and the settlement engine that turns a cart
//! into orders, library entries and a wallet debit.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Arcade Storefront Data Flow                        │
//! │                                                                         │
//! │  Storefront command (checkout)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     arcade-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Settlement  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │   Engine     │  │   │
//! │  │   │               │    │ UserRepo      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ GameRepo      │◄───│ preview      │  │   │
//! │  │   │ WAL, busy     │    │ CartRepo      │    │ purchase     │  │   │
//! │  │   │ timeout       │    │ DiscountRepo  │    │ checkout     │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/arcade-storefront/arcade.db                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and settlement error types
//! - [`repository`] - Repository implementations (users, games, cart, ...)
//! - [`settlement`] - Preview, direct purchase and checkout
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arcade_db::{Database, DbConfig, SettlementEngine, SettlementOptions};
//!
//! let db = Database::new(DbConfig::new("arcade.db")).await?;
//! let engine = SettlementEngine::new(db.clone(), SettlementOptions::default());
//!
//! db.cart().add_item(&user_id, &game_id, 1, arcade_core::MAX_ITEM_QUANTITY).await?;
//! let receipt = engine.checkout(&user_id, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, SettlementError, SettlementResult};
pub use pool::{Database, DbConfig};
pub use settlement::{DiscountUsageStatus, SettlementEngine, SettlementOptions, SettlementReceipt};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::discount::{DiscountRepository, NewDiscountCode};
pub use repository::game::{GameRepository, GameUpdate, NewGame};
pub use repository::library::LibraryRepository;
pub use repository::order::OrderRepository;
pub use repository::user::{NewUser, UserRepository};
