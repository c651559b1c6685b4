//! # Repository Module
//!
//! Database repository implementations for the storefront.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Storefront command                                                    │
//! │       │                                                                 │
//! │       │  db.cart().list_items(user_id)                                 │
//! │       ▼                                                                 │
//! │  CartRepository { pool }                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                │
//! │                                                                         │
//! │  Writes that must be part of the settlement transaction are free       │
//! │  functions generic over `sqlx::Executor`, so the same SQL runs on the  │
//! │  pool or on `&mut *tx`:                                                 │
//! │                                                                         │
//! │    game::increment_total_sold(&mut *tx, game_id, qty)                  │
//! │    library::grant(&mut *tx, user_id, game_id)                          │
//! │    cart::delete_items(&mut *tx, user_id, &ids)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`](user::UserRepository) - Accounts and wallets
//! - [`GameRepository`](game::GameRepository) - Catalog and categories
//! - [`CartRepository`](cart::CartRepository) - Per-user carts
//! - [`LibraryRepository`](library::LibraryRepository) - Ownership
//! - [`OrderRepository`](order::OrderRepository) - Order history
//! - [`DiscountRepository`](discount::DiscountRepository) - Discount ledger

pub mod cart;
pub mod discount;
pub mod game;
pub mod library;
pub mod order;
pub mod user;
