//! # State Module
//!
//! Application state for the storefront service.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────────┐      │
//! │  │   DbState    │  │   CacheState     │  │  StorefrontConfig    │      │
//! │  │              │  │                  │  │                      │      │
//! │  │  Database    │  │  TtlCache        │  │  policies            │      │
//! │  │  Settlement  │  │  catalog TTL     │  │  TTLs                │      │
//! │  │  Engine      │  │  profile TTL     │  │  retry budget        │      │
//! │  └──────────────┘  └──────────────────┘  └──────────────────────┘      │
//! │                                                                         │
//! │  Each command takes only the state it needs.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cache;
mod db;

use std::time::Duration;

pub use cache::TtlCache;
pub use db::DbState;

/// Cache key prefixes.
pub mod keys {
    /// Catalog listings and single-game lookups.
    pub const GAMES: &str = "games:";
    pub const CATEGORIES: &str = "categories";
    /// Profiles, by user id.
    pub const USER: &str = "user:";
    /// Login lookups, by username.
    pub const LOGIN: &str = "login:";

    pub fn user(user_id: &str) -> String {
        format!("{USER}{user_id}")
    }

    pub fn login(username: &str) -> String {
        format!("{LOGIN}{}", username.trim())
    }
}

/// The read-through cache plus the TTL for each kind of entry.
#[derive(Debug)]
pub struct CacheState {
    cache: TtlCache,
    pub catalog_ttl: Duration,
    pub profile_ttl: Duration,
}

impl CacheState {
    pub fn new(catalog_ttl: Duration, profile_ttl: Duration) -> Self {
        CacheState {
            cache: TtlCache::new(),
            catalog_ttl,
            profile_ttl,
        }
    }

    pub fn inner(&self) -> &TtlCache {
        &self.cache
    }

    /// Drops every cached catalog listing.
    pub fn invalidate_catalog(&self) {
        self.cache.invalidate_prefix(keys::GAMES);
    }

    /// Drops a user's cached profile.
    pub fn invalidate_user(&self, user_id: &str) {
        self.cache.invalidate(&keys::user(user_id));
    }
}
