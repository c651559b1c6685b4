//! # Arcade Storefront Library
//!
//! Service layer of the Arcade storefront. The HTTP router and the auth
//! collaborator live outside this crate; they call the functions in
//! [`commands`] with an [`Identity`](arcade_core::Identity) and the state
//! built here.
//!
//! ## Module Organization
//! ```text
//! arcade_storefront/
//! ├── lib.rs          ◄─── You are here (startup, tracing)
//! ├── main.rs         ◄─── Binary: start, wait for shutdown signal
//! ├── config.rs       ◄─── ARCADE_* environment configuration
//! ├── state/
//! │   ├── mod.rs      ◄─── CacheState, cache key prefixes
//! │   ├── db.rs       ◄─── Database + SettlementEngine wrapper
//! │   └── cache.rs    ◄─── TTL read-through cache
//! ├── commands/       ◄─── Storefront operations
//! ├── response.rs     ◄─── { success, message, data | code } envelope
//! └── error.rs        ◄─── API error type for commands
//! ```
//!
//! ## State Management
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────────┐    │
//! │  │    DbState       │ │   CacheState     │ │  StorefrontConfig    │    │
//! │  │                  │ │                  │ │                      │    │
//! │  │  • Database pool │ │  • TtlCache      │ │  • Policies          │    │
//! │  │  • Settlement    │ │  • Catalog TTL   │ │  • Cache TTLs        │    │
//! │  │    engine        │ │  • Profile TTL   │ │  • Retry budget      │    │
//! │  └──────────────────┘ └──────────────────┘ └──────────────────────┘    │
//! │                                                                         │
//! │  Each command only takes the state it needs.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod response;
pub mod state;

use std::fs;

use anyhow::Context;
use arcade_db::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::StorefrontConfig;
use state::{CacheState, DbState};

/// Everything a running storefront holds.
#[derive(Debug)]
pub struct Storefront {
    pub db: DbState,
    pub cache: CacheState,
    pub config: StorefrontConfig,
}

impl Storefront {
    /// Opens the database and builds state.
    ///
    /// ## Startup Sequence
    /// ```text
    /// 1. Create the database directory if missing
    /// 2. Connect (WAL, foreign keys, busy timeout) and run migrations
    /// 3. Build the settlement engine from the configured policies
    /// 4. Start with an empty cache
    /// ```
    pub async fn start(config: StorefrontConfig) -> anyhow::Result<Self> {
        if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
        info!(db_path = %config.db_path.display(), "Database path determined");

        let db = Database::new(config.db_config())
            .await
            .context("opening the database")?;
        info!("Database connected and migrations applied");

        let db = DbState::new(db, config.settlement_options());
        let cache = CacheState::new(config.catalog_cache_ttl, config.profile_cache_ttl);

        info!(
            owned_purchase_policy = ?config.owned_purchase_policy,
            discount_usage_mode = %config.discount_usage_mode,
            "State initialized"
        );
        Ok(Storefront { db, cache, config })
    }

    /// `true` when the store answers queries.
    pub async fn health_check(&self) -> bool {
        self.db.inner().health_check().await
    }

    pub async fn shutdown(&self) {
        self.db.inner().close().await;
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=arcade=trace` - Show trace for arcade crates only
/// - Default: INFO, DEBUG for arcade crates
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,arcade=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
