//! # Database Migrations
//!
//! Embedded SQL migrations for the storefront schema.
//!
//! ## Schema Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  users ◄──────────┬──────────────┬─────────────────┬──────────────┐    │
//! │  (balance_cents)  │              │                 │              │    │
//! │                   │              │                 │              │    │
//! │              cart_items    library_entries       orders   discount_    │
//! │              (user,game)   (user,game)          (append)  redemptions  │
//! │                   │              │                 │       (code,user)  │
//! │                   ▼              ▼                 ▼          │         │
//! │  categories ◄── games (total_sold, is_active)      │          ▼         │
//! │                                                    └──► discount_codes │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql`
//! 3. **NEVER** modify existing migrations - always add new ones

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations embedded from `migrations/sqlite` at compile time.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Idempotent; each migration runs in its own transaction, in filename
/// order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
