//! # Cart Repository
//!
//! Per-user mapping of game → quantity.
//!
//! ## Cart Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_item(g, 1)  ──► INSERT (user, g, 1)                               │
//! │  add_item(g, 1)  ──► ON CONFLICT: quantity = quantity + 1              │
//! │  remove_item(g)  ──► DELETE (user, g)                                  │
//! │  checkout        ──► delete_items(user, settled ids)  (in the atomic   │
//! │                                                        unit)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices are never stored here; `list_items` joins the catalog so the
//! resolver always prices against the current price.

use arcade_core::{CartItem, CartLine};
use chrono::Utc;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Repository for cart operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Adds `quantity` copies of a game, merging with an existing line.
    ///
    /// ## Returns
    /// * `Ok(Some(item))` - the line after the merge
    /// * `Ok(None)` - the merged quantity would exceed `max_quantity`;
    ///   nothing was written
    pub async fn add_item(
        &self,
        user_id: &str,
        game_id: &str,
        quantity: i64,
        max_quantity: i64,
    ) -> DbResult<Option<CartItem>> {
        debug!(user_id = %user_id, game_id = %game_id, quantity, "Adding game to cart");

        let item = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (user_id, game_id, quantity, added_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_id, game_id) DO UPDATE
                SET quantity = cart_items.quantity + excluded.quantity
                WHERE cart_items.quantity + excluded.quantity <= ?5
            RETURNING user_id, game_id, quantity, added_at
            "#,
        )
        .bind(user_id)
        .bind(game_id)
        .bind(quantity)
        .bind(Utc::now())
        .bind(max_quantity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Quantity of a game in the cart, if present.
    pub async fn get_quantity(&self, user_id: &str, game_id: &str) -> DbResult<Option<i64>> {
        let qty = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE user_id = ?1 AND game_id = ?2",
        )
        .bind(user_id)
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(qty)
    }

    /// Number of distinct games in the cart.
    pub async fn count_items(&self, user_id: &str) -> DbResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }

    /// Removes a game from the cart.
    pub async fn remove_item(&self, user_id: &str, game_id: &str) -> DbResult<()> {
        debug!(user_id = %user_id, game_id = %game_id, "Removing game from cart");

        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1 AND game_id = ?2")
            .bind(user_id)
            .bind(game_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart item", game_id));
        }

        Ok(())
    }

    /// Cart lines joined with the catalog, oldest first.
    pub async fn list_items(&self, user_id: &str) -> DbResult<Vec<CartLine>> {
        list_items(&self.pool, user_id).await
    }

    /// Empties the cart.
    pub async fn clear(&self, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Executor-generic operations (usable inside a transaction)
// =============================================================================

pub async fn list_items<'e, E>(executor: E, user_id: &str) -> DbResult<Vec<CartLine>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let lines = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT c.game_id, g.name, g.price_cents, c.quantity, g.is_active, g.image_url
        FROM cart_items c
        INNER JOIN games g ON g.id = c.game_id
        WHERE c.user_id = ?1
        ORDER BY c.added_at, c.rowid
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(lines)
}

/// Deletes the given games from a user's cart. Returns rows deleted.
pub async fn delete_items<'e, E>(executor: E, user_id: &str, game_ids: &[String]) -> DbResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    if game_ids.is_empty() {
        return Ok(0);
    }

    debug!(user_id = %user_id, count = game_ids.len(), "Deleting cart items");

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM cart_items WHERE user_id = ");
    qb.push_bind(user_id.to_string()).push(" AND game_id IN (");
    let mut separated = qb.separated(", ");
    for id in game_ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(")");

    let result = qb.build().execute(executor).await?;
    Ok(result.rows_affected())
}
