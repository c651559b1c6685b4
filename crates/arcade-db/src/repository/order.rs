//! # Order Repository
//!
//! Append-only order records, one per settled line. There is no update or
//! delete here.

use arcade_core::Order;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Repository for order history.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// A user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, game_id, quantity, price_cents, status, discount_code, created_at
            FROM orders
            WHERE user_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Completed orders for a game, summed by quantity.
    pub async fn quantity_sold(&self, game_id: &str) -> DbResult<i64> {
        let sold: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM orders WHERE game_id = ?1 AND status = 'completed'",
        )
        .bind(game_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sold)
    }

    pub async fn count_for_user_game(&self, user_id: &str, game_id: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE user_id = ?1 AND game_id = ?2",
        )
        .bind(user_id)
        .bind(game_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// Appends an order.
pub async fn insert<'e, E>(executor: E, order: &Order) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(
        id = %order.id,
        user_id = %order.user_id,
        game_id = %order.game_id,
        price_cents = order.price_cents,
        "Appending order"
    );

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, game_id, quantity, price_cents, status, discount_code, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(&order.game_id)
    .bind(order.quantity)
    .bind(order.price_cents)
    .bind(order.status)
    .bind(&order.discount_code)
    .bind(order.created_at)
    .execute(executor)
    .await?;

    Ok(())
}
