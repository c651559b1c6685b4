//! # Game Repository
//!
//! The catalog: games and categories.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Catalog management (admin)      Settlement (atomic unit)              │
//! │  ──────────────────────────      ────────────────────────              │
//! │  create / update / soft_delete   fetch_game (re-read in tx)            │
//! │  name, price, category, media    increment_total_sold(+qty)            │
//! │                                                                         │
//! │  total_sold is NEVER written by catalog management.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Listings use `sqlx::QueryBuilder` because the filter is optional in
//! every dimension.

use arcade_core::{Category, Game, GameFilter, GameSort};
use chrono::Utc;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const GAME_COLUMNS: &str = "id, name, description, price_cents, category_id, image_url, \
                            total_sold, is_active, created_at, updated_at";

/// Upper bound on listing size regardless of the requested limit.
pub const MAX_LIST_LIMIT: u32 = 200;

/// Fields for a new game.
#[derive(Debug, Clone)]
pub struct NewGame {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub category_id: Option<String>,
    pub image_url: Option<String>,
}

/// Partial update of a game. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct GameUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category_id: Option<String>,
    pub image_url: Option<String>,
}

/// Repository for catalog operations.
#[derive(Debug, Clone)]
pub struct GameRepository {
    pool: SqlitePool,
}

impl GameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        GameRepository { pool }
    }

    /// Gets a game by id, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Game>> {
        fetch_game(&self.pool, id).await
    }

    /// Lists games matching `filter`.
    ///
    /// ## Filter Semantics
    /// - `category_id`: exact match
    /// - `search`: case-insensitive substring of the name
    /// - `include_inactive`: false hides soft-deleted games
    /// - `limit`: capped at [`MAX_LIST_LIMIT`]
    pub async fn list(&self, filter: &GameFilter) -> DbResult<Vec<Game>> {
        debug!(?filter, "Listing games");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {GAME_COLUMNS} FROM games WHERE 1 = 1"));

        if !filter.include_inactive {
            qb.push(" AND is_active = 1");
        }
        if let Some(category_id) = &filter.category_id {
            qb.push(" AND category_id = ").push_bind(category_id.clone());
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND name LIKE ")
                .push_bind(format!("%{}%", escape_like(search)))
                .push(" ESCAPE '\\'");
        }

        qb.push(match filter.sort {
            GameSort::Name => " ORDER BY name COLLATE NOCASE ASC",
            GameSort::PriceAsc => " ORDER BY price_cents ASC, name COLLATE NOCASE ASC",
            GameSort::PriceDesc => " ORDER BY price_cents DESC, name COLLATE NOCASE ASC",
            GameSort::BestSelling => " ORDER BY total_sold DESC, name COLLATE NOCASE ASC",
            GameSort::Newest => " ORDER BY created_at DESC, rowid DESC",
        });

        let limit = filter.limit.unwrap_or(MAX_LIST_LIMIT).min(MAX_LIST_LIMIT);
        qb.push(" LIMIT ").push_bind(i64::from(limit));

        let games = qb.build_query_as::<Game>().fetch_all(&self.pool).await?;

        debug!(count = games.len(), "Listed games");
        Ok(games)
    }

    /// Inserts a new, active game with `total_sold = 0`.
    pub async fn create(&self, new: NewGame) -> DbResult<Game> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, name = %new.name, price_cents = new.price_cents, "Creating game");

        let game = sqlx::query_as::<_, Game>(&format!(
            r#"
            INSERT INTO games (
                id, name, description, price_cents, category_id, image_url,
                total_sold, is_active, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 1, ?7, ?7)
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(new.name.trim())
        .bind(&new.description)
        .bind(new.price_cents)
        .bind(&new.category_id)
        .bind(&new.image_url)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(game)
    }

    /// Applies a partial update. Never touches `total_sold`.
    pub async fn update(&self, id: &str, update: GameUpdate) -> DbResult<Game> {
        debug!(id = %id, ?update, "Updating game");

        let game = sqlx::query_as::<_, Game>(&format!(
            r#"
            UPDATE games SET
                name = COALESCE(?2, name),
                description = COALESCE(?3, description),
                price_cents = COALESCE(?4, price_cents),
                category_id = COALESCE(?5, category_id),
                image_url = COALESCE(?6, image_url),
                updated_at = ?7
            WHERE id = ?1
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(&update.description)
        .bind(update.price_cents)
        .bind(&update.category_id)
        .bind(&update.image_url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        game.ok_or_else(|| DbError::not_found("Game", id))
    }

    /// Soft-deletes a game by setting `is_active = 0`.
    ///
    /// Orders and library entries keep referencing it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting game");

        let result = sqlx::query("UPDATE games SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Game", id));
        }

        Ok(())
    }

    /// Sold counter for a game.
    pub async fn total_sold(&self, id: &str) -> DbResult<i64> {
        let sold: Option<i64> = sqlx::query_scalar("SELECT total_sold FROM games WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        sold.ok_or_else(|| DbError::not_found("Game", id))
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description FROM categories ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn create_category(&self, name: &str, description: Option<&str>) -> DbResult<Category> {
        let id = Uuid::new_v4().to_string();
        debug!(id = %id, name = %name, "Creating category");

        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, description
            "#,
        )
        .bind(&id)
        .bind(name.trim())
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("category", name.trim()),
            other => other,
        })?;

        Ok(category)
    }
}

// =============================================================================
// Executor-generic operations (usable inside a transaction)
// =============================================================================

/// Reads one game. Inside a transaction this sees the transaction's snapshot.
pub async fn fetch_game<'e, E>(executor: E, id: &str) -> DbResult<Option<Game>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let game = sqlx::query_as::<_, Game>(&format!(
        "SELECT {GAME_COLUMNS} FROM games WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(game)
}

/// Delta update of the sold counter: `total_sold = total_sold + delta`.
///
/// Never read-modify-write; two concurrent settlements both land.
pub async fn increment_total_sold<'e, E>(executor: E, id: &str, delta: i64) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(game_id = %id, delta, "Incrementing total_sold");

    let result = sqlx::query(
        "UPDATE games SET total_sold = total_sold + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(id)
    .bind(delta)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Game", id));
    }

    Ok(())
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
