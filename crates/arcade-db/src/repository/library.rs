//! # Library Repository
//!
//! The canonical ownership record. A row for (user, game) means the user
//! owns the game permanently. Rows are granted only by settlement and never
//! deleted.

use std::collections::HashSet;

use arcade_core::OwnedGame;
use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Repository for library reads.
#[derive(Debug, Clone)]
pub struct LibraryRepository {
    pool: SqlitePool,
}

impl LibraryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LibraryRepository { pool }
    }

    /// Game ids the user owns.
    pub async fn list_owned(&self, user_id: &str) -> DbResult<Vec<String>> {
        list_owned(&self.pool, user_id).await
    }

    /// Owned game ids as a set, for filtering carts.
    pub async fn owned_set(&self, user_id: &str) -> DbResult<HashSet<String>> {
        Ok(self.list_owned(user_id).await?.into_iter().collect())
    }

    pub async fn owns(&self, user_id: &str, game_id: &str) -> DbResult<bool> {
        owns(&self.pool, user_id, game_id).await
    }

    /// The user's library with game details, most recent first.
    pub async fn list_library(&self, user_id: &str) -> DbResult<Vec<OwnedGame>> {
        let games = sqlx::query_as::<_, OwnedGame>(
            r#"
            SELECT l.game_id, g.name, g.image_url, l.acquired_at
            FROM library_entries l
            INNER JOIN games g ON g.id = l.game_id
            WHERE l.user_id = ?1
            ORDER BY l.acquired_at DESC, g.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(games)
    }

    pub async fn count_for_game(&self, game_id: &str) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM library_entries WHERE game_id = ?1")
            .bind(game_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Executor-generic operations (usable inside a transaction)
// =============================================================================

pub async fn list_owned<'e, E>(executor: E, user_id: &str) -> DbResult<Vec<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let ids = sqlx::query_scalar("SELECT game_id FROM library_entries WHERE user_id = ?1")
        .bind(user_id)
        .fetch_all(executor)
        .await?;

    Ok(ids)
}

pub async fn owns<'e, E>(executor: E, user_id: &str, game_id: &str) -> DbResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM library_entries WHERE user_id = ?1 AND game_id = ?2",
    )
    .bind(user_id)
    .bind(game_id)
    .fetch_optional(executor)
    .await?;

    Ok(found.is_some())
}

/// Upserts a library entry. Returns `true` if the row is new.
///
/// Granting an owned game again is a no-op, which is what a repurchase
/// under the allow policy relies on.
pub async fn grant<'e, E>(executor: E, user_id: &str, game_id: &str) -> DbResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO library_entries (user_id, game_id, acquired_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (user_id, game_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(game_id)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    let inserted = result.rows_affected() == 1;
    debug!(user_id = %user_id, game_id = %game_id, inserted, "Granted library entry");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::game::NewGame;
    use crate::repository::user::NewUser;
    use crate::{Database, DbConfig};
    use arcade_core::Role;

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db
            .users()
            .create(NewUser {
                username: "dave".into(),
                email: "dave@example.com".into(),
                password_hash: "hash".into(),
                role: Role::User,
                balance_cents: 0,
                display_name: None,
            })
            .await
            .unwrap();
        let game = db
            .games()
            .create(NewGame {
                name: "Puzzle Box".into(),
                description: None,
                price_cents: 500,
                category_id: None,
                image_url: None,
            })
            .await
            .unwrap();

        assert!(!db.library().owns(&user.id, &game.id).await.unwrap());
        assert!(grant(db.pool(), &user.id, &game.id).await.unwrap());
        assert!(!grant(db.pool(), &user.id, &game.id).await.unwrap());
        assert!(db.library().owns(&user.id, &game.id).await.unwrap());

        let library = db.library().list_library(&user.id).await.unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library[0].name, "Puzzle Box");
        assert_eq!(db.library().count_for_game(&game.id).await.unwrap(), 1);
    }
}
