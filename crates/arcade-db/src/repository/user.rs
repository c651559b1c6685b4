//! # User Repository
//!
//! Accounts and the stored-value wallet.
//!
//! ## Wallet Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  balance_cents is only moved by:                                        │
//! │    • top-up         adjust_balance(+amount)      (this repository)      │
//! │    • settlement     debit_wallet(-total)         (inside the atomic     │
//! │                                                   unit)                 │
//! │                                                                         │
//! │  Both are delta updates guarded by `balance_cents + delta >= 0`, so a  │
//! │  stale read can never push a wallet below zero.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use arcade_core::{Money, Role, User};
use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const USER_SELECT: &str = r#"
    SELECT id, username, email, password_hash, role, balance_cents,
           display_name, avatar_url, created_at, updated_at
    FROM users
"#;

/// Fields for a new account. The hash comes from the auth collaborator.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub balance_cents: i64,
    pub display_name: Option<String>,
}

/// Repository for users and wallets.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates an account.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - username already taken
    pub async fn create(&self, new: NewUser) -> DbResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, username = %new.username, role = %new.role.as_str(), "Creating user");

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, role, balance_cents,
                display_name, avatar_url, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?8)
            RETURNING id, username, email, password_hash, role, balance_cents,
                      display_name, avatar_url, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(new.username.trim())
        .bind(new.email.trim())
        .bind(&new.password_hash)
        .bind(new.role)
        .bind(new.balance_cents)
        .bind(&new.display_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("username", new.username.trim()),
            other => other,
        })?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE username = ?1"))
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Current wallet balance.
    pub async fn get_balance(&self, id: &str) -> DbResult<Money> {
        let cents: Option<i64> =
            sqlx::query_scalar("SELECT balance_cents FROM users WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        cents
            .map(Money::from_cents)
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Applies a signed delta to a wallet and returns the new balance.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no such user
    /// * `Err(DbError::CheckViolation)` - the delta would make the balance negative
    pub async fn adjust_balance(&self, id: &str, delta: Money) -> DbResult<Money> {
        debug!(user_id = %id, delta = %delta, "Adjusting wallet balance");

        match adjust_balance(&self.pool, id, delta).await? {
            Some(balance) => Ok(balance),
            None => {
                // Distinguish "no such user" from "would go negative".
                self.get_balance(id).await?;
                Err(DbError::CheckViolation {
                    message: format!("balance of user {id} cannot go below zero"),
                })
            }
        }
    }
}

// =============================================================================
// Executor-generic operations (usable inside a transaction)
// =============================================================================

/// Guarded delta update of a wallet.
///
/// Returns the new balance, or `None` when no row matched (missing user, or
/// the balance would become negative).
pub async fn adjust_balance<'e, E>(executor: E, user_id: &str, delta: Money) -> DbResult<Option<Money>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE users
        SET balance_cents = balance_cents + ?2,
            updated_at = ?3
        WHERE id = ?1 AND balance_cents + ?2 >= 0
        RETURNING balance_cents
        "#,
    )
    .bind(user_id)
    .bind(delta.cents())
    .bind(Utc::now())
    .fetch_optional(executor)
    .await?;

    Ok(balance.map(Money::from_cents))
}
