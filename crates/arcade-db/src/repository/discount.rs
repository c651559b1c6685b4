//! # Discount Repository
//!
//! The discount ledger: code records and their usage bookkeeping.
//!
//! ## Usage Bookkeeping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_usage   unconditional  used_count + 1, deactivate at limit      │
//! │  claim          conditional    same, but only WHERE active AND          │
//! │                                used_count < usage_limit                 │
//! │  add_redemption                INSERT (code, user); PK rejects repeats  │
//! │  release        compensation   used_count - 1, drop (code, user),       │
//! │                                reactivate only if our increment was     │
//! │                                the one that deactivated it              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lazy Expiry Sweep
//! Every read through this repository compares `expires_at` with the
//! current time and clears `is_active` on expired codes that are still
//! marked active. Settlement re-checks expiry itself and does not rely on
//! the sweep.

use std::collections::HashMap;

use arcade_core::pricing::normalize_code;
use arcade_core::{DiscountCode, DiscountKind};
use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const DISCOUNT_COLUMNS: &str = "id, code, kind, value, min_spend_cents, max_discount_cents, \
                                expires_at, is_active, usage_limit, used_count, created_at";

/// Fields for a new discount code.
#[derive(Debug, Clone)]
pub struct NewDiscountCode {
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub min_spend_cents: i64,
    pub max_discount_cents: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: i64,
}

/// State of a code after a usage increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageUpdate {
    pub used_count: i64,
    pub usage_limit: i64,
    pub is_active: bool,
    /// This increment is the one that switched the code off.
    pub deactivated: bool,
}

#[derive(sqlx::FromRow)]
struct UsageRow {
    used_count: i64,
    usage_limit: i64,
    is_active: bool,
}

/// Repository for the discount ledger.
#[derive(Debug, Clone)]
pub struct DiscountRepository {
    pool: SqlitePool,
}

impl DiscountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRepository { pool }
    }

    /// Creates a code. The code string is stored trimmed and upper-case.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - a code with that name exists
    pub async fn create(&self, new: NewDiscountCode) -> DbResult<DiscountCode> {
        let id = Uuid::new_v4().to_string();
        let code = normalize_code(&new.code);

        debug!(id = %id, code = %code, kind = ?new.kind, value = new.value, "Creating discount code");

        let created = sqlx::query_as::<_, DiscountCode>(&format!(
            r#"
            INSERT INTO discount_codes (
                id, code, kind, value, min_spend_cents, max_discount_cents,
                expires_at, is_active, usage_limit, used_count, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, 0, ?9)
            RETURNING {DISCOUNT_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(&code)
        .bind(new.kind)
        .bind(new.value)
        .bind(new.min_spend_cents)
        .bind(new.max_discount_cents)
        .bind(new.expires_at)
        .bind(new.usage_limit)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", code.clone()),
            other => other,
        })?;

        Ok(created)
    }

    /// Case-insensitive lookup, with the used-by set loaded.
    pub async fn find_by_code(&self, code: &str, now: DateTime<Utc>) -> DbResult<Option<DiscountCode>> {
        let code = normalize_code(code);

        let found = sqlx::query_as::<_, DiscountCode>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE code = ?1"
        ))
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?;

        match found {
            Some(mut discount) => {
                discount.used_by = self.used_by(&discount.id).await?;
                self.sweep_if_expired(&mut discount, now).await?;
                Ok(Some(discount))
            }
            None => Ok(None),
        }
    }

    pub async fn get_by_id(&self, id: &str, now: DateTime<Utc>) -> DbResult<Option<DiscountCode>> {
        let found = sqlx::query_as::<_, DiscountCode>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match found {
            Some(mut discount) => {
                discount.used_by = self.used_by(&discount.id).await?;
                self.sweep_if_expired(&mut discount, now).await?;
                Ok(Some(discount))
            }
            None => Ok(None),
        }
    }

    /// Lists every code, newest first, running the expiry sweep.
    pub async fn list(&self, now: DateTime<Utc>) -> DbResult<Vec<DiscountCode>> {
        let mut codes = sqlx::query_as::<_, DiscountCode>(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT discount_id, user_id FROM discount_redemptions ORDER BY redeemed_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut used_by: HashMap<String, Vec<String>> = HashMap::new();
        for (discount_id, user_id) in rows {
            used_by.entry(discount_id).or_default().push(user_id);
        }

        for code in &mut codes {
            code.used_by = used_by.remove(&code.id).unwrap_or_default();
            self.sweep_if_expired(code, now).await?;
        }

        Ok(codes)
    }

    /// Switches a code off.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating discount code");

        let result = sqlx::query("UPDATE discount_codes SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount code", id));
        }

        Ok(())
    }

    /// User ids that have redeemed a code.
    pub async fn used_by(&self, discount_id: &str) -> DbResult<Vec<String>> {
        let users = sqlx::query_scalar(
            "SELECT user_id FROM discount_redemptions WHERE discount_id = ?1 ORDER BY redeemed_at",
        )
        .bind(discount_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Compensation: undoes one usage by `user_id`.
    ///
    /// Decrements `used_count` (never below zero), removes the user from the
    /// used-by set, and re-activates the code when `reactivate` is set. Both
    /// writes share one transaction.
    pub async fn release(&self, discount_id: &str, user_id: &str, reactivate: bool) -> DbResult<()> {
        debug!(discount_id = %discount_id, user_id = %user_id, reactivate, "Releasing discount usage");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE discount_codes SET
                used_count = CASE WHEN used_count > 0 THEN used_count - 1 ELSE 0 END,
                is_active = CASE WHEN ?2 THEN 1 ELSE is_active END
            WHERE id = ?1
            "#,
        )
        .bind(discount_id)
        .bind(reactivate)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Discount code", discount_id));
        }

        remove_redemption(&mut *tx, discount_id, user_id).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn sweep_if_expired(&self, code: &mut DiscountCode, now: DateTime<Utc>) -> DbResult<()> {
        if !(code.is_active && code.is_expired(now)) {
            return Ok(());
        }

        let result = sqlx::query("UPDATE discount_codes SET is_active = 0 WHERE id = ?1 AND is_active = 1")
            .bind(&code.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!(code = %code.code, expires_at = %code.expires_at, "Deactivated expired discount code");
        }
        code.is_active = false;
        Ok(())
    }
}

// =============================================================================
// Usage operations on a connection or transaction
// =============================================================================

/// Unconditional usage increment; deactivates the code once the count
/// reaches the limit.
///
/// Does not check the limit: callers that validated eligibility earlier can
/// race each other past it. That overshoot is the known cost of running this
/// outside the settlement transaction.
///
/// Run it inside a transaction. The deactivating update only matches a
/// code that is still active, so `deactivated` is never set for a code
/// that was already switched off (by an admin or the expiry sweep).
pub async fn record_usage(conn: &mut SqliteConnection, discount_id: &str) -> DbResult<UsageUpdate> {
    let closing = sqlx::query_as::<_, UsageRow>(
        r#"
        UPDATE discount_codes SET used_count = used_count + 1, is_active = 0
        WHERE id = ?1 AND is_active = 1 AND used_count + 1 >= usage_limit
        RETURNING used_count, usage_limit, is_active
        "#,
    )
    .bind(discount_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = closing {
        return Ok(UsageUpdate {
            used_count: row.used_count,
            usage_limit: row.usage_limit,
            is_active: row.is_active,
            deactivated: true,
        });
    }

    let row = sqlx::query_as::<_, UsageRow>(
        r#"
        UPDATE discount_codes SET used_count = used_count + 1
        WHERE id = ?1
        RETURNING used_count, usage_limit, is_active
        "#,
    )
    .bind(discount_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Discount code", discount_id))?;

    Ok(UsageUpdate {
        used_count: row.used_count,
        usage_limit: row.usage_limit,
        is_active: row.is_active,
        deactivated: false,
    })
}

/// Conditional usage increment.
///
/// Succeeds only while the code is active and below its limit, so claims
/// can never exceed `usage_limit`. Returns `None` when the claim lost.
pub async fn claim<'e, E>(executor: E, discount_id: &str) -> DbResult<Option<UsageUpdate>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, UsageRow>(
        r#"
        UPDATE discount_codes SET
            used_count = used_count + 1,
            is_active = CASE WHEN used_count + 1 >= usage_limit THEN 0 ELSE 1 END
        WHERE id = ?1 AND is_active = 1 AND used_count < usage_limit
        RETURNING used_count, usage_limit, is_active
        "#,
    )
    .bind(discount_id)
    .fetch_optional(executor)
    .await?;

    // The WHERE clause required is_active = 1, so inactive now means we did it.
    Ok(row.map(|row| UsageUpdate {
        used_count: row.used_count,
        usage_limit: row.usage_limit,
        is_active: row.is_active,
        deactivated: !row.is_active,
    }))
}

/// Adds a user to a code's used-by set.
///
/// ## Returns
/// * `Err(DbError::UniqueViolation)` - the user already redeemed the code
pub async fn add_redemption<'e, E>(executor: E, discount_id: &str, user_id: &str) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO discount_redemptions (discount_id, user_id, redeemed_at) VALUES (?1, ?2, ?3)",
    )
    .bind(discount_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn remove_redemption<'e, E>(executor: E, discount_id: &str, user_id: &str) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM discount_redemptions WHERE discount_id = ?1 AND user_id = ?2")
        .bind(discount_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(())
}
