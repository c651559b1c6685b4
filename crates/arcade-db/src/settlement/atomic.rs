//! # Atomic Unit
//!
//! The all-or-nothing part of settlement: one SQLite transaction that
//! debits the wallet, appends orders, bumps sold counters, grants library
//! entries and clears the settled cart rows.
//!
//! ## Statement Order
//! ```text
//! BEGIN
//!  1. UPDATE users SET balance = balance - total WHERE balance >= total
//!     (first statement is a write: takes the write lock before any read,
//!      so the snapshot below cannot go stale mid-transaction)
//!  2. [in-transaction discount mode] conditional claim + redemption row
//!  3. per line:
//!       re-read game ─► still active? same price? else abort
//!       re-check ownership (policy dependent)
//!       INSERT order
//!       total_sold = total_sold + qty
//!       INSERT library entry ON CONFLICT DO NOTHING
//!  4. DELETE quoted cart rows (checkout only)
//! COMMIT
//! ```
//!
//! Busy/locked aborts are retried with exponential backoff; anything else
//! rolls back and is reported once.

use std::time::Duration;

use arcade_core::pricing::AppliedDiscount;
use arcade_core::{CoreError, DiscountRejection, Money, Order, OrderStatus, Quote};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, SettlementError};
use crate::repository::discount::{self, UsageUpdate};
use crate::repository::{cart, game, library, order, user};

/// What to do when the buyer turns out to own a line's game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OwnershipCheck {
    /// Direct purchase under the allow policy: settle anyway.
    Skip,
    /// Direct purchase under the reject policy: fail with `AlreadyOwned`.
    Reject,
    /// Checkout: the library changed since the quote; abort and let the
    /// caller retry with a fresh quote.
    AbortIfChanged,
}

/// Everything the unit needs, fixed before the transaction opens.
#[derive(Debug)]
pub(crate) struct UnitPlan<'a> {
    pub user_id: &'a str,
    pub quote: &'a Quote,
    pub ownership: OwnershipCheck,
    pub clear_cart: bool,
    /// Claim this code inside the transaction.
    pub claim_in_tx: Option<&'a AppliedDiscount>,
}

#[derive(Debug)]
pub(crate) struct UnitOutcome {
    pub orders: Vec<Order>,
    pub balance_after: Money,
    pub claim: Option<UsageUpdate>,
}

/// Retry policy for transient aborts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Why one attempt failed.
#[derive(Debug)]
enum AttemptError {
    /// A business rule failed inside the transaction. Not retried.
    Rejected(CoreError),
    /// The world moved under the quote. Not retried here; the caller can.
    Stale(String),
    Store(DbError),
}

impl From<DbError> for AttemptError {
    fn from(err: DbError) -> Self {
        AttemptError::Store(err)
    }
}

impl From<sqlx::Error> for AttemptError {
    fn from(err: sqlx::Error) -> Self {
        AttemptError::Store(err.into())
    }
}

/// Runs the atomic unit, retrying transient store aborts.
pub(crate) async fn commit(
    pool: &SqlitePool,
    plan: &UnitPlan<'_>,
    retry: RetryPolicy,
) -> Result<UnitOutcome, SettlementError> {
    let mut backoff = retry.backoff();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match attempt_once(pool, plan).await {
            Ok(outcome) => return Ok(outcome),

            Err(AttemptError::Rejected(err)) => return Err(SettlementError::Core(err)),

            Err(AttemptError::Stale(reason)) => {
                warn!(user_id = %plan.user_id, reason = %reason, "Settlement aborted: quote is stale");
                return Err(SettlementError::commit_failed(reason));
            }

            Err(AttemptError::Store(err)) if err.is_transient() && attempt <= retry.max_retries => {
                let delay = backoff.next_backoff().unwrap_or(retry.max_backoff);
                warn!(
                    user_id = %plan.user_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Settlement hit a busy database, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            Err(AttemptError::Store(err)) => {
                warn!(user_id = %plan.user_id, attempt, error = %err, "Settlement transaction aborted");
                return Err(SettlementError::commit_failed(err.to_string()));
            }
        }
    }
}

async fn attempt_once(pool: &SqlitePool, plan: &UnitPlan<'_>) -> Result<UnitOutcome, AttemptError> {
    let mut tx = pool.begin().await?;

    let total = plan.quote.total;
    let balance_after = debit_wallet(&mut *tx, plan.user_id, total).await?;

    let claim = match plan.claim_in_tx {
        Some(applied) => Some(claim_code(&mut *tx, applied, plan.user_id).await?),
        None => None,
    };

    let discount_code = plan.quote.discount_code().map(str::to_string);
    let now = Utc::now();
    let mut orders = Vec::with_capacity(plan.quote.lines.len());

    for line in &plan.quote.lines {
        let current = game::fetch_game(&mut *tx, &line.game_id)
            .await?
            .ok_or_else(|| AttemptError::Rejected(CoreError::GameNotFound(line.game_id.clone())))?;

        if !current.is_active {
            return Err(AttemptError::Rejected(CoreError::GameInactive(line.game_id.clone())));
        }
        if current.price() != line.unit_price {
            return Err(AttemptError::Stale(format!(
                "catalog changed: price of {} is now {}",
                current.name,
                current.price()
            )));
        }

        match plan.ownership {
            OwnershipCheck::Skip => {}
            OwnershipCheck::Reject => {
                if library::owns(&mut *tx, plan.user_id, &line.game_id).await? {
                    return Err(AttemptError::Rejected(CoreError::AlreadyOwned(line.game_id.clone())));
                }
            }
            OwnershipCheck::AbortIfChanged => {
                if library::owns(&mut *tx, plan.user_id, &line.game_id).await? {
                    return Err(AttemptError::Stale(format!(
                        "library changed: {} is already owned",
                        current.name
                    )));
                }
            }
        }

        let record = Order {
            id: Uuid::new_v4().to_string(),
            user_id: plan.user_id.to_string(),
            game_id: line.game_id.clone(),
            quantity: line.quantity,
            price_cents: line.line_total.cents(),
            status: OrderStatus::Completed,
            discount_code: discount_code.clone(),
            created_at: now,
        };
        order::insert(&mut *tx, &record).await?;
        game::increment_total_sold(&mut *tx, &line.game_id, line.quantity).await?;
        library::grant(&mut *tx, plan.user_id, &line.game_id).await?;
        orders.push(record);
    }

    if plan.clear_cart {
        // Settled lines plus the owned lines the quote dropped. Rows added
        // after the quote was taken stay in the cart.
        let ids: Vec<String> = plan
            .quote
            .lines
            .iter()
            .map(|l| l.game_id.clone())
            .chain(plan.quote.excluded_owned.iter().cloned())
            .collect();
        cart::delete_items(&mut *tx, plan.user_id, &ids).await?;
    }

    tx.commit().await?;

    debug!(
        user_id = %plan.user_id,
        orders = orders.len(),
        total = %total,
        balance_after = %balance_after,
        "Atomic unit committed"
    );

    Ok(UnitOutcome {
        orders,
        balance_after,
        claim,
    })
}

/// Conditional debit. Reads the balance only to explain a refusal.
async fn debit_wallet(
    tx: &mut SqliteConnection,
    user_id: &str,
    total: Money,
) -> Result<Money, AttemptError> {
    if let Some(balance) = user::adjust_balance(&mut *tx, user_id, Money::zero() - total).await? {
        return Ok(balance);
    }

    let balance: Option<i64> = sqlx::query_scalar("SELECT balance_cents FROM users WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

    Err(AttemptError::Rejected(match balance {
        None => CoreError::UserNotFound(user_id.to_string()),
        Some(cents) => CoreError::InsufficientFunds {
            balance: Money::from_cents(cents),
            required: total,
        },
    }))
}

/// In-transaction claim: conditional increment plus the redemption row.
async fn claim_code(
    tx: &mut SqliteConnection,
    applied: &AppliedDiscount,
    user_id: &str,
) -> Result<UsageUpdate, AttemptError> {
    let update = discount::claim(&mut *tx, &applied.id)
        .await?
        .ok_or_else(|| AttemptError::Rejected(CoreError::discount(DiscountRejection::UsedUp)))?;

    match discount::add_redemption(&mut *tx, &applied.id, user_id).await {
        Ok(()) => Ok(update),
        Err(DbError::UniqueViolation { .. }) => Err(AttemptError::Rejected(CoreError::discount(
            DiscountRejection::AlreadyUsedByUser,
        ))),
        Err(err) => Err(err.into()),
    }
}
