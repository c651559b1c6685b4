//! # Discount Usage Step
//!
//! Bookkeeping on the discount ledger that runs outside the atomic unit,
//! plus the compensation that unwinds it.
//!
//! ## Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │ after_commit                                                           │
//! │   [atomic unit] ─► record_usage ─► add_redemption                      │
//! │                                      │ fails                           │
//! │                                      ▼                                 │
//! │                                   release (undo record_usage)          │
//! │   Checkout still succeeds; the receipt says the usage step failed.     │
//! │                                                                         │
//! │ reserve_first                                                          │
//! │   claim ─► add_redemption ─► [atomic unit]                             │
//! │                                 │ fails                                │
//! │                                 ▼                                      │
//! │                              release (undo claim + redemption)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Compensation only ever touches `discount_codes` and
//! `discount_redemptions`. It never reverses a wallet debit, an order or a
//! library grant.

use arcade_core::pricing::AppliedDiscount;
use arcade_core::{CoreError, DiscountRejection};
use tracing::{error, info, warn};

use crate::error::{DbError, SettlementError};
use crate::pool::Database;
use crate::repository::discount::{self, UsageUpdate};

/// After-commit usage update: increment, add the user, deactivate at the
/// limit.
///
/// Two separate writes. If the second fails, the first is released before
/// the failure is returned.
pub(crate) async fn record_after_commit(
    db: &Database,
    applied: &AppliedDiscount,
    user_id: &str,
) -> Result<UsageUpdate, SettlementError> {
    let update = increment(db, &applied.id).await.map_err(|e| usage_failed(applied, e))?;

    if update.used_count > update.usage_limit {
        // Known race: eligibility was checked before commit, so concurrent
        // checkouts can all pass and then all increment.
        warn!(
            code = %applied.code,
            used_count = update.used_count,
            usage_limit = update.usage_limit,
            "Discount code over-redeemed"
        );
    }

    if let Err(err) = discount::add_redemption(db.pool(), &applied.id, user_id).await {
        error!(code = %applied.code, user_id = %user_id, error = %err, "Failed to record discount redemption");
        compensate(db, applied, user_id, update.deactivated).await;
        return Err(usage_failed(applied, err));
    }

    info!(
        code = %applied.code,
        user_id = %user_id,
        used_count = update.used_count,
        deactivated = update.deactivated,
        "Discount usage recorded"
    );
    Ok(update)
}

async fn increment(db: &Database, discount_id: &str) -> Result<UsageUpdate, DbError> {
    let mut tx = db.pool().begin().await?;
    let update = discount::record_usage(&mut tx, discount_id).await?;
    tx.commit().await?;
    Ok(update)
}

/// Reserve-first claim, taken before the atomic unit opens.
///
/// Claim and redemption row commit together, so a refused redemption never
/// leaves a dangling increment.
pub(crate) async fn reserve(
    db: &Database,
    applied: &AppliedDiscount,
    user_id: &str,
) -> Result<UsageUpdate, SettlementError> {
    let mut tx = db.pool().begin().await.map_err(DbError::from)?;

    let update = discount::claim(&mut *tx, &applied.id)
        .await?
        .ok_or(CoreError::discount(DiscountRejection::UsedUp))?;

    match discount::add_redemption(&mut *tx, &applied.id, user_id).await {
        Ok(()) => {}
        Err(DbError::UniqueViolation { .. }) => {
            return Err(CoreError::discount(DiscountRejection::AlreadyUsedByUser).into());
        }
        Err(err) => return Err(err.into()),
    }

    tx.commit().await.map_err(DbError::from)?;

    info!(code = %applied.code, user_id = %user_id, used_count = update.used_count, "Discount usage reserved");
    Ok(update)
}

/// Best-effort undo of one usage by `user_id`.
///
/// Failures are logged, never returned: the caller is already on an error
/// path and the original error is the one worth reporting.
pub(crate) async fn compensate(db: &Database, applied: &AppliedDiscount, user_id: &str, reactivate: bool) {
    match db.discounts().release(&applied.id, user_id, reactivate).await {
        Ok(()) => info!(
            code = %applied.code,
            user_id = %user_id,
            reactivated = reactivate,
            "Discount usage compensated"
        ),
        Err(err) => error!(
            code = %applied.code,
            user_id = %user_id,
            error = %err,
            "Discount usage compensation failed; ledger needs manual correction"
        ),
    }
}

fn usage_failed(applied: &AppliedDiscount, err: DbError) -> SettlementError {
    SettlementError::DiscountUsageUpdateFailed {
        code: applied.code.clone(),
        reason: err.to_string(),
    }
}
