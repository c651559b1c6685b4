//! # Checkout Commands
//!
//! Thin wrappers over the [`SettlementEngine`](arcade_db::SettlementEngine).
//! A settlement moves the buyer's balance, so the cached profile is dropped
//! after every successful one.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  preview_checkout(code)  ──► Quote          (no writes)                 │
//! │                                                                         │
//! │  checkout(code)                                                         │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  engine.checkout ──► atomic unit ──► discount usage step               │
//! │     │                                                                   │
//! │     ├── Err ──────────────────────────► ApiError (nothing charged)      │
//! │     ▼                                                                   │
//! │  invalidate "user:{id}" ──► SettlementReceipt                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use arcade_core::Identity;
use arcade_core::Quote;
use arcade_db::{DiscountUsageStatus, SettlementReceipt};
use tracing::{debug, error, info};

use crate::error::ApiError;
use crate::state::{CacheState, DbState};

/// Prices the caller's cart, with an optional code, without buying.
///
/// A refused code comes back as `quote.rejection`, not as an error.
pub async fn preview_checkout(db: &DbState, identity: &Identity, code: Option<String>) -> Result<Quote, ApiError> {
    debug!(user_id = %identity.user_id, code = ?code, "preview_checkout command");

    let quote = db.settlement().preview(&identity.user_id, code.as_deref()).await?;
    Ok(quote)
}

/// Settles the caller's cart.
pub async fn checkout(
    db: &DbState,
    cache: &CacheState,
    identity: &Identity,
    code: Option<String>,
) -> Result<SettlementReceipt, ApiError> {
    debug!(user_id = %identity.user_id, code = ?code, "checkout command");

    let receipt = db.settlement().checkout(&identity.user_id, code.as_deref()).await?;
    after_settlement(cache, &receipt);
    Ok(receipt)
}

/// Buys one copy of one game without touching the cart.
pub async fn purchase_game(
    db: &DbState,
    cache: &CacheState,
    identity: &Identity,
    game_id: &str,
) -> Result<SettlementReceipt, ApiError> {
    debug!(user_id = %identity.user_id, game_id = %game_id, "purchase_game command");

    let receipt = db.settlement().purchase(&identity.user_id, game_id).await?;
    after_settlement(cache, &receipt);
    Ok(receipt)
}

fn after_settlement(cache: &CacheState, receipt: &SettlementReceipt) {
    cache.invalidate_user(&receipt.user_id);

    if let DiscountUsageStatus::Failed { reason } = &receipt.discount_usage {
        // The order stands; an operator reconciles the ledger by hand.
        error!(
            user_id = %receipt.user_id,
            code = receipt.discount_code.as_deref().unwrap_or("-"),
            reason = %reason,
            "Discount usage not recorded for a settled order"
        );
    }

    info!(
        user_id = %receipt.user_id,
        orders = receipt.orders.len(),
        total = %receipt.total,
        balance_after = %receipt.balance_after,
        "Settlement returned to caller"
    );
}
