//! # Wallet Commands
//!
//! Balance lookup and top-up. Payment capture happens upstream; by the time
//! `top_up` is called the money has arrived.

use arcade_core::validation::validate_top_up_amount;
use arcade_core::{CoreError, Identity, Money};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::{CacheState, DbState};

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub balance: Money,
}

/// Current balance, read straight from the store.
pub async fn get_balance(db: &DbState, identity: &Identity) -> Result<WalletResponse, ApiError> {
    debug!(user_id = %identity.user_id, "get_balance command");

    let balance = db.inner().users().get_balance(&identity.user_id).await?;
    Ok(WalletResponse { balance })
}

/// Adds `amount_cents` to the caller's wallet.
pub async fn top_up(
    db: &DbState,
    cache: &CacheState,
    identity: &Identity,
    amount_cents: i64,
) -> Result<WalletResponse, ApiError> {
    debug!(user_id = %identity.user_id, amount_cents, "top_up command");

    validate_top_up_amount(amount_cents).map_err(CoreError::from)?;

    let balance = db
        .inner()
        .users()
        .adjust_balance(&identity.user_id, Money::from_cents(amount_cents))
        .await?;

    cache.invalidate_user(&identity.user_id);
    info!(
        user_id = %identity.user_id,
        amount = %Money::from_cents(amount_cents),
        balance = %balance,
        "Wallet topped up"
    );
    Ok(WalletResponse { balance })
}
