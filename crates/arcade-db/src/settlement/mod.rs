//! # Settlement Engine
//!
//! Turns a cart (checkout) or a single game (direct purchase) into durable
//! wallet, order, inventory counter and library effects.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Settlement Flow                                 │
//! │                                                                         │
//! │  1. PRE-CHECKS (reads only; a failure here writes nothing)             │
//! │     user exists · games exist and active · owned lines filtered        │
//! │     discount eligible · total <= balance                               │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  2. [reserve_first] claim the code                                     │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  3. ATOMIC UNIT (one transaction, retried on busy)                     │
//! │     debit · orders · total_sold · library · cart rows                  │
//! │                 │                         │ fails                       │
//! │                 │                         ▼                             │
//! │                 │              [reserve_first] compensate, return error │
//! │                 ▼                                                       │
//! │  4. [after_commit] record usage; on failure compensate, log, and       │
//! │     still report success                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Money and inventory are settled before any discount bookkeeping that is
//! allowed to fail, and compensation only ever unwinds the bookkeeping.

mod atomic;
mod usage;

use std::collections::HashSet;
use std::time::Duration;

use arcade_core::pricing::{resolve_quote, unavailable_lines, DiscountRequest};
use arcade_core::{
    CartLine, CoreError, DiscountUsageMode, Money, Order, OwnedPurchasePolicy, Quote, User,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ts_rs::TS;

use crate::error::{SettlementError, SettlementResult};
use crate::pool::Database;

use atomic::{OwnershipCheck, RetryPolicy, UnitPlan};

// =============================================================================
// Options
// =============================================================================

/// Settlement behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementOptions {
    pub owned_purchase_policy: OwnedPurchasePolicy,
    pub discount_usage_mode: DiscountUsageMode,
    /// Retries of the atomic unit after a busy/locked abort.
    pub max_commit_retries: u32,
    pub initial_retry_backoff: Duration,
    pub max_retry_backoff: Duration,
}

impl Default for SettlementOptions {
    fn default() -> Self {
        SettlementOptions {
            owned_purchase_policy: OwnedPurchasePolicy::default(),
            discount_usage_mode: DiscountUsageMode::default(),
            max_commit_retries: 3,
            initial_retry_backoff: Duration::from_millis(20),
            max_retry_backoff: Duration::from_millis(500),
        }
    }
}

impl SettlementOptions {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_commit_retries,
            initial_backoff: self.initial_retry_backoff,
            max_backoff: self.max_retry_backoff,
        }
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// Outcome of the discount-usage step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiscountUsageStatus {
    /// No code was applied.
    NotApplicable,
    Recorded,
    /// The settlement stands; the ledger update did not.
    Failed { reason: String },
}

/// What a successful settlement produced.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub user_id: String,
    pub orders: Vec<Order>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub balance_after: Money,
    pub discount_code: Option<String>,
    pub discount_usage: DiscountUsageStatus,
    /// Cart lines skipped because the buyer already owned them.
    pub excluded_owned: Vec<String>,
}

// =============================================================================
// Engine
// =============================================================================

/// The settlement engine.
///
/// ## Usage
/// ```rust,ignore
/// let engine = SettlementEngine::new(db.clone(), SettlementOptions::default());
/// let quote = engine.preview(&user_id, Some("fixed10")).await?;
/// let receipt = engine.checkout(&user_id, Some("fixed10")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    db: Database,
    options: SettlementOptions,
}

impl SettlementEngine {
    pub fn new(db: Database, options: SettlementOptions) -> Self {
        SettlementEngine { db, options }
    }

    pub fn options(&self) -> &SettlementOptions {
        &self.options
    }

    /// Prices the user's cart without writing anything.
    ///
    /// A refused code is reported through [`Quote::rejection`] with a zero
    /// discount rather than as an error.
    pub async fn preview(&self, user_id: &str, discount_code: Option<&str>) -> SettlementResult<Quote> {
        let (_, quote) = self.quote_cart(user_id, discount_code).await?;
        Ok(quote)
    }

    /// Cart checkout.
    ///
    /// ## Errors
    /// - `UserNotFound`, `GameInactive` - pre-checks
    /// - `EmptyCart` - nothing left after dropping owned games
    /// - `DiscountInvalid { reason }` - supplied code refused
    /// - `InsufficientFunds` - wallet below total
    /// - `CommitFailed` - transaction aborted; nothing written, safe to retry
    pub async fn checkout(
        &self,
        user_id: &str,
        discount_code: Option<&str>,
    ) -> SettlementResult<SettlementReceipt> {
        let (user, quote) = self.quote_cart(user_id, discount_code).await?;

        if quote.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        quote.require_discount_accepted()?;

        info!(
            user_id = %user_id,
            lines = quote.lines.len(),
            excluded_owned = quote.excluded_owned.len(),
            subtotal = %quote.subtotal,
            discount = %quote.discount,
            total = %quote.total,
            code = quote.discount_code().unwrap_or("-"),
            mode = %self.options.discount_usage_mode,
            "Starting checkout"
        );

        self.settle(&user, &quote, OwnershipCheck::AbortIfChanged, true).await
    }

    /// Direct purchase of one copy of one game, without a discount.
    ///
    /// Ownership handling follows [`OwnedPurchasePolicy`].
    pub async fn purchase(&self, user_id: &str, game_id: &str) -> SettlementResult<SettlementReceipt> {
        let user = self.load_user(user_id).await?;

        let game = self
            .db
            .games()
            .get_by_id(game_id)
            .await?
            .ok_or_else(|| CoreError::GameNotFound(game_id.to_string()))?;
        if !game.is_active {
            return Err(CoreError::GameInactive(game_id.to_string()).into());
        }

        let ownership = match self.options.owned_purchase_policy {
            OwnedPurchasePolicy::AllowRepurchase => OwnershipCheck::Skip,
            OwnedPurchasePolicy::Reject => {
                if self.db.library().owns(user_id, game_id).await? {
                    return Err(CoreError::AlreadyOwned(game_id.to_string()).into());
                }
                OwnershipCheck::Reject
            }
        };

        let line = CartLine {
            game_id: game.id.clone(),
            name: game.name.clone(),
            price_cents: game.price_cents,
            quantity: 1,
            is_active: game.is_active,
            image_url: game.image_url.clone(),
        };
        // Direct purchase never filters by ownership; the policy above decides.
        let quote = resolve_quote(&[line], &HashSet::new(), None, user_id, Utc::now());

        info!(user_id = %user_id, game_id = %game_id, total = %quote.total, "Starting direct purchase");

        self.settle(&user, &quote, ownership, false).await
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn load_user(&self, user_id: &str) -> SettlementResult<User> {
        let user = self
            .db
            .users()
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;
        Ok(user)
    }

    /// Pre-check reads shared by preview and checkout.
    async fn quote_cart(
        &self,
        user_id: &str,
        discount_code: Option<&str>,
    ) -> SettlementResult<(User, Quote)> {
        let user = self.load_user(user_id).await?;

        let lines = self.db.cart().list_items(user_id).await?;
        let owned = self.db.library().owned_set(user_id).await?;
        if let Some(game_id) = unavailable_lines(&lines, &owned).into_iter().next() {
            return Err(CoreError::GameInactive(game_id).into());
        }

        let now = Utc::now();

        let request = match discount_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                let record = self.db.discounts().find_by_code(code, now).await?;
                Some(DiscountRequest::new(code, record))
            }
            None => None,
        };

        let quote = resolve_quote(&lines, &owned, request.as_ref(), user_id, now);
        Ok((user, quote))
    }

    async fn settle(
        &self,
        user: &User,
        quote: &Quote,
        ownership: OwnershipCheck,
        clear_cart: bool,
    ) -> SettlementResult<SettlementReceipt> {
        if quote.total > user.balance() {
            return Err(CoreError::InsufficientFunds {
                balance: user.balance(),
                required: quote.total,
            }
            .into());
        }

        let applied = quote.applied_discount.as_ref();
        let mode = self.options.discount_usage_mode;

        let reservation = match (applied, mode) {
            (Some(applied), DiscountUsageMode::ReserveFirst) => {
                Some(usage::reserve(&self.db, applied, &user.id).await?)
            }
            _ => None,
        };

        let plan = UnitPlan {
            user_id: &user.id,
            quote,
            ownership,
            clear_cart,
            claim_in_tx: applied.filter(|_| mode == DiscountUsageMode::InTransaction),
        };

        let outcome = match atomic::commit(self.db.pool(), &plan, self.options.retry_policy()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if let (Some(applied), Some(reserved)) = (applied, reservation) {
                    warn!(
                        user_id = %user.id,
                        code = %applied.code,
                        error = %err,
                        "Settlement failed after the discount was reserved, compensating"
                    );
                    usage::compensate(&self.db, applied, &user.id, reserved.deactivated).await;
                }
                return Err(err);
            }
        };

        let discount_usage = match (applied, mode) {
            (None, _) => DiscountUsageStatus::NotApplicable,
            (Some(applied), DiscountUsageMode::AfterCommit) => {
                match usage::record_after_commit(&self.db, applied, &user.id).await {
                    Ok(_) => DiscountUsageStatus::Recorded,
                    Err(err) => {
                        warn!(user_id = %user.id, error = %err, "Checkout succeeded but discount usage was not recorded");
                        let reason = match err {
                            SettlementError::DiscountUsageUpdateFailed { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        DiscountUsageStatus::Failed { reason }
                    }
                }
            }
            (Some(_), DiscountUsageMode::ReserveFirst | DiscountUsageMode::InTransaction) => {
                DiscountUsageStatus::Recorded
            }
        };

        info!(
            user_id = %user.id,
            orders = outcome.orders.len(),
            total = %quote.total,
            balance_after = %outcome.balance_after,
            in_tx_claim = outcome.claim.is_some(),
            "Settlement committed"
        );

        Ok(SettlementReceipt {
            user_id: user.id.clone(),
            orders: outcome.orders,
            subtotal: quote.subtotal,
            discount: quote.discount,
            total: quote.total,
            balance_after: outcome.balance_after,
            discount_code: quote.discount_code().map(str::to_string),
            discount_usage,
            excluded_owned: quote.excluded_owned.clone(),
        })
    }
}
