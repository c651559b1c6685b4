//! # Pricing & Discount Resolver
//!
//! Turns cart lines, the buyer's library and an optional discount code into
//! a [`Quote`]. Pure: no store access, no clock reads (the caller passes
//! `now`), no mutation.
//!
//! ## Resolution Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartLine[] ──► drop lines the user already owns ──► PricedLine[]      │
//! │                                                         │               │
//! │                                          subtotal = Σ unit × qty        │
//! │                                                         │               │
//! │  DiscountRequest ──► eligibility (first failure wins):  │               │
//! │     1. not found           4. used up                   │               │
//! │     2. inactive            5. below minimum spend ◄─────┘               │
//! │     3. expired             6. already used by this user                 │
//! │          │                                                              │
//! │          ├── rejected ──► discount = 0, Quote.rejection = Some(reason)  │
//! │          └── accepted ──► percent: subtotal × v / 100, capped           │
//! │                           fixed:   v                                    │
//! │                                                                         │
//! │  total = max(subtotal − discount, 0)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same function backs the "validate before checkout" preview and the
//! settlement engine, so both always agree on the numbers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, DiscountRejection};
use crate::money::Money;
use crate::types::{CartLine, DiscountCode, DiscountKind};

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// A code the buyer typed, plus whatever the ledger returned for it.
#[derive(Debug, Clone)]
pub struct DiscountRequest {
    /// Normalised (trimmed, upper-case) code.
    pub code: String,
    /// `None` when the ledger has no such code.
    pub record: Option<DiscountCode>,
}

impl DiscountRequest {
    pub fn new(raw_code: &str, record: Option<DiscountCode>) -> Self {
        DiscountRequest {
            code: normalize_code(raw_code),
            record,
        }
    }
}

/// One priced cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub game_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub line_total: Money,
}

/// The code a quote was priced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    pub id: String,
    pub code: String,
    pub usage_limit: i64,
}

/// Result of pricing a cart or a single purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    /// Game ids dropped because the buyer already owns them.
    pub excluded_owned: Vec<String>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub applied_discount: Option<AppliedDiscount>,
    /// Set when a code was supplied but refused.
    pub rejection: Option<DiscountRejection>,
}

impl Quote {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Fails with the rejection reason if a supplied code was refused.
    ///
    /// Checkout calls this; preview does not.
    pub fn require_discount_accepted(&self) -> CoreResult<()> {
        match &self.rejection {
            Some(reason) => Err(CoreError::discount(reason.clone())),
            None => Ok(()),
        }
    }

    pub fn discount_code(&self) -> Option<&str> {
        self.applied_discount.as_ref().map(|d| d.code.as_str())
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Normalises a code for lookup: trimmed, upper-case.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Checks whether `code` can be applied to `subtotal` by `user_id`.
///
/// Conditions are checked in a fixed order and the first failure is
/// reported; the ledger lookup (not found) is the caller's first check.
/// A code switched off by reaching its limit reports `UsedUp`, not
/// `Inactive`.
pub fn evaluate_code(
    code: &DiscountCode,
    subtotal: Money,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DiscountRejection> {
    if !code.is_active {
        if code.is_used_up() {
            return Err(DiscountRejection::UsedUp);
        }
        return Err(DiscountRejection::Inactive);
    }
    if code.is_expired(now) {
        return Err(DiscountRejection::Expired);
    }
    if code.is_used_up() {
        return Err(DiscountRejection::UsedUp);
    }
    if subtotal < code.min_spend() {
        return Err(DiscountRejection::BelowMinimumSpend {
            minimum: code.min_spend(),
        });
    }
    if code.has_been_used_by(user_id) {
        return Err(DiscountRejection::AlreadyUsedByUser);
    }
    Ok(())
}

/// Discount amount an eligible code grants on `subtotal`.
pub fn discount_amount(code: &DiscountCode, subtotal: Money) -> Money {
    match code.kind {
        DiscountKind::Percent => {
            let raw = subtotal.percent_of(code.value);
            match code.max_discount_cents {
                Some(cap) => raw.min(Money::from_cents(cap)),
                None => raw,
            }
        }
        DiscountKind::Fixed => Money::from_cents(code.value),
    }
}

/// Game IDs of lines that block settlement: delisted games the user does
/// not already own. Owned lines are dropped before this matters, delisted
/// or not.
pub fn unavailable_lines(lines: &[CartLine], owned: &HashSet<String>) -> Vec<String> {
    lines
        .iter()
        .filter(|l| !l.is_active && !owned.contains(&l.game_id))
        .map(|l| l.game_id.clone())
        .collect()
}

/// Prices `lines` for `user_id`.
///
/// Owned games are removed before anything is summed, so a buyer never
/// pays for, or discounts against, a game already in their library.
pub fn resolve_quote(
    lines: &[CartLine],
    owned: &HashSet<String>,
    discount: Option<&DiscountRequest>,
    user_id: &str,
    now: DateTime<Utc>,
) -> Quote {
    let mut priced = Vec::with_capacity(lines.len());
    let mut excluded_owned = Vec::new();

    for line in lines {
        if owned.contains(&line.game_id) {
            excluded_owned.push(line.game_id.clone());
            continue;
        }
        let unit_price = Money::from_cents(line.price_cents);
        priced.push(PricedLine {
            game_id: line.game_id.clone(),
            name: line.name.clone(),
            unit_price,
            quantity: line.quantity,
            line_total: unit_price.multiply_quantity(line.quantity),
        });
    }

    let subtotal: Money = priced.iter().map(|l| l.line_total).sum();

    let mut quote = Quote {
        lines: priced,
        excluded_owned,
        subtotal,
        discount: Money::zero(),
        total: subtotal,
        applied_discount: None,
        rejection: None,
    };

    let Some(request) = discount else {
        return quote;
    };

    let outcome = match &request.record {
        None => Err(DiscountRejection::NotFound),
        Some(code) => evaluate_code(code, subtotal, user_id, now).map(|()| code),
    };

    match outcome {
        Ok(code) => {
            quote.discount = discount_amount(code, subtotal);
            quote.total = subtotal.saturating_sub_floor(quote.discount);
            quote.applied_discount = Some(AppliedDiscount {
                id: code.id.clone(),
                code: code.code.clone(),
                usage_limit: code.usage_limit,
            });
        }
        Err(reason) => quote.rejection = Some(reason),
    }

    quote
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn line(id: &str, price_cents: i64, quantity: i64) -> CartLine {
        CartLine {
            game_id: id.to_string(),
            name: format!("Game {id}"),
            price_cents,
            quantity,
            is_active: true,
            image_url: None,
        }
    }

    fn code(kind: DiscountKind, value: i64) -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: "disc-1".into(),
            code: "CODE".into(),
            kind,
            value,
            min_spend_cents: 0,
            max_discount_cents: None,
            expires_at: now + Duration::days(30),
            is_active: true,
            usage_limit: 10,
            used_count: 0,
            used_by: Vec::new(),
            created_at: now,
        }
    }

    fn request(record: DiscountCode) -> DiscountRequest {
        DiscountRequest::new(" code ", Some(record))
    }

    #[test]
    fn test_no_code_means_no_discount() {
        let q = resolve_quote(&[line("a", 6000, 1)], &HashSet::new(), None, "u1", Utc::now());
        assert_eq!(q.subtotal.cents(), 6000);
        assert_eq!(q.discount, Money::zero());
        assert_eq!(q.total.cents(), 6000);
        assert!(q.rejection.is_none());
    }

    #[test]
    fn test_fixed_code() {
        let req = request(code(DiscountKind::Fixed, 1000));
        let q = resolve_quote(&[line("a", 6000, 1)], &HashSet::new(), Some(&req), "u1", Utc::now());
        assert_eq!(q.discount.cents(), 1000);
        assert_eq!(q.total.cents(), 5000);
        assert_eq!(q.discount_code(), Some("CODE"));
    }

    #[test]
    fn test_percent_code_with_cap() {
        let mut c = code(DiscountKind::Percent, 10);
        c.max_discount_cents = Some(500);
        let req = request(c);
        let q = resolve_quote(&[line("a", 20000, 1)], &HashSet::new(), Some(&req), "u1", Utc::now());
        assert_eq!(q.discount.cents(), 500);
        assert_eq!(q.total.cents(), 19500);
    }

    #[test]
    fn test_fixed_code_larger_than_subtotal_floors_total() {
        let req = request(code(DiscountKind::Fixed, 5000));
        let q = resolve_quote(&[line("a", 1999, 1)], &HashSet::new(), Some(&req), "u1", Utc::now());
        assert_eq!(q.total, Money::zero());
    }

    #[test]
    fn test_owned_games_excluded_before_pricing() {
        let owned: HashSet<String> = ["a".to_string()].into_iter().collect();
        let mut c = code(DiscountKind::Fixed, 100);
        c.min_spend_cents = 5000;
        let req = request(c);
        let q = resolve_quote(
            &[line("a", 6000, 1), line("b", 3000, 1)],
            &owned,
            Some(&req),
            "u1",
            Utc::now(),
        );
        assert_eq!(q.excluded_owned, vec!["a".to_string()]);
        assert_eq!(q.subtotal.cents(), 3000);
        // The owned game's price does not count toward minimum spend.
        assert_eq!(
            q.rejection,
            Some(DiscountRejection::BelowMinimumSpend {
                minimum: Money::from_cents(5000)
            })
        );
        assert_eq!(q.total.cents(), 3000);
    }

    #[test]
    fn test_owned_delisted_line_does_not_block() {
        let mut owned_delisted = line("a", 6000, 1);
        owned_delisted.is_active = false;
        let mut delisted = line("c", 1000, 1);
        delisted.is_active = false;
        let owned: HashSet<String> = ["a".to_string()].into_iter().collect();

        let lines = [owned_delisted, line("b", 3000, 1), delisted];
        assert_eq!(unavailable_lines(&lines, &owned), vec!["c".to_string()]);
        assert!(unavailable_lines(&lines[..2], &owned).is_empty());
    }

    #[test]
    fn test_each_rejection_reason() {
        let now = Utc::now();
        let lines = [line("a", 6000, 1)];
        let none = HashSet::new();

        let missing = DiscountRequest::new("nope", None);
        let q = resolve_quote(&lines, &none, Some(&missing), "u1", now);
        assert_eq!(q.rejection, Some(DiscountRejection::NotFound));

        let mut inactive = code(DiscountKind::Fixed, 100);
        inactive.is_active = false;
        assert_eq!(
            evaluate_code(&inactive, Money::from_cents(6000), "u1", now),
            Err(DiscountRejection::Inactive)
        );

        let mut expired = code(DiscountKind::Fixed, 100);
        expired.expires_at = now - Duration::seconds(1);
        assert_eq!(
            evaluate_code(&expired, Money::from_cents(6000), "u1", now),
            Err(DiscountRejection::Expired)
        );

        let mut used_up = code(DiscountKind::Fixed, 100);
        used_up.used_count = used_up.usage_limit;
        assert_eq!(
            evaluate_code(&used_up, Money::from_cents(6000), "u1", now),
            Err(DiscountRejection::UsedUp)
        );

        // Deactivated by the usage that reached the limit.
        used_up.is_active = false;
        assert_eq!(
            evaluate_code(&used_up, Money::from_cents(6000), "u1", now),
            Err(DiscountRejection::UsedUp)
        );

        let mut reused = code(DiscountKind::Fixed, 100);
        reused.used_by.push("u1".into());
        assert_eq!(
            evaluate_code(&reused, Money::from_cents(6000), "u1", now),
            Err(DiscountRejection::AlreadyUsedByUser)
        );
        assert_eq!(evaluate_code(&reused, Money::from_cents(6000), "u2", now), Ok(()));
    }

    #[test]
    fn test_rejection_surfaces_through_require() {
        let req = DiscountRequest::new("nope", None);
        let q = resolve_quote(&[line("a", 100, 1)], &HashSet::new(), Some(&req), "u1", Utc::now());
        assert!(matches!(
            q.require_discount_accepted(),
            Err(CoreError::DiscountInvalid {
                reason: DiscountRejection::NotFound
            })
        ));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  save10cap5 "), "SAVE10CAP5");
    }

    proptest! {
        #[test]
        fn prop_total_within_bounds(
            prices in prop::collection::vec((0i64..100_000, 1i64..5), 0..8),
            kind_is_percent in any::<bool>(),
            value in 0i64..=100,
            cap in prop::option::of(0i64..50_000),
        ) {
            let lines: Vec<CartLine> = prices
                .iter()
                .enumerate()
                .map(|(i, (p, q))| line(&i.to_string(), *p, *q))
                .collect();
            let mut c = if kind_is_percent {
                code(DiscountKind::Percent, value)
            } else {
                code(DiscountKind::Fixed, value * 1000)
            };
            c.max_discount_cents = cap;
            let req = request(c);
            let q = resolve_quote(&lines, &HashSet::new(), Some(&req), "u1", Utc::now());

            prop_assert!(q.total >= Money::zero());
            prop_assert!(q.total <= q.subtotal);
            prop_assert_eq!(q.total, q.subtotal.saturating_sub_floor(q.discount));
        }

        #[test]
        fn prop_capped_percent_never_exceeds_cap(
            subtotal in 0i64..10_000_000,
            pct in 0i64..=100,
            cap in 0i64..100_000,
        ) {
            let mut c = code(DiscountKind::Percent, pct);
            c.max_discount_cents = Some(cap);
            let d = discount_amount(&c, Money::from_cents(subtotal));
            prop_assert!(d.cents() <= cap);
            prop_assert!(d.cents() <= subtotal);
        }
    }
}
