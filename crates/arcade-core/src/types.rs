//! # Domain Types
//!
//! Core domain types used throughout the Arcade storefront.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │      Game       │   │  DiscountCode   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  code (UPPER)   │       │
//! │  │  username       │   │  price_cents    │   │  kind / value   │       │
//! │  │  role           │   │  total_sold     │   │  used_count     │       │
//! │  │  balance_cents  │   │  is_active      │   │  used_by        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    CartItem     │   │  LibraryEntry   │   │      Order      │       │
//! │  │  (user, game)   │   │  (user, game)   │   │  append-only    │       │
//! │  │  quantity > 0   │   │  permanent      │   │  Completed      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership Rules
//! - A `LibraryEntry` is only ever written by settlement, next to its `Order`.
//! - `Game::total_sold` only moves up, and only inside settlement.
//! - `DiscountCode::used_count` and `used_by` only move in the discount-usage
//!   step (or its compensation).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Role & Identity
// =============================================================================

/// Account role, resolved by the external auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// The caller of a storefront operation.
///
/// Settlement trusts this identity; credentials were verified upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Identity {
            user_id: user_id.into(),
            role,
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// =============================================================================
// User
// =============================================================================

/// A storefront account with its stored-value wallet.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,

    /// Produced and verified by the auth collaborator; never serialized.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,

    pub role: Role,

    /// Wallet balance in cents. Never negative.
    pub balance_cents: i64,

    pub display_name: Option<String>,
    pub avatar_url: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// A game in the catalog.
///
/// `total_sold` is a display counter, not stock: games never run out.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub name: String,
    pub description: Option<String>,

    /// Price in cents.
    pub price_cents: i64,

    pub category_id: Option<String>,

    /// Media reference in the external object store.
    pub image_url: Option<String>,

    pub total_sold: i64,

    /// Soft-delete flag.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Game {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Sort order for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum GameSort {
    #[default]
    Name,
    PriceAsc,
    PriceDesc,
    BestSelling,
    Newest,
}

/// Filter for `listGames`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct GameFilter {
    pub category_id: Option<String>,
    /// Case-insensitive substring match on the name.
    pub search: Option<String>,
    /// Admin listings include soft-deleted games.
    pub include_inactive: bool,
    pub sort: GameSort,
    pub limit: Option<u32>,
}

impl GameFilter {
    /// Stable string form, used as a cache key suffix.
    pub fn cache_key(&self) -> String {
        format!(
            "c={};q={};i={};s={:?};l={}",
            self.category_id.as_deref().unwrap_or(""),
            self.search.as_deref().unwrap_or("").to_lowercase(),
            self.include_inactive,
            self.sort,
            self.limit.map(|l| l.to_string()).unwrap_or_default(),
        )
    }
}

// =============================================================================
// Cart & Library
// =============================================================================

/// A raw cart row: (user, game) → quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub user_id: String,
    pub game_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

/// A cart row joined with its catalog record.
///
/// This is what the resolver prices: the catalog's current price, not a
/// price captured when the game was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub game_id: String,
    pub name: String,
    pub price_cents: i64,
    pub quantity: i64,
    pub is_active: bool,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub user_id: String,
    pub game_id: String,
    #[ts(as = "String")]
    pub acquired_at: DateTime<Utc>,
}

/// A library entry joined with game details for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OwnedGame {
    pub game_id: String,
    pub name: String,
    pub image_url: Option<String>,
    #[ts(as = "String")]
    pub acquired_at: DateTime<Utc>,
}

// =============================================================================
// Orders
// =============================================================================

/// Order status. Settlement only ever produces `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Completed,
}

/// One settled line item. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub game_id: String,
    pub quantity: i64,
    /// Unit price × quantity, before any cart-level discount.
    pub price_cents: i64,
    pub status: OrderStatus,
    pub discount_code: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Discount Codes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// `value` is a whole percentage (1-100).
    Percent,
    /// `value` is an amount in cents.
    Fixed,
}

impl FromStr for DiscountKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percent" => Ok(DiscountKind::Percent),
            "fixed" => Ok(DiscountKind::Fixed),
            _ => Err(ValidationError::NotAllowed {
                field: "kind".to_string(),
                allowed: vec!["percent".to_string(), "fixed".to_string()],
            }),
        }
    }
}

/// A promotional code in the discount ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: String,

    /// Unique, stored upper-case.
    pub code: String,

    pub kind: DiscountKind,
    pub value: i64,
    pub min_spend_cents: i64,

    /// Cap for percent codes. `None` means uncapped.
    pub max_discount_cents: Option<i64>,

    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,

    pub is_active: bool,
    pub usage_limit: i64,
    pub used_count: i64,

    /// Users who have redeemed the code. Loaded from the redemptions table.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub used_by: Vec<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl DiscountCode {
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    #[inline]
    pub fn is_used_up(&self) -> bool {
        self.used_count >= self.usage_limit
    }

    pub fn has_been_used_by(&self, user_id: &str) -> bool {
        self.used_by.iter().any(|u| u == user_id)
    }

    #[inline]
    pub fn min_spend(&self) -> Money {
        Money::from_cents(self.min_spend_cents)
    }
}

// =============================================================================
// Settlement Policies
// =============================================================================

/// What a direct purchase does when the buyer already owns the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OwnedPurchasePolicy {
    /// Settle anyway: order appended, counter bumped, library grant is a no-op.
    #[default]
    AllowRepurchase,
    /// Fail with `AlreadyOwned` before any mutation.
    Reject,
}

impl FromStr for OwnedPurchasePolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" | "allow_repurchase" => Ok(OwnedPurchasePolicy::AllowRepurchase),
            "reject" => Ok(OwnedPurchasePolicy::Reject),
            _ => Err(ValidationError::NotAllowed {
                field: "owned_purchase_policy".to_string(),
                allowed: vec!["allow".to_string(), "reject".to_string()],
            }),
        }
    }
}

/// Where the discount-usage bookkeeping happens relative to the atomic unit.
///
/// ```text
///   AfterCommit     [ atomic unit ] ──► increment + add user (race-prone)
///   ReserveFirst    claim ──► [ atomic unit ] ──(fail)──► compensate
///   InTransaction   [ claim + atomic unit ]   (serialises on the code row)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountUsageMode {
    #[default]
    AfterCommit,
    ReserveFirst,
    InTransaction,
}

impl FromStr for DiscountUsageMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "after_commit" => Ok(DiscountUsageMode::AfterCommit),
            "reserve_first" => Ok(DiscountUsageMode::ReserveFirst),
            "in_transaction" => Ok(DiscountUsageMode::InTransaction),
            _ => Err(ValidationError::NotAllowed {
                field: "discount_usage_mode".to_string(),
                allowed: vec![
                    "after_commit".to_string(),
                    "reserve_first".to_string(),
                    "in_transaction".to_string(),
                ],
            }),
        }
    }
}

impl fmt::Display for DiscountUsageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiscountUsageMode::AfterCommit => "after_commit",
            DiscountUsageMode::ReserveFirst => "reserve_first",
            DiscountUsageMode::InTransaction => "in_transaction",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(used_count: i64, usage_limit: i64) -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: "d1".into(),
            code: "FIXED10".into(),
            kind: DiscountKind::Fixed,
            value: 1000,
            min_spend_cents: 0,
            max_discount_cents: None,
            expires_at: now + Duration::days(1),
            is_active: true,
            usage_limit,
            used_count,
            used_by: vec!["u1".into()],
            created_at: now,
        }
    }

    #[test]
    fn test_discount_code_state() {
        let c = code(0, 1);
        assert!(!c.is_used_up());
        assert!(code(1, 1).is_used_up());
        assert!(c.has_been_used_by("u1"));
        assert!(!c.has_been_used_by("u2"));
        assert!(!c.is_expired(Utc::now()));
        assert!(c.is_expired(Utc::now() + Duration::days(2)));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "allow".parse::<OwnedPurchasePolicy>().unwrap(),
            OwnedPurchasePolicy::AllowRepurchase
        );
        assert_eq!(
            "REJECT".parse::<OwnedPurchasePolicy>().unwrap(),
            OwnedPurchasePolicy::Reject
        );
        assert!("maybe".parse::<OwnedPurchasePolicy>().is_err());

        assert_eq!(
            "reserve-first".parse::<DiscountUsageMode>().unwrap(),
            DiscountUsageMode::ReserveFirst
        );
        assert_eq!(DiscountUsageMode::default(), DiscountUsageMode::AfterCommit);
        assert_eq!(DiscountUsageMode::InTransaction.to_string(), "in_transaction");
    }

    #[test]
    fn test_identity_roles() {
        assert!(Identity::new("a", Role::Admin).is_admin());
        assert!(!Identity::new("u", Role::User).is_admin());
    }

    #[test]
    fn test_filter_cache_key_is_case_insensitive_on_search() {
        let a = GameFilter {
            search: Some("Doom".into()),
            ..Default::default()
        };
        let b = GameFilter {
            search: Some("doom".into()),
            ..Default::default()
        };
        assert_eq!(a.cache_key(), b.cache_key());
    }
}
