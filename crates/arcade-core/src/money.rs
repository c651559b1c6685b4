//! # Money Module
//!
//! Provides the `Money` type for wallet balances, prices and discounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A wallet debited in floats drifts; a drifted wallet can go             │
//! │  fractionally negative and still look like "$0.00".                     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    balance_cents - total_cents is exact, and the database can          │
//! │    compare `balance_cents >= ?` without tolerance                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use arcade_core::money::Money;
//!
//! let price = Money::from_cents(5999); // $59.99
//! let gift_copies = price * 2;          // $119.98
//! let ten_off = price.percent_of(10);   // $6.00 (half-up)
//! assert_eq!(gift_copies.cents(), 11998);
//! assert_eq!(ten_off.cents(), 600);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Game.price_cents ──► PricedLine.line_total ──► Quote.subtotal          │
/// │                                                    │                    │
/// │  DiscountCode ──► Quote.discount ◄─────────────────┘                    │
/// │                        │                                                │
/// │                        ▼                                                │
/// │                  Quote.total ──► wallet debit ──► User.balance_cents    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
///
/// Signed so that deltas (debits) can be expressed; stored balances are
/// never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use arcade_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole dollars.
    #[inline]
    pub const fn from_dollars(dollars: i64) -> Self {
        Money(dollars * 100)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-dollar portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Line total for `qty` copies at this unit price.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Computes `percent`% of this amount, rounding half up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * percent + 50) / 100`, widened to i128 so
    /// large carts cannot overflow.
    ///
    /// ```rust
    /// use arcade_core::money::Money;
    ///
    /// // 10% of $200.00 = $20.00
    /// assert_eq!(Money::from_cents(20000).percent_of(10).cents(), 2000);
    /// // 15% of $0.99 = 14.85 cents → 15 cents
    /// assert_eq!(Money::from_cents(99).percent_of(15).cents(), 15);
    /// ```
    pub fn percent_of(&self, percent: i64) -> Money {
        let cents = (self.0 as i128 * percent as i128 + 50) / 100;
        Money::from_cents(cents as i64)
    }

    /// Subtraction that floors at zero.
    ///
    /// Used for `total = max(subtotal - discount, 0)`.
    ///
    /// ```rust
    /// use arcade_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(500);
    /// assert_eq!(subtotal.saturating_sub_floor(Money::from_cents(1000)), Money::zero());
    /// ```
    #[inline]
    pub fn saturating_sub_floor(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly `$12.34` rendering; clients format for their locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
        assert_eq!(Money::from_dollars(60).cents(), 6000);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_percent_of_rounds_half_up() {
        assert_eq!(Money::from_cents(20000).percent_of(10).cents(), 2000);
        // 5% of 10 cents = 0.5 → 1
        assert_eq!(Money::from_cents(10).percent_of(5).cents(), 1);
        // 5% of 9 cents = 0.45 → 0
        assert_eq!(Money::from_cents(9).percent_of(5).cents(), 0);
        assert_eq!(Money::from_cents(12345).percent_of(100).cents(), 12345);
        assert_eq!(Money::from_cents(12345).percent_of(0).cents(), 0);
    }

    #[test]
    fn test_saturating_sub_floor() {
        let subtotal = Money::from_cents(6000);
        assert_eq!(subtotal.saturating_sub_floor(Money::from_cents(1000)).cents(), 5000);
        assert_eq!(subtotal.saturating_sub_floor(Money::from_cents(9000)).cents(), 0);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(Money::from_cents(-1).is_negative());
        assert!(Money::from_cents(1).is_positive());
    }
}
