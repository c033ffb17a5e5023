//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A commission split with floats drifts by fractions of a cent on       │
//! │  every recompute, so "full" allocation flickers between runs.          │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every amount is i64 cents; every percentage is integer basis        │
//! │    points; every division rounds explicitly (half-even or floor).      │
//! │    Recomputing the same order yields bit-identical totals.             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use broker_core::money::Money;
//! use broker_core::types::Rate;
//!
//! let untaxed = Money::from_major_minor(1000, 0); // 1000.00
//! let rate = Rate::from_bps(500);                  // 5%
//!
//! assert_eq!(untaxed.percent(rate), Money::from_cents(5000));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::{Quantity, Rate};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit of the order
/// currency (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: `company_share` and intermediate differences can dip
///   below zero before clamping
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serialized as cents**: JSON carries the integer, never a float
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Line.price_unit × qty ──► Line.subtotal ──► PERCENT_OF_LINE_TOTAL     │
/// │                                                                         │
/// │  Order.untaxed_total ──► C2 evaluate ──► RecipientConfig.computed      │
/// │                                                  │                      │
/// │                          C3 allocate ◄───────────┘                      │
/// │                               │                                         │
/// │                 CommissionTotals ──► PayoutOrder.amount (scaled)        │
/// │                                                                         │
/// │  Voucher.amount ──► approval threshold ──► requires_approval           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use broker_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    ///
    /// ## Note
    /// For negative amounts, only the major unit should be negative.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Creates a Money value from whole major units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Value in major units as a float. Chart datasets only.
    #[inline]
    pub fn to_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
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

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Applies a percentage rate with Bankers Rounding (round half to even).
    ///
    /// ## Bankers Rounding Explained
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  BANKERS ROUNDING (Round Half to Even)                              │
    /// │                                                                     │
    /// │  Standard rounding always rounds 0.5 UP, causing systematic bias:  │
    /// │    0.5 → 1, 1.5 → 2, 2.5 → 3, 3.5 → 4 (always up = +bias)         │
    /// │                                                                     │
    /// │  Bankers Rounding rounds 0.5 to nearest EVEN number:               │
    /// │    0.5 → 0, 1.5 → 2, 2.5 → 2, 3.5 → 4 (alternates = no bias)      │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Example
    /// ```rust
    /// use broker_core::money::Money;
    /// use broker_core::types::Rate;
    ///
    /// // 10.50 × 5% = 0.525 → 0.52 (2 is even)
    /// assert_eq!(Money::from_cents(1050).percent(Rate::from_bps(500)).cents(), 52);
    /// // 10.70 × 5% = 0.535 → 0.54 (4 is even)
    /// assert_eq!(Money::from_cents(1070).percent(Rate::from_bps(500)).cents(), 54);
    /// ```
    pub fn percent(&self, rate: Rate) -> Money {
        // i128 keeps large sale values from overflowing
        let cents = div_round_half_even(self.0 as i128 * rate.bps() as i128, 10_000);
        Money(cents as i64)
    }

    /// Multiplies by a fractional quantity, rounding half-even to the cent.
    ///
    /// ## Example
    /// ```rust
    /// use broker_core::money::Money;
    /// use broker_core::types::Quantity;
    ///
    /// let unit_price = Money::from_major(100);
    /// assert_eq!(unit_price.multiply_quantity(Quantity::from_units(3)).cents(), 30_000);
    /// ```
    pub fn multiply_quantity(&self, qty: Quantity) -> Money {
        let cents = div_round_half_even(
            self.0 as i128 * qty.milli() as i128,
            Quantity::SCALE as i128,
        );
        Money(cents as i64)
    }

    /// Scales by `numerator / denominator`, rounding toward negative infinity.
    ///
    /// Flooring keeps a set of scaled amounts from summing past the
    /// numerator. A zero denominator yields zero.
    pub fn scale_floor(&self, numerator: Money, denominator: Money) -> Money {
        if denominator.0 == 0 {
            return Money::zero();
        }
        let product = self.0 as i128 * numerator.0 as i128;
        Money(product.div_euclid(denominator.0 as i128) as i64)
    }

    /// Ratio `self / whole` in hundredths of a percent, half-even.
    ///
    /// `Money::from_major(1).ratio_bps(Money::from_major(3))` = 3333 (33.33%).
    pub fn ratio_bps(&self, whole: Money) -> i64 {
        if whole.0 == 0 {
            return 0;
        }
        div_round_half_even(self.0 as i128 * 10_000, whole.0 as i128) as i64
    }
}

/// Integer division of `numerator / denominator` rounding half to even.
///
/// Uses euclidean division so negative numerators round symmetrically.
pub(crate) fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
    let (numerator, denominator) = if denominator < 0 {
        (-numerator, -denominator)
    } else {
        (numerator, denominator)
    };
    let quotient = numerator.div_euclid(denominator);
    let remainder = numerator.rem_euclid(denominator);
    match (remainder * 2).cmp(&denominator) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal if quotient % 2 != 0 => quotient + 1,
        _ => quotient,
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering (`1050.00`, `-5.50`). Currency symbols are the
/// renderer's concern since orders carry their own currency code.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
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
    fn mul(self, factor: i64) -> Self {
        Money(self.0 * factor)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
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
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(105_000).to_string(), "1050.00");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_half_even_rounding() {
        assert_eq!(div_round_half_even(5, 10), 0);
        assert_eq!(div_round_half_even(15, 10), 2);
        assert_eq!(div_round_half_even(25, 10), 2);
        assert_eq!(div_round_half_even(35, 10), 4);
        assert_eq!(div_round_half_even(26, 10), 3);
        assert_eq!(div_round_half_even(-25, 10), -2);
        assert_eq!(div_round_half_even(-26, 10), -3);
    }

    #[test]
    fn test_percent() {
        let untaxed = Money::from_major(1000);
        assert_eq!(untaxed.percent(Rate::from_bps(500)), Money::from_major(50));
        assert_eq!(untaxed.percent(Rate::from_bps(0)), Money::zero());
        assert_eq!(untaxed.percent(Rate::from_bps(10_000)), untaxed);
        // 0.01 × 50% = 0.005 → 0.00
        assert_eq!(Money::from_cents(1).percent(Rate::from_bps(5000)).cents(), 0);
        // 0.03 × 50% = 0.015 → 0.02
        assert_eq!(Money::from_cents(3).percent(Rate::from_bps(5000)).cents(), 2);
    }

    #[test]
    fn test_multiply_fractional_quantity() {
        let price = Money::from_cents(1000);
        assert_eq!(price.multiply_quantity(Quantity::from_milli(2_500)).cents(), 2500);
        // 0.03 × 0.5 = 0.015 → 0.02
        assert_eq!(
            Money::from_cents(3).multiply_quantity(Quantity::from_milli(500)).cents(),
            2
        );
    }

    #[test]
    fn test_scale_floor_never_exceeds_numerator() {
        let base = Money::from_cents(100_000);
        let total = Money::from_cents(120_000);
        let a = Money::from_cents(60_000).scale_floor(base, total);
        let b = Money::from_cents(60_000).scale_floor(base, total);
        assert_eq!(a.cents(), 50_000);
        assert!(a + b <= base);

        let thirds = Money::from_cents(1).scale_floor(Money::from_cents(2), Money::from_cents(3));
        assert_eq!(thirds.cents(), 0);
        assert_eq!(base.scale_floor(base, Money::zero()), Money::zero());
    }

    #[test]
    fn test_ratio_bps() {
        assert_eq!(Money::from_major(900).ratio_bps(Money::from_major(1000)), 9000);
        assert_eq!(Money::from_major(1).ratio_bps(Money::from_major(3)), 3333);
        assert_eq!(Money::from_major(1).ratio_bps(Money::zero()), 0);
    }

    #[test]
    fn test_serializes_as_cents() {
        assert_eq!(serde_json::to_string(&Money::from_cents(5000)).unwrap(), "5000");
        let parsed: Money = serde_json::from_str("1099").unwrap();
        assert_eq!(parsed.cents(), 1099);
    }
}
