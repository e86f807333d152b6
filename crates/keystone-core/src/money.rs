//! # Money Module
//!
//! The `Money` type: a monetary value held as integer cents.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cash drawers are counted to the cent. Floating point is not.           │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004   ❌  variance of "0.00000000000004" │
//! │    10 + 20   = 30 cents              ✅  variance of exactly 0          │
//! │                                                                         │
//! │  Sale totals, session totals, petty cash and variance all flow through  │
//! │  this type, so the register reconciles to the cent.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use keystone_core::money::Money;
//! use keystone_core::quantity::Quantity;
//!
//! let price = Money::from_cents(1099);             // $10.99
//! let line = price.times(Quantity::from_units(3)); // $32.97
//! assert_eq!(line.cents(), 3297);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::quantity::{Quantity, MILLI_PER_UNIT};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that variances (counted − expected) can go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units and cents.
    ///
    /// ```rust
    /// use keystone_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(150, 0).cents(), 15_000);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money.
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

    /// Multiplies a unit price by a (possibly fractional) quantity.
    ///
    /// Half a cent rounds away from zero:
    /// ```rust
    /// use keystone_core::money::Money;
    /// use keystone_core::quantity::Quantity;
    ///
    /// // 0.333 kg at $3.00/kg = $0.999 → $1.00
    /// let total = Money::from_cents(300).times(Quantity::from_milli(333));
    /// assert_eq!(total.cents(), 100);
    /// ```
    pub fn times(&self, qty: Quantity) -> Money {
        Money(round_div(
            self.0 as i128 * qty.milli() as i128,
            MILLI_PER_UNIT as i128,
        ))
    }

    /// Tax on this amount at a rate in basis points (825 = 8.25%).
    ///
    /// ```rust
    /// use keystone_core::money::Money;
    ///
    /// // $10.00 × 8.25% = $0.825 → $0.83
    /// assert_eq!(Money::from_cents(1000).tax_at_bps(825).cents(), 83);
    /// ```
    pub fn tax_at_bps(&self, bps: u32) -> Money {
        Money(round_div(self.0 as i128 * bps as i128, 10_000))
    }
}

/// Integer division rounding half away from zero.
fn round_div(numerator: i128, denominator: i128) -> i64 {
    let half = denominator / 2;
    let rounded = if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    };
    rounded as i64
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented rendering ("$10.99"); UIs do their own localization.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
