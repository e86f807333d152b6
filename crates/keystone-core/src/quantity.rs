//! # Quantity Module
//!
//! Stock quantities as fixed-point thousandths of a unit.
//!
//! ## Why Fixed-Point?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Products sold by weight or length need fractions (0.750 kg).           │
//! │  Storing them as f64 turns "front has 2.3, request 2.3" into            │
//! │  "2.2999999 < 2.3 → shortage" unless every comparison carries an        │
//! │  epsilon.                                                               │
//! │                                                                         │
//! │  Quantity stores milli-units in an i64:                                 │
//! │     2.3 kg  →  2300                                                     │
//! │  Comparisons and subtraction are exact, so the ledger can promise       │
//! │  quantity ≥ 0 without tolerance windows.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

/// Milli-units per whole unit.
pub const MILLI_PER_UNIT: i64 = 1_000;

/// A stock quantity in thousandths of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    /// Whole units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * MILLI_PER_UNIT)
    }

    /// Thousandths of a unit.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
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

    /// Converts a decimal number of units, rounding to the nearest milli-unit.
    ///
    /// Returns `None` for NaN, infinities and values outside the i64 range.
    pub fn from_decimal(units: f64) -> Option<Self> {
        if !units.is_finite() {
            return None;
        }
        let milli = (units * MILLI_PER_UNIT as f64).round();
        if milli.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Quantity(milli as i64))
    }

    /// Parses a decimal string such as `"3"`, `"2.5"` or `"0.125"`.
    ///
    /// More than three fractional digits is rejected rather than rounded, so a
    /// typed quantity never silently changes.
    ///
    /// ```rust
    /// use keystone_core::quantity::Quantity;
    ///
    /// assert_eq!(Quantity::parse_decimal("2.5"), Some(Quantity::from_milli(2500)));
    /// assert_eq!(Quantity::parse_decimal("1.2345"), None);
    /// ```
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if frac.len() > 3
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let frac_milli: i64 = if frac.is_empty() {
            0
        } else {
            format!("{:0<3}", frac).parse().ok()?
        };
        let milli = whole.checked_mul(MILLI_PER_UNIT)?.checked_add(frac_milli)?;
        Some(Quantity(if negative { -milli } else { milli }))
    }

    #[inline]
    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    /// Addition clamped at `i64::MAX` milli-units.
    #[inline]
    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(other.0))
    }

    /// Subtraction clamped at zero.
    #[inline]
    pub fn saturating_sub(self, other: Quantity) -> Quantity {
        Quantity((self.0 - other.0).max(0))
    }
}

/// Renders `3`, `2.5`, `0.125`.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / MILLI_PER_UNIT as u64;
        let frac = abs % MILLI_PER_UNIT as u64;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let frac = format!("{:03}", frac);
            write!(f, "{}{}.{}", sign, whole, frac.trim_end_matches('0'))
        }
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::zero()
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Quantity::from_units(3).to_string(), "3");
        assert_eq!(Quantity::from_milli(2500).to_string(), "2.5");
        assert_eq!(Quantity::from_milli(125).to_string(), "0.125");
        assert_eq!(Quantity::from_milli(-1500).to_string(), "-1.5");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Quantity::parse_decimal("4"), Some(Quantity::from_units(4)));
        assert_eq!(Quantity::parse_decimal(" 0.75 "), Some(Quantity::from_milli(750)));
        assert_eq!(Quantity::parse_decimal(".5"), Some(Quantity::from_milli(500)));
        assert_eq!(Quantity::parse_decimal("-2"), Some(Quantity::from_units(-2)));
        assert_eq!(Quantity::parse_decimal("abc"), None);
        assert_eq!(Quantity::parse_decimal(""), None);
        assert_eq!(Quantity::parse_decimal("1.2.3"), None);
        assert_eq!(Quantity::parse_decimal("0.0001"), None);
    }

    #[test]
    fn test_from_decimal() {
        assert_eq!(Quantity::from_decimal(2.3), Some(Quantity::from_milli(2300)));
        assert_eq!(Quantity::from_decimal(f64::NAN), None);
        assert_eq!(Quantity::from_decimal(f64::INFINITY), None);
    }

    #[test]
    fn test_exact_arithmetic() {
        // The case floats get wrong: 0.1 + 0.2 == 0.3
        let sum = Quantity::from_milli(100) + Quantity::from_milli(200);
        assert_eq!(sum, Quantity::from_milli(300));
        assert_eq!(
            Quantity::from_units(1).saturating_sub(Quantity::from_units(3)),
            Quantity::zero()
        );
    }
}
