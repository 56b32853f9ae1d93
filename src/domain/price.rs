//! Fixed-point price representation.
//!
//! Prices are integer thousandths of a currency unit. All strategy decisions
//! and profit arithmetic stay in this unit; `to_decimal` exists only for
//! presentation.

use serde::Serialize;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};

pub const MINOR_UNITS_PER_UNIT: i64 = 1000;

/// Number of fractional digits a minor unit represents.
const SCALE_DIGITS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceParseError {
    #[error("empty price")]
    Empty,

    #[error("invalid price {0:?}")]
    Invalid(String),

    #[error("price {0:?} has more than three decimal places")]
    TooPrecise(String),

    #[error("price {0:?} is out of range")]
    Overflow(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Price(pub i64);

impl Price {
    pub const ZERO: Price = Price(0);

    /// One tick: 0.01 of a currency unit.
    pub const TICK: Price = Price(10);

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn abs(self) -> Self {
        Price(self.0.abs())
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Currency value as a float, for rendering only.
    pub fn to_decimal(self) -> f64 {
        self.0 as f64 / MINOR_UNITS_PER_UNIT as f64
    }

    /// Parse a decimal string such as `"10.55"` or `"-3"` exactly.
    pub fn parse_decimal(input: &str) -> Result<Self, PriceParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PriceParseError::Empty);
        }

        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, frac) = match body.split_once('.') {
            Some((w, f)) => (w, f),
            None => (body, ""),
        };

        let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
            return Err(PriceParseError::Invalid(input.to_string()));
        }
        if frac.len() > SCALE_DIGITS {
            return Err(PriceParseError::TooPrecise(input.to_string()));
        }

        let overflow = || PriceParseError::Overflow(input.to_string());
        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut frac_value: i64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| overflow())?
        };
        for _ in frac.len()..SCALE_DIGITS {
            frac_value *= 10;
        }

        let minor = whole_value
            .checked_mul(MINOR_UNITS_PER_UNIT)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(overflow)?;

        Ok(Price(if negative { -minor } else { minor }))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_unit = MINOR_UNITS_PER_UNIT as u64;
        write!(f, "{}{}.{:03}", sign, abs / per_unit, abs % per_unit)
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price(self.0 + rhs.0)
    }
}

impl AddAssign for Price {
    fn add_assign(&mut self, rhs: Price) {
        self.0 += rhs.0;
    }
}

impl Sub for Price {
    type Output = Price;

    fn sub(self, rhs: Price) -> Price {
        Price(self.0 - rhs.0)
    }
}

impl Neg for Price {
    type Output = Price;

    fn neg(self) -> Price {
        Price(-self.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Price {
        iter.fold(Price::ZERO, Add::add)
    }
}

/// Convert a percentage such as `2.5` into basis points (250).
pub fn pct_to_bp(pct: f64) -> i64 {
    (pct * 100.0).round() as i64
}
