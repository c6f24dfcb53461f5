//! Fixed-point decimal with 18 fractional digits.
//!
//! Used for every fractional parameter (`min_signed_per_window`, slash fractions) and for delegation shares.
//!
//! # Determinism
//! Integer-only: a `Dec` is a `u128` scaled by `DEC_SCALE`. Multiplication by an integer truncates toward zero.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error::SlashingError;

/// Number of fractional digits.
pub const DEC_PRECISION: u32 = 18;

/// 1.0 in raw units.
pub const DEC_SCALE: u128 = 1_000_000_000_000_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecError {
    #[error("Empty decimal string")]
    Empty,

    #[error("Invalid decimal {0:?}")]
    Invalid(String),

    #[error("Too many fractional digits in {0:?} (max 18)")]
    TooPrecise(String),

    #[error("Decimal {0:?} out of range")]
    Overflow(String),
}

impl From<DecError> for SlashingError {
    fn from(e: DecError) -> Self {
        SlashingError::Codec(format!("Decimal: {}", e))
    }
}

/// Non-negative fixed-point decimal.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec(u128);

impl Dec {
    pub const ZERO: Dec = Dec(0);
    pub const ONE: Dec = Dec(DEC_SCALE);

    /// Builds a decimal from its raw (scaled) representation.
    pub const fn from_raw(raw: u128) -> Self {
        Dec(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Whole-number decimal. `None` on overflow.
    pub fn from_int(n: u128) -> Option<Self> {
        n.checked_mul(DEC_SCALE).map(Dec)
    }

    /// `numerator / 10^decimals`, e.g. `with_prec(5, 2)` is 0.05.
    pub fn with_prec(numerator: u128, decimals: u32) -> Option<Self> {
        if decimals > DEC_PRECISION {
            return None;
        }
        numerator
            .checked_mul(10u128.pow(DEC_PRECISION - decimals))
            .map(Dec)
    }

    /// `numerator / 100`.
    pub fn percent(numerator: u128) -> Option<Self> {
        Self::with_prec(numerator, 2)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `floor(self × n)`. `None` on overflow.
    pub fn mul_int_floor(&self, n: u128) -> Option<u128> {
        // Split n so the intermediate products stay within u128 for any n when self <= 1.
        let hi = (n / DEC_SCALE).checked_mul(self.0)?;
        let lo = (n % DEC_SCALE).checked_mul(self.0)? / DEC_SCALE;
        hi.checked_add(lo)
    }

    /// `self × n` as a decimal. `None` on overflow.
    pub fn checked_mul_int(&self, n: u128) -> Option<Dec> {
        self.0.checked_mul(n).map(Dec)
    }

    /// `self × num / den`, truncated. `None` on overflow or a zero denominator.
    pub fn mul_div(&self, num: u128, den: u128) -> Option<Dec> {
        if den == 0 {
            return None;
        }
        self.0.checked_mul(num).map(|v| Dec(v / den))
    }

    /// Integer part.
    pub fn truncate(&self) -> u128 {
        self.0 / DEC_SCALE
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / DEC_SCALE,
            self.0 % DEC_SCALE,
            width = DEC_PRECISION as usize
        )
    }
}

impl fmt::Debug for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dec({})", self)
    }
}

impl FromStr for Dec {
    type Err = DecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DecError::Empty);
        }
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if int_part.is_empty() || !all_digits(int_part) || !all_digits(frac_part) {
            return Err(DecError::Invalid(s.to_string()));
        }
        if s.contains('.') && frac_part.is_empty() {
            return Err(DecError::Invalid(s.to_string()));
        }
        if frac_part.len() > DEC_PRECISION as usize {
            return Err(DecError::TooPrecise(s.to_string()));
        }
        let int: u128 = int_part
            .parse()
            .map_err(|_| DecError::Overflow(s.to_string()))?;
        let frac: u128 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_part, width = DEC_PRECISION as usize);
            padded
                .parse()
                .map_err(|_| DecError::Invalid(s.to_string()))?
        };
        int.checked_mul(DEC_SCALE)
            .and_then(|v| v.checked_add(frac))
            .map(Dec)
            .ok_or_else(|| DecError::Overflow(s.to_string()))
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
