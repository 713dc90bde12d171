//! Exact base-10 fixed-point numbers.
//!
//! Spreadsheet cells carry values like `62,50%` that must round-trip into a
//! `DECIMAL(5,2)` column without picking up binary floating point noise.
//! [`Decimal`] stores an `i128` mantissa and a decimal scale, so `62.50` is
//! `6250 × 10⁻²`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Largest number of fractional digits a [`Decimal`] may carry.
pub const MAX_SCALE: u32 = 28;

/// An exact decimal value: `mantissa × 10^-scale`.
///
/// Equality and ordering are by value, so `1.0 == 1.00`. [`Display`]
/// keeps the scale (`1.00` prints as `1.00`).
///
/// [`Display`]: std::fmt::Display
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    /// Zero with no fractional digits.
    pub const ZERO: Self = Self::new(0, 0);

    /// Creates a decimal from its raw parts.
    ///
    /// Scales above [`MAX_SCALE`] are clamped.
    #[must_use]
    pub const fn new(mantissa: i128, scale: u32) -> Self {
        let scale = if scale > MAX_SCALE { MAX_SCALE } else { scale };
        Self { mantissa, scale }
    }

    /// Returns the unscaled integer mantissa.
    #[must_use]
    pub const fn mantissa(self) -> i128 {
        self.mantissa
    }

    /// Returns the number of fractional digits.
    #[must_use]
    pub const fn scale(self) -> u32 {
        self.scale
    }

    /// Returns `true` if the value is zero at any scale.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.mantissa == 0
    }

    /// Returns `true` if the value is strictly below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.mantissa < 0
    }

    /// Rescales to exactly `scale` fractional digits, rounding half to even
    /// when digits are dropped.
    ///
    /// Returns `None` if `scale` exceeds [`MAX_SCALE`] or widening the
    /// mantissa would overflow.
    #[must_use]
    pub fn quantize(self, scale: u32) -> Option<Self> {
        if scale > MAX_SCALE {
            return None;
        }

        if scale >= self.scale {
            let factor = pow10(scale - self.scale)?;
            let mantissa = self.mantissa.checked_mul(factor)?;
            return Some(Self { mantissa, scale });
        }

        let divisor = pow10(self.scale - scale)?;
        let mut quotient = self.mantissa / divisor;
        let remainder = (self.mantissa % divisor).abs();

        let twice = remainder * 2;
        let round_away = match twice.cmp(&divisor) {
            Ordering::Greater => true,
            Ordering::Equal => quotient % 2 != 0,
            Ordering::Less => false,
        };
        if round_away {
            quotient += self.mantissa.signum();
        }

        Some(Self {
            mantissa: quotient,
            scale,
        })
    }
}

fn pow10(exp: u32) -> Option<i128> {
    10_i128.checked_pow(exp)
}

impl Default for Decimal {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(i128::from(value), 0)
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Self::new(i128::from(value), 0)
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.scale == other.scale {
            return self.mantissa.cmp(&other.mantissa);
        }

        // Widen the operand with the smaller scale. If that overflows, its
        // magnitude exceeds anything the other side can hold.
        let (narrow, wide, swapped) = if self.scale < other.scale {
            (self, other, false)
        } else {
            (other, self, true)
        };

        let ordering = pow10(wide.scale - narrow.scale)
            .and_then(|factor| narrow.mantissa.checked_mul(factor))
            .map_or_else(
                || {
                    if narrow.mantissa < 0 {
                        Ordering::Less
                    } else {
                        Ordering::Greater
                    }
                },
                |widened| widened.cmp(&wide.mantissa),
            );

        if swapped {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };

        if self.scale == 0 {
            return write!(f, "{sign}{digits}");
        }

        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{digits}", "0".repeat(scale + 1 - digits.len()))
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);

        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

/// Error returned when text cannot be read as a [`Decimal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseDecimalError {
    /// The input was empty after trimming.
    Empty,
    /// The input contained characters outside `[+-]digits[.digits][e[+-]digits]`.
    Invalid,
    /// The value does not fit the mantissa or exceeds [`MAX_SCALE`].
    OutOfRange,
}

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("cannot parse decimal from empty string"),
            Self::Invalid => f.write_str("invalid decimal literal"),
            Self::OutOfRange => f.write_str("decimal literal out of range"),
        }
    }
}

impl std::error::Error for ParseDecimalError {}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseDecimalError::Empty);
        }

        let (negative, unsigned) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let (number, exponent) = match unsigned.find(['e', 'E']) {
            Some(pos) => {
                let exp = unsigned[pos + 1..]
                    .parse::<i64>()
                    .map_err(|_| ParseDecimalError::Invalid)?;
                (&unsigned[..pos], exp)
            }
            None => (unsigned, 0),
        };

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDecimalError::Invalid);
        }

        let mut mantissa: i128 = 0;
        for byte in int_part.bytes().chain(frac_part.bytes()) {
            if !byte.is_ascii_digit() {
                return Err(ParseDecimalError::Invalid);
            }
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(byte - b'0')))
                .ok_or(ParseDecimalError::OutOfRange)?;
        }

        let frac_len = i64::try_from(frac_part.len()).map_err(|_| ParseDecimalError::OutOfRange)?;
        let mut scale = frac_len
            .checked_sub(exponent)
            .ok_or(ParseDecimalError::OutOfRange)?;

        if scale < 0 {
            let widen = u32::try_from(-scale).map_err(|_| ParseDecimalError::OutOfRange)?;
            mantissa = pow10(widen)
                .and_then(|factor| mantissa.checked_mul(factor))
                .ok_or(ParseDecimalError::OutOfRange)?;
            scale = 0;
        }

        let scale = u32::try_from(scale).map_err(|_| ParseDecimalError::OutOfRange)?;
        if scale > MAX_SCALE {
            return Err(ParseDecimalError::OutOfRange);
        }

        Ok(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
