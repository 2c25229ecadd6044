// SPDX-License-Identifier: MIT

//! Resource quantities
//!
//! Accepts the Kubernetes quantity notation: an optional sign, a decimal
//! number and an optional suffix, which is either a binary SI suffix
//! (`Ki Mi Gi Ti Pi Ei`), a decimal SI suffix (`n u m k M G T P E`) or a
//! decimal exponent (`e3`, `E-2`). Values are kept exactly at nano
//! precision; anything smaller rounds away from zero.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const NANOS_PER_UNIT: i128 = 1_000_000_000;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("invalid number in quantity '{0}'")]
    InvalidNumber(String),
    #[error("unknown suffix in quantity '{0}'")]
    InvalidSuffix(String),
    #[error("quantity '{0}' is out of range")]
    OutOfRange(String),
}

/// A numeric resource amount
#[derive(Debug, Clone)]
pub struct Quantity {
    nanos: i128,
    text: String,
}

#[derive(Debug, Clone, Copy)]
enum Scale {
    /// Power of 1024
    Binary(u32),
    /// Power of 10
    Decimal(i32),
}

fn parse_suffix(suffix: &str) -> Option<Scale> {
    let scale = match suffix {
        "" => Scale::Decimal(0),
        "Ki" => Scale::Binary(1),
        "Mi" => Scale::Binary(2),
        "Gi" => Scale::Binary(3),
        "Ti" => Scale::Binary(4),
        "Pi" => Scale::Binary(5),
        "Ei" => Scale::Binary(6),
        "n" => Scale::Decimal(-9),
        "u" => Scale::Decimal(-6),
        "m" => Scale::Decimal(-3),
        "k" => Scale::Decimal(3),
        "M" => Scale::Decimal(6),
        "G" => Scale::Decimal(9),
        "T" => Scale::Decimal(12),
        "P" => Scale::Decimal(15),
        "E" => Scale::Decimal(18),
        other => {
            let exp = other.strip_prefix('e').or_else(|| other.strip_prefix('E'))?;
            Scale::Decimal(exp.parse().ok()?)
        }
    };
    Some(scale)
}

/// Divide rounding away from zero
fn div_round_up(value: i128, divisor: i128) -> i128 {
    let quotient = value / divisor;
    if value % divisor != 0 {
        quotient + value.signum()
    } else {
        quotient
    }
}

impl Quantity {
    pub fn from_int(value: i64) -> Self {
        Self {
            nanos: i128::from(value) * NANOS_PER_UNIT,
            text: value.to_string(),
        }
    }

    fn from_nanos(nanos: i128) -> Self {
        Self {
            nanos,
            text: format_nanos(nanos),
        }
    }

    /// The value in units of 10^-9
    pub fn nanos(&self) -> i128 {
        self.nanos
    }

    pub fn is_integer(&self) -> bool {
        self.nanos % NANOS_PER_UNIT == 0
    }

    /// Integer value, if the quantity is whole and fits an `i64`
    pub fn as_integer(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }
        i64::try_from(self.nanos / NANOS_PER_UNIT).ok()
    }

    pub fn as_approximate_f64(&self) -> f64 {
        self.nanos as f64 / NANOS_PER_UNIT as f64
    }

    pub fn sign(&self) -> i64 {
        self.nanos.signum() as i64
    }

    pub fn checked_add(&self, other: &Quantity) -> Option<Quantity> {
        self.nanos.checked_add(other.nanos).map(Self::from_nanos)
    }

    pub fn checked_sub(&self, other: &Quantity) -> Option<Quantity> {
        self.nanos.checked_sub(other.nanos).map(Self::from_nanos)
    }

    /// Exact comparison against an integer
    pub fn cmp_int(&self, value: i64) -> Ordering {
        self.nanos.cmp(&(i128::from(value) * NANOS_PER_UNIT))
    }

    pub fn cmp_f64(&self, value: f64) -> Option<Ordering> {
        self.as_approximate_f64().partial_cmp(&value)
    }
}

fn format_nanos(nanos: i128) -> String {
    let sign = if nanos < 0 { "-" } else { "" };
    let magnitude = nanos.unsigned_abs();
    let whole = magnitude / NANOS_PER_UNIT as u128;
    let frac = magnitude % NANOS_PER_UNIT as u128;
    if frac == 0 {
        format!("{}{}", sign, whole)
    } else {
        let digits = format!("{:09}", frac);
        format!("{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(QuantityError::Empty);
        }
        let invalid = || QuantityError::InvalidNumber(text.to_string());
        let out_of_range = || QuantityError::OutOfRange(text.to_string());

        let (negative, rest) = match text.as_bytes()[0] {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(number_end);
        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(invalid());
        }
        let scale =
            parse_suffix(suffix).ok_or_else(|| QuantityError::InvalidSuffix(text.to_string()))?;

        let digits = format!("{}{}", whole, frac);
        let digits = digits.trim_start_matches('0');
        let mantissa: i128 = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| out_of_range())?
        };

        // i64 holds any i32 exponent shifted by the fraction length
        let frac_len = i64::try_from(frac.len()).map_err(|_| out_of_range())?;
        let (binary_power, exp10) = match scale {
            Scale::Binary(power) => (power, 9 - frac_len),
            Scale::Decimal(exp) => (0, 9 - frac_len + i64::from(exp)),
        };
        let power_of_ten = u32::try_from(exp10.unsigned_abs())
            .ok()
            .and_then(|exp| 10i128.checked_pow(exp));

        let mut nanos = mantissa;
        for _ in 0..binary_power {
            nanos = nanos.checked_mul(1024).ok_or_else(out_of_range)?;
        }
        if exp10 >= 0 {
            if nanos != 0 {
                let factor = power_of_ten.ok_or_else(out_of_range)?;
                nanos = nanos.checked_mul(factor).ok_or_else(out_of_range)?;
            }
        } else {
            nanos = match power_of_ten {
                Some(divisor) => div_round_up(nanos, divisor),
                // Anything non-zero this small still rounds up to one nano
                None => nanos.signum(),
            };
        }
        if negative {
            nanos = -nanos;
        }

        Ok(Self {
            nanos,
            text: text.to_string(),
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self::from_int(value)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(Quantity::from_int(value)),
            Raw::Float(value) => value.to_string().parse().map_err(de::Error::custom),
            Raw::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn test_plain_integers() {
        assert_eq!(q("16").as_integer(), Some(16));
        assert_eq!(q("-3").as_integer(), Some(-3));
        assert_eq!(q("+7").as_integer(), Some(7));
    }

    #[test]
    fn test_binary_suffixes() {
        assert_eq!(q("1Ki").as_integer(), Some(1024));
        assert_eq!(q("16Gi").as_integer(), Some(16 * 1024 * 1024 * 1024));
        assert_eq!(q("1.5Ki").as_integer(), Some(1536));
    }

    #[test]
    fn test_decimal_suffixes() {
        assert_eq!(q("2k").as_integer(), Some(2000));
        assert_eq!(q("100m").nanos(), 100_000_000);
        assert!(!q("100m").is_integer());
        assert_eq!(q("1G"), q("1000M"));
    }

    #[test]
    fn test_exponent() {
        assert_eq!(q("1e3").as_integer(), Some(1000));
        assert_eq!(q("5E-1").nanos(), 500_000_000);
    }

    #[test]
    fn test_exa_is_not_an_exponent() {
        assert_eq!(q("1E"), q("1e18"));
    }

    #[test]
    fn test_sub_nano_rounds_up() {
        assert_eq!(q("0.0000000001").nanos(), 1);
        assert_eq!(q("-0.0000000001").nanos(), -1);
        assert_eq!(q("1e-40").nanos(), 1);
    }

    #[test]
    fn test_invalid_quantities() {
        assert_eq!("".parse::<Quantity>(), Err(QuantityError::Empty));
        assert!(matches!(
            "abc".parse::<Quantity>(),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            "12Qi".parse::<Quantity>(),
            Err(QuantityError::InvalidSuffix(_))
        ));
        assert!(matches!(
            "1.2.3".parse::<Quantity>(),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            "1e100".parse::<Quantity>(),
            Err(QuantityError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_extreme_exponents() {
        assert!(matches!(
            "1e2147483647".parse::<Quantity>(),
            Err(QuantityError::OutOfRange(_))
        ));
        assert!(matches!(
            "1.5e2147483647".parse::<Quantity>(),
            Err(QuantityError::OutOfRange(_))
        ));
        assert_eq!(q("1e-2147483648").nanos(), 1);
        assert_eq!(q("0e2147483647").nanos(), 0);
    }

    #[test]
    fn test_ordering_and_int_comparison() {
        assert!(q("1Gi") > q("1G"));
        assert_eq!(q("16").cmp_int(8), Ordering::Greater);
        assert_eq!(q("8").cmp_int(8), Ordering::Equal);
        assert_eq!(q("500m").cmp_f64(0.5), Some(Ordering::Equal));
    }

    #[test]
    fn test_arithmetic_and_display() {
        let sum = q("1").checked_add(&q("500m")).unwrap();
        assert_eq!(sum.to_string(), "1.5");
        let diff = q("1").checked_sub(&q("3")).unwrap();
        assert_eq!(diff.to_string(), "-2");
        assert_eq!(diff.sign(), -1);
        assert_eq!(q("16Gi").to_string(), "16Gi");
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let from_int: Quantity = serde_json::from_str("16").unwrap();
        let from_text: Quantity = serde_json::from_str("\"16\"").unwrap();
        assert_eq!(from_int, from_text);
        let from_yaml: Quantity = serde_yaml::from_str("1Gi").unwrap();
        assert_eq!(from_yaml.as_integer(), Some(1 << 30));
        assert!(serde_json::from_str::<Quantity>("\"bogus\"").is_err());
    }

    #[test]
    fn test_serialize_keeps_text() {
        assert_eq!(serde_json::to_string(&q("16Gi")).unwrap(), "\"16Gi\"");
    }
}
