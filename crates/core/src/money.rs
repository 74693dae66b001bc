use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("Invalid amount: '{0}'")]
    Invalid(String),
    #[error("Amount must not be negative: '{0}'")]
    Negative(String),
}

/// A non-negative monetary amount held at two decimal places.
///
/// Displays (and serializes) as a plain decimal string with exactly two
/// fractional digits, e.g. `"7.00"`. The currency travels separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    pub fn zero() -> Self {
        Amount(Decimal::ZERO)
    }

    pub fn from_cents(cents: i64) -> Self {
        Amount(Decimal::new(cents, 2))
    }

    /// `None` only if the amount does not fit in an `i64` worth of cents.
    pub fn to_cents(self) -> Option<i64> {
        (self.0 * Decimal::ONE_HUNDRED).to_i64()
    }

    pub fn from_decimal(decimal: Decimal) -> Result<Self, ParseAmountError> {
        if decimal.is_sign_negative() && !decimal.is_zero() {
            return Err(ParseAmountError::Negative(decimal.to_string()));
        }
        Ok(Amount(
            decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        ))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Accepts `1,234.5`, `7`, `12.`; thousands separators are dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean: String = s.trim().chars().filter(|c| *c != ',').collect();
        let clean = clean.strip_suffix('.').unwrap_or(&clean);
        if clean.is_empty() {
            return Err(ParseAmountError::Invalid(s.to_string()));
        }
        let dec = Decimal::from_str(clean).map_err(|_| ParseAmountError::Invalid(s.to_string()))?;
        Amount::from_decimal(dec)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Clients send amounts back either as the string we produced or as a JSON number.
struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Amount::from_str(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Amount::from_decimal(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Amount::from_decimal(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        let dec = Decimal::try_from(v).map_err(|_| E::custom(format!("Invalid amount: '{v}'")))?;
        Amount::from_decimal(dec).map_err(E::custom)
    }
}
