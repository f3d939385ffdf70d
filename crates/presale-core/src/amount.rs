//! # Amounts and Rates
//!
//! All token and payment quantities are 256-bit unsigned integers
//! ([`U256`]), matching the `uint256` arithmetic of the ledgers the sale
//! mints into. Membership balances of `1e19` multiplied by a global cap
//! of `1e25` already exceed `u128`; 256 bits keep the pro-rata products
//! exact.
//!
//! ## Rounding
//!
//! Every division in the engine rounds toward zero. [`mul_div_floor`] is
//! the single place the `a * b / d` pattern is computed, so personal caps
//! and remainder conversions share one rounding rule.
//!
//! ## Wire Format
//!
//! Amounts travel as strings: decimal (`"20000000"`), decimal with
//! digit separators (`"20_000_000"`), or `0x` hex. Serialization always
//! emits plain decimal via the [`decimal`] serde helper.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use alloy_primitives::U256;

use crate::error::CoreError;

/// Parse an amount from a decimal, underscore-separated decimal, or `0x` hex string.
pub fn parse_amount(input: &str) -> Result<U256, CoreError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(CoreError::InvalidAmount("empty amount".to_string()));
    }
    U256::from_str(&cleaned)
        .map_err(|e| CoreError::InvalidAmount(format!("{input:?}: {e}")))
}

/// Compute `floor(a * b / d)`.
///
/// Returns `None` when `d` is zero or the product overflows 256 bits.
pub fn mul_div_floor(a: U256, b: U256, d: U256) -> Option<U256> {
    if d.is_zero() {
        return None;
    }
    a.checked_mul(b)?.checked_div(d)
}

/// Conversion rate: sale-token units granted per unit of payment.
///
/// Always strictly positive. The zero rate is unrepresentable, so
/// conversions back from tokens to payment never divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rate(U256);

impl Rate {
    /// Create a rate, rejecting zero.
    pub fn new(value: U256) -> Result<Self, CoreError> {
        if value.is_zero() {
            return Err(CoreError::InvalidAmount("rate must be greater than zero".to_string()));
        }
        Ok(Self(value))
    }

    /// Convenience constructor for small literal rates.
    pub fn from_u64(value: u64) -> Result<Self, CoreError> {
        Self::new(U256::from(value))
    }

    /// Parse a rate from its string form.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        Self::new(parse_amount(input)?)
    }

    /// The raw rate value.
    pub fn get(&self) -> U256 {
        self.0
    }

    /// Tokens bought by `payment` at this rate. `None` on overflow.
    pub fn tokens_for(&self, payment: U256) -> Option<U256> {
        payment.checked_mul(self.0)
    }

    /// Payment that converts into `tokens`, rounded toward zero.
    pub fn payment_for(&self, tokens: U256) -> U256 {
        tokens / self.0
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Rate {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Rate> for String {
    fn from(rate: Rate) -> Self {
        rate.0.to_string()
    }
}

/// Serde helper that writes a [`U256`] as a decimal string and reads any
/// form accepted by [`parse_amount`].
///
/// ```ignore
/// #[serde(with = "presale_core::amount::decimal")]
/// pub global_cap: U256,
/// ```
pub mod decimal {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_amount, U256};

    /// Serialize as a decimal string.
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from a decimal, separated decimal, or hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_amount(&raw).map_err(serde::de::Error::custom)
    }
}

/// Like [`decimal`], for optional amounts.
pub mod decimal_option {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{parse_amount, U256};

    /// Serialize `Some` as a decimal string and `None` as null.
    pub fn serialize<S: Serializer>(
        value: &Option<U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional amount string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<U256>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| parse_amount(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
