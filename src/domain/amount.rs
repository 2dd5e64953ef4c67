//! Serde helpers that carry a `BigDecimal` amount as a JSON number.
//!
//! Amounts arrive as JSON numbers and are echoed back as JSON numbers.
//! Strings, booleans and nulls are rejected so a non-numeric amount is
//! reported as a malformed notification.

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{de, Deserialize, Deserializer, Serializer};
use std::str::FromStr;

pub fn serialize<S>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match amount.to_f64() {
        Some(value) if value.is_finite() => serializer.serialize_f64(value),
        _ => Err(serde::ser::Error::custom(format!(
            "amount {} is not representable as a JSON number",
            amount
        ))),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    BigDecimal::from_str(&number.to_string()).map_err(de::Error::custom)
}
