// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

pub fn parse_boolish(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse an integer amount written as decimal, `0x` hex, or an integral float
/// such as `1e18` (the routing API is not consistent about this).
pub fn parse_u256_amount(raw: &str) -> Option<U256> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if s.starts_with("0x") || s.starts_with("0X") {
        return U256::from_str_radix(strip_0x(s), 16).ok();
    }
    if let Ok(v) = U256::from_str_radix(s, 10) {
        return Some(v);
    }
    let float: f64 = s.parse().ok()?;
    u256_from_f64(float)
}

/// Integral, non-negative, finite floats only; fractions are rounded.
pub fn u256_from_f64(value: f64) -> Option<U256> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    U256::from_str(&format!("{:.0}", value.round())).ok()
}

pub fn parse_address_list(raw: &[String], field: &str) -> Result<Vec<Address>, String> {
    raw.iter()
        .map(|s| Address::from_str(s.trim()).map_err(|_| format!("{field}: invalid address {s}")))
        .collect()
}

/// Serde adapter for amount fields that arrive as strings, numbers, or null.
pub fn deserialize_u256_lenient<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(U256::ZERO),
        Value::String(s) => {
            parse_u256_amount(&s).ok_or_else(|| D::Error::custom(format!("invalid amount '{s}'")))
        }
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(U256::from(v));
            }
            n.as_f64()
                .and_then(u256_from_f64)
                .ok_or_else(|| D::Error::custom(format!("invalid amount {n}")))
        }
        other => Err(D::Error::custom(format!("unexpected amount value {other}"))),
    }
}

/// Serde adapter for fields that are sometimes a single string and sometimes a list.
pub fn deserialize_one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_boolish_rejects_invalid_values() {
        assert_eq!(parse_boolish("true"), Some(true));
        assert_eq!(parse_boolish("OFF"), Some(false));
        assert_eq!(parse_boolish("tru"), None);
    }

    #[test]
    fn amounts_accept_decimal_hex_and_float() {
        assert_eq!(parse_u256_amount("10000000"), Some(U256::from(10_000_000u64)));
        assert_eq!(parse_u256_amount("0X2a"), Some(U256::from(42u64)));
        assert_eq!(
            parse_u256_amount("5e17"),
            Some(U256::from(500_000_000_000_000_000u64))
        );
        assert_eq!(parse_u256_amount("-1"), None);
        assert_eq!(parse_u256_amount(""), None);
    }

    #[test]
    fn lenient_deserializer_handles_all_shapes() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "deserialize_u256_lenient")]
            amount: U256,
        }

        let from_str: Wrapper = serde_json::from_str(r#"{"amount":"123"}"#).unwrap();
        let from_num: Wrapper = serde_json::from_str(r#"{"amount":123}"#).unwrap();
        let from_null: Wrapper = serde_json::from_str(r#"{"amount":null}"#).unwrap();
        assert_eq!(from_str.amount, U256::from(123u64));
        assert_eq!(from_num.amount, U256::from(123u64));
        assert_eq!(from_null.amount, U256::ZERO);
        assert!(serde_json::from_str::<Wrapper>(r#"{"amount":"abc"}"#).is_err());
    }
}
