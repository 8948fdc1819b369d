// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

//! Conversions between human-readable token amounts and raw integer units.
//! Raw units go on chain and to the routing API; normalized floats are for
//! display only.

use crate::common::parsing::u256_from_f64;
use crate::domain::error::AppError;
use alloy::primitives::U256;
use alloy::primitives::utils::{format_units, parse_units};

/// `value * 10^decimals`, rounded to an integer. Negative or non-finite input
/// yields zero, matching an empty amount field.
pub fn denormalize_value(value: f64, decimals: u8) -> U256 {
    let scaled = value * 10f64.powi(decimals as i32);
    u256_from_f64(scaled).unwrap_or(U256::ZERO)
}

/// Exact decimal-string variant of [`denormalize_value`] for typed input.
pub fn denormalize_str(value: &str, decimals: u8) -> Result<U256, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(U256::ZERO);
    }
    let parsed = parse_units(trimmed, decimals).map_err(|e| AppError::Validation {
        field: "amount".into(),
        message: format!("'{trimmed}' is not a valid amount: {e}"),
    })?;
    if parsed.is_negative() {
        return Err(AppError::Validation {
            field: "amount".into(),
            message: "amount must not be negative".into(),
        });
    }
    Ok(parsed.get_absolute())
}

/// `value / 10^decimals` as a float for display.
pub fn normalize_value(value: U256, decimals: u8) -> f64 {
    if value.is_zero() {
        return 0.0;
    }
    match format_units(value, decimals) {
        Ok(s) => s.parse().unwrap_or(0.0),
        Err(_) => units_to_float(value, decimals),
    }
}

fn units_to_float(value: U256, decimals: u8) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let num = value.to_string().parse::<f64>().unwrap_or(0.0);
    num / scale
}

/// Output per unit of input. Zero input renders as `0`, never NaN.
pub fn exchange_rate(amount_out: U256, out_decimals: u8, displayed_amount_in: f64) -> f64 {
    if displayed_amount_in <= 0.0 || !displayed_amount_in.is_finite() {
        return 0.0;
    }
    let rate = normalize_value(amount_out, out_decimals) / displayed_amount_in;
    if rate.is_finite() { rate } else { 0.0 }
}

/// Round to `digits` significant digits and drop trailing zeros.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0".to_string();
    }
    let digits = digits.max(1) as i32;
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (digits - 1 - magnitude).max(0) as usize;
    let rendered = format!("{value:.decimals$}");
    trim_trailing_zeros(rendered)
}

fn trim_trailing_zeros(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
