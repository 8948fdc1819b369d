// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

//! Query enablement. Every dependent read goes through one of these keys; an
//! input that fails validation disables the read instead of firing it.

use alloy::primitives::{Address, U256};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("{0} is not a well-formed address")]
    MalformedAddress(&'static str),
    #[error("input and output token are the same")]
    SameToken,
    #[error("no sender address resolved")]
    MissingSender,
    #[error("{0} is missing")]
    Missing(&'static str),
    #[error("slippage of {0} bps exceeds 10000")]
    SlippageOutOfRange(u64),
}

pub const MAX_SLIPPAGE_BPS: u64 = 10_000;

/// `0x` followed by exactly 40 hex digits.
pub fn is_address(raw: &str) -> bool {
    let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) else {
        return false;
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn parse_address(raw: &str, field: &'static str) -> Result<Address, ValidationError> {
    let trimmed = raw.trim();
    if !is_address(trimmed) {
        return Err(ValidationError::MalformedAddress(field));
    }
    Address::from_str(trimmed).map_err(|_| ValidationError::MalformedAddress(field))
}

/// How a route will be executed. The router variant needs a sender because the
/// API builds calldata for it; the quote variant only prices the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionVariant {
    Router,
    QuoteOnly,
}

/// Raw user input for a swap, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapInput {
    pub token_in: String,
    pub token_out: String,
    /// Raw integer units.
    pub amount_in: U256,
    pub chain_id: u64,
    pub slippage_bps: u64,
    pub from_address: Option<Address>,
}

/// Full input tuple a route read is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub chain_id: u64,
    pub from_address: Option<Address>,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub slippage_bps: u64,
}

impl RouteKey {
    pub fn validate(input: &SwapInput, variant: ExecutionVariant) -> Result<Self, ValidationError> {
        if input.amount_in.is_zero() {
            return Err(ValidationError::NonPositiveAmount);
        }
        let token_in = parse_address(&input.token_in, "tokenIn")?;
        let token_out = parse_address(&input.token_out, "tokenOut")?;
        if token_in == token_out {
            return Err(ValidationError::SameToken);
        }
        if input.slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(ValidationError::SlippageOutOfRange(input.slippage_bps));
        }
        let from_address = match (variant, input.from_address) {
            (ExecutionVariant::Router, None) => return Err(ValidationError::MissingSender),
            (_, from) => from,
        };
        Ok(Self {
            chain_id: input.chain_id,
            from_address,
            token_in,
            token_out,
            amount_in: input.amount_in,
            slippage_bps: input.slippage_bps,
        })
    }
}

/// Full input tuple an allowance read is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllowanceKey {
    pub owner: Address,
    pub spender: Address,
    pub token: Address,
}

impl AllowanceKey {
    pub fn validate(
        owner: Option<Address>,
        spender: Option<Address>,
        token: Option<Address>,
    ) -> Result<Self, ValidationError> {
        let owner = owner.ok_or(ValidationError::Missing("owner"))?;
        let spender = spender.ok_or(ValidationError::Missing("spender"))?;
        let token = token.ok_or(ValidationError::Missing("token"))?;
        Ok(Self {
            owner,
            spender,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";
    const DEGEN: &str = "0x4ed4e862860bed51a9570b96d89af5e1b0efefed";

    fn input() -> SwapInput {
        SwapInput {
            token_in: USDC.into(),
            token_out: DEGEN.into(),
            amount_in: U256::from(10_000_000u64),
            chain_id: 8453,
            slippage_bps: 25,
            from_address: Some(Address::repeat_byte(7)),
        }
    }

    #[test]
    fn address_predicate() {
        assert!(is_address(USDC));
        assert!(!is_address("833589fcd6edb6e08f4c7c32d4f71b54bda02913"));
        assert!(!is_address("0x1234"));
        assert!(!is_address("0xzz3589fcd6edb6e08f4c7c32d4f71b54bda02913"));
    }

    #[test]
    fn valid_input_produces_key() {
        let key = RouteKey::validate(&input(), ExecutionVariant::Router).unwrap();
        assert_eq!(key.amount_in, U256::from(10_000_000u64));
        assert_eq!(key.from_address, Some(Address::repeat_byte(7)));
    }

    #[test]
    fn same_token_disables_route_regardless_of_case() {
        let mut same = input();
        same.token_out = USDC.to_uppercase().replacen("0X", "0x", 1);
        assert_eq!(
            RouteKey::validate(&same, ExecutionVariant::Router),
            Err(ValidationError::SameToken)
        );
    }

    #[test]
    fn zero_amount_and_bad_addresses_disable_route() {
        let mut zero = input();
        zero.amount_in = U256::ZERO;
        assert_eq!(
            RouteKey::validate(&zero, ExecutionVariant::Router),
            Err(ValidationError::NonPositiveAmount)
        );

        let mut bad = input();
        bad.token_in = "0xnope".into();
        assert_eq!(
            RouteKey::validate(&bad, ExecutionVariant::Router),
            Err(ValidationError::MalformedAddress("tokenIn"))
        );
    }

    #[test]
    fn slippage_is_part_of_the_key() {
        let tight = RouteKey::validate(&input(), ExecutionVariant::Router).unwrap();
        let mut loose_input = input();
        loose_input.slippage_bps = 3_000;
        let loose = RouteKey::validate(&loose_input, ExecutionVariant::Router).unwrap();
        assert_eq!(loose.slippage_bps, 3_000);
        assert_ne!(tight, loose);

        loose_input.slippage_bps = MAX_SLIPPAGE_BPS + 1;
        assert_eq!(
            RouteKey::validate(&loose_input, ExecutionVariant::Router),
            Err(ValidationError::SlippageOutOfRange(10_001))
        );
    }

    #[test]
    fn router_variant_needs_sender() {
        let mut anon = input();
        anon.from_address = None;
        assert_eq!(
            RouteKey::validate(&anon, ExecutionVariant::Router),
            Err(ValidationError::MissingSender)
        );
        assert!(RouteKey::validate(&anon, ExecutionVariant::QuoteOnly).is_ok());
    }

    #[test]
    fn allowance_key_requires_all_parts() {
        let a = Some(Address::repeat_byte(1));
        assert!(AllowanceKey::validate(a, a, a).is_ok());
        assert_eq!(
            AllowanceKey::validate(a, None, a),
            Err(ValidationError::Missing("spender"))
        );
    }
}
