// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::types::Category;
use alloy::primitives::{Address, address};

// =============================================================================
// NETWORK CONSTANTS
// =============================================================================

pub const CHAIN_ARBITRUM: u64 = 42161;
pub const CHAIN_BASE: u64 = 8453;

/// Chain the lucky swapper is deployed on.
pub const DEFAULT_CHAIN_ID: u64 = CHAIN_BASE;

pub const USDC_BASE: Address = address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913");
pub const USDC_ARBITRUM: Address = address!("af88d065e77c8cc2239327c5edb3a432268e5831");

/// Native asset placeholder used by the routing API.
pub const NATIVE_TOKEN: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

// =============================================================================
// ROUTING API
// =============================================================================

pub const DEFAULT_ROUTING_API_URL: &str = "https://api.enso.finance/api/v1";
pub const ROUTING_STRATEGY_ROUTER: &str = "router";

/// Route/quote reads retry this many times after the first attempt.
pub const ROUTE_READ_RETRIES: usize = 2;

/// Tokens that only route through 1inch; the rest of the aggregators are skipped.
pub const ONEINCH_ONLY_TOKENS: [Address; 2] = [
    address!("cf21354360fdae8edad02c0529e55cb3e71c36c9"),
    address!("99d8a9c45b2eca8864373a26d1459e3dff1e17f3"),
];
pub const ONEINCH_ONLY_IGNORED_AGGREGATORS: &str =
    "0x,paraswap,openocean,odos,kyberswap,native,barter";

// =============================================================================
// SWAP CONSTANTS
// =============================================================================

/// 0.25%
pub const DEFAULT_SLIPPAGE_BPS: u64 = 25;
pub const DEFAULT_LUCKY_SLIPPAGE_BPS: u64 = 3_000;
pub const PRICE_IMPACT_WARN_THRESHOLD_BPS: f64 = 100.0;

/// Gas estimates (node or routing API) are padded by this before signing.
pub const GAS_BUFFER_BPS: u64 = 15_000;
/// Fallback limit for an ERC-20 approve when the node cannot estimate it.
pub const APPROVE_GAS_LIMIT: u64 = 70_000;

// =============================================================================
// SESSION
// =============================================================================

pub const PREFERENCES_FILE: &str = "preferences.json";
pub const EOA_MODE_KEY: &str = "eoaModeEnabled";
/// Deployment-wide switch; the stored preference wins once written.
pub const EOA_DISABLED_ENV: &str = "EOA_DISABLED";

// =============================================================================
// CATEGORY LISTS
// =============================================================================

pub const MEME_TOKENS: [Address; 6] = [
    address!("532f27101965dd16442e59d40670faf5ebb142e4"),
    address!("4ed4e862860bed51a9570b96d89af5e1b0efefed"),
    address!("b1a03eda10342529bbf8eb700a06c60441fef25d"),
    address!("ac1bd2486aaf3b5c0fc3fd868558b082a531b2b4"),
    address!("9a26f5433671751c3276a065f57e5a02d2817973"),
    address!("52b492a33e447cdb854c7fc19f1e57e8bfa1777d"),
];

pub const DEFI_TOKENS: [Address; 4] = [
    address!("940181a94a35a4569e4529a3cdfb74e38fd98631"),
    address!("22e6966b799c4d5b13be962e1d117b56327fda66"),
    address!("7d49a065d17d6d4a55dc13649901fdbb98b2afba"),
    address!("baa5cc21fd487b8fcc2f632f3f4e8d37262a0842"),
];

pub const DEFAI_TOKENS: [Address; 2] = [
    address!("0b3e328455c4059eeb9e3f84b5543f74e24e7e1b"),
    address!("4f9fd6be4a90f2620860d680c0d4d5fb53d1a825"),
];

pub fn default_category_tokens(category: Category) -> &'static [Address] {
    match category {
        Category::Meme => &MEME_TOKENS,
        Category::Defi => &DEFI_TOKENS,
        Category::Defai => &DEFAI_TOKENS,
    }
}

pub fn usdc_for_chain(chain_id: u64) -> Option<Address> {
    match chain_id {
        CHAIN_BASE => Some(USDC_BASE),
        CHAIN_ARBITRUM => Some(USDC_ARBITRUM),
        _ => None,
    }
}
