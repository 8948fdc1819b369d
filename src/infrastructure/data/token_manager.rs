// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use alloy::primitives::Address;
use dashmap::DashMap;
use serde::Deserialize;

use crate::common::constants::{CHAIN_ARBITRUM, CHAIN_BASE, NATIVE_TOKEN, USDC_ARBITRUM, USDC_BASE};
use crate::domain::error::AppError;

/// Token metadata used for display amounts and approval titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl TokenInfo {
    fn new(symbol: &str, name: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
        }
    }
}

#[derive(Debug, Default)]
pub struct TokenManager {
    tokens_by_chain: HashMap<u64, HashMap<Address, TokenInfo>>,
    /// Learned at runtime, e.g. from the balances endpoint.
    discovered: DashMap<(u64, Address), TokenInfo>,
}

/// Uniswap-style token list: `{ "tokens": [ { chainId, address, symbol, ... } ] }`.
#[derive(Deserialize)]
struct TokenList {
    tokens: Vec<TokenEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenEntry {
    chain_id: u64,
    address: String,
    symbol: String,
    #[serde(default)]
    name: String,
    decimals: u8,
}

impl TokenManager {
    /// Built-in entries for the stablecoins and the native placeholder.
    pub fn with_defaults() -> Self {
        let mut manager = Self::default();
        for chain in [CHAIN_BASE, CHAIN_ARBITRUM] {
            manager.insert(chain, NATIVE_TOKEN, TokenInfo::new("ETH", "Ether", 18));
        }
        manager.insert(CHAIN_BASE, USDC_BASE, TokenInfo::new("USDC", "USD Coin", 6));
        manager.insert(CHAIN_ARBITRUM, USDC_ARBITRUM, TokenInfo::new("USDC", "USD Coin", 6));
        manager
    }

    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read tokenlist {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
            .map_err(|e| AppError::Config(format!("Invalid tokenlist JSON {}: {e}", path.display())))
    }

    /// Defaults, overlaid with the list at `path` when it exists.
    pub fn load_or_defaults(path: &Path) -> Result<Self, AppError> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!(target: "token_manager", path = %path.display(), "no tokenlist; using built-ins");
            Ok(Self::with_defaults())
        }
    }

    fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let list: TokenList = serde_json::from_str(raw)?;
        let mut manager = Self::with_defaults();
        let mut skipped = 0usize;
        for entry in list.tokens {
            match entry.address.trim().parse::<Address>() {
                Ok(addr) => manager.insert(
                    entry.chain_id,
                    addr,
                    TokenInfo::new(&entry.symbol, &entry.name, entry.decimals),
                ),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(target: "token_manager", skipped, "tokenlist entries with bad addresses ignored");
        }
        Ok(manager)
    }

    fn insert(&mut self, chain_id: u64, address: Address, info: TokenInfo) {
        self.tokens_by_chain
            .entry(chain_id)
            .or_default()
            .insert(address, info);
    }

    /// Remember a token seen at runtime. Entries from the list take precedence.
    pub fn register(&self, chain_id: u64, address: Address, symbol: &str, decimals: u8) {
        if self.listed(chain_id, address).is_some() {
            return;
        }
        self.discovered
            .insert((chain_id, address), TokenInfo::new(symbol, symbol, decimals));
    }

    fn listed(&self, chain_id: u64, address: Address) -> Option<&TokenInfo> {
        self.tokens_by_chain
            .get(&chain_id)
            .and_then(|m| m.get(&address))
    }

    pub fn info(&self, chain_id: u64, address: Address) -> Option<TokenInfo> {
        self.listed(chain_id, address).cloned().or_else(|| {
            self.discovered
                .get(&(chain_id, address))
                .map(|entry| entry.value().clone())
        })
    }

    pub fn decimals(&self, chain_id: u64, address: Address) -> Option<u8> {
        self.info(chain_id, address).map(|t| t.decimals)
    }

    /// Symbol for display; falls back to a shortened address.
    pub fn symbol(&self, chain_id: u64, address: Address) -> String {
        match self.info(chain_id, address) {
            Some(info) => info.symbol,
            None => short_address(address),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens_by_chain.values().map(HashMap::len).sum::<usize>() + self.discovered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn short_address(address: Address) -> String {
    let full = format!("{address:#x}");
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = r#"{
        "name": "base",
        "tokens": [
            {"chainId": 8453, "address": "0x4ed4e862860bed51a9570b96d89af5e1b0efefed", "symbol": "DEGEN", "name": "Degen", "decimals": 18},
            {"chainId": 8453, "address": "not-an-address", "symbol": "BAD", "decimals": 18}
        ]
    }"#;

    #[test]
    fn loads_list_on_top_of_defaults() {
        let manager = TokenManager::from_json(LIST).unwrap();
        let degen: Address = "0x4ed4e862860bed51a9570b96d89af5e1b0efefed".parse().unwrap();
        assert_eq!(manager.symbol(CHAIN_BASE, degen), "DEGEN");
        assert_eq!(manager.decimals(CHAIN_BASE, USDC_BASE), Some(6));
        assert_eq!(manager.decimals(CHAIN_ARBITRUM, degen), None);
    }

    #[test]
    fn runtime_registration_does_not_shadow_list() {
        let manager = TokenManager::with_defaults();
        manager.register(CHAIN_BASE, USDC_BASE, "FAKE", 18);
        assert_eq!(manager.decimals(CHAIN_BASE, USDC_BASE), Some(6));

        let token = Address::repeat_byte(0x42);
        manager.register(CHAIN_BASE, token, "NEW", 9);
        assert_eq!(manager.decimals(CHAIN_BASE, token), Some(9));
    }

    #[test]
    fn unknown_symbol_renders_short_address() {
        let manager = TokenManager::default();
        assert_eq!(manager.symbol(CHAIN_BASE, Address::repeat_byte(0xab)), "0xabab…abab");
        assert!(manager.is_empty());
    }
}
