// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::common::retry::{RetryPolicy, retry_async};
use crate::network::provider::HttpProvider;
use crate::network::wallet::TokenStateReader;
use alloy::eips::BlockId;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::time::Duration;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract ERC20 {
        function balanceOf(address) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

/// Allowance reads retry twice before surfacing.
const READ_RETRY: RetryPolicy = RetryPolicy::new(2, Duration::from_millis(100));

/// Calldata for `approve(spender, amount)`.
pub fn approve_calldata(spender: Address, amount: U256) -> Bytes {
    ERC20::approveCall { spender, amount }.abi_encode().into()
}

/// Token reads against the pending block, so a just-mined approval is visible
/// on the next read.
#[derive(Clone)]
pub struct Erc20Reader {
    provider: HttpProvider,
}

impl Erc20Reader {
    pub fn new(provider: HttpProvider) -> Self {
        Self { provider }
    }

    pub async fn metadata(&self, token: Address) -> Result<(String, u8), AppError> {
        let contract = ERC20::new(token, self.provider.clone());
        let symbol = contract
            .symbol()
            .call()
            .await
            .map_err(|e| AppError::Connection(format!("symbol() failed for {token:#x}: {e}")))?;
        let decimals = contract
            .decimals()
            .call()
            .await
            .map_err(|e| AppError::Connection(format!("decimals() failed for {token:#x}: {e}")))?;
        Ok((symbol, decimals))
    }
}

#[async_trait]
impl TokenStateReader for Erc20Reader {
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AppError> {
        let contract = ERC20::new(token, self.provider.clone());
        retry_async(
            move |_| {
                let contract = contract.clone();
                async move {
                    contract
                        .allowance(owner, spender)
                        .block(BlockId::pending())
                        .call()
                        .await
                }
            },
            READ_RETRY,
        )
        .await
        .map_err(|e| AppError::Connection(format!("allowance() failed for {token:#x}: {e}")))
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, AppError> {
        let contract = ERC20::new(token, self.provider.clone());
        retry_async(
            move |_| {
                let contract = contract.clone();
                async move { contract.balanceOf(owner).block(BlockId::pending()).call().await }
            },
            READ_RETRY,
        )
        .await
        .map_err(|e| AppError::Connection(format!("balanceOf() failed for {token:#x}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_calldata_has_selector_and_args() {
        let data = approve_calldata(Address::repeat_byte(0x11), U256::from(1_000_000u64));
        assert_eq!(&data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(data.len(), 4 + 32 * 2);
        let decoded = ERC20::approveCall::abi_decode(&data).unwrap();
        assert_eq!(decoded.spender, Address::repeat_byte(0x11));
        assert_eq!(decoded.amount, U256::from(1_000_000u64));
    }
}
