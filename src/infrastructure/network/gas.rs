// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::retry::{RetryPolicy, retry_async};
use crate::network::provider::HttpProvider;
use alloy::providers::Provider;
use alloy::rpc::types::BlockNumberOrTag;
use alloy::rpc::types::eth::FeeHistory;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fallback tip when the node reports none (1 gwei).
const DEFAULT_PRIORITY_FEE_WEI: u128 = 1_000_000_000;

#[derive(Clone)]
pub struct GasOracle {
    provider: HttpProvider,
    last_good: Arc<Mutex<Option<GasFees>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasFees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub base_fee_per_gas: u128,
}

impl GasFees {
    /// Wallet-style pricing: room for the base fee to double before the tx stalls.
    pub fn from_base_and_tip(next_base_fee: u128, tip: u128) -> Self {
        Self {
            max_fee_per_gas: next_base_fee.saturating_mul(2).saturating_add(tip),
            max_priority_fee_per_gas: tip,
            base_fee_per_gas: next_base_fee,
        }
    }
}

impl GasOracle {
    pub fn new(provider: HttpProvider) -> Self {
        Self {
            provider,
            last_good: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn estimate_eip1559_fees(&self) -> Result<GasFees, AppError> {
        match self.fee_history().await {
            Ok(history) => {
                let fees = fees_from_history(&history)?;
                if let Ok(mut guard) = self.last_good.lock() {
                    *guard = Some(fees.clone());
                }
                Ok(fees)
            }
            Err(e) => {
                tracing::debug!(target: "wallet", error = %e, "fee history unavailable");
                if let Ok(guard) = self.last_good.lock()
                    && let Some(fees) = guard.clone()
                {
                    return Ok(fees);
                }
                self.fallback_estimate().await
            }
        }
    }

    async fn fee_history(&self) -> Result<FeeHistory, AppError> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move {
                    provider
                        .get_fee_history(5, BlockNumberOrTag::Latest, &[50.0f64])
                        .await
                }
            },
            RetryPolicy::new(2, Duration::from_millis(100)),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Fee History failed: {}", e)))
    }

    async fn fallback_estimate(&self) -> Result<GasFees, AppError> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| AppError::Connection(format!("Gas price fetch failed: {}", e)))?;
        let tip = self
            .provider
            .get_max_priority_fee_per_gas()
            .await
            .unwrap_or(DEFAULT_PRIORITY_FEE_WEI)
            .min(gas_price);
        Ok(GasFees::from_base_and_tip(gas_price.saturating_sub(tip), tip))
    }
}

fn fees_from_history(history: &FeeHistory) -> Result<GasFees, AppError> {
    let latest_base_fee = history
        .latest_block_base_fee()
        .or_else(|| history.base_fee_per_gas.iter().rev().nth(1).copied())
        .ok_or(AppError::Initialization("No base fee history".into()))?;
    let next_base_fee = history
        .next_block_base_fee()
        .filter(|fee| *fee > 0)
        .unwrap_or(latest_base_fee);

    let tips: Vec<u128> = history
        .reward
        .as_ref()
        .map(|rewards| rewards.iter().filter_map(|r| r.first().copied()).collect())
        .unwrap_or_default();
    Ok(GasFees::from_base_and_tip(next_base_fee, median_tip(&tips)))
}

fn median_tip(tips: &[u128]) -> u128 {
    if tips.is_empty() {
        return DEFAULT_PRIORITY_FEE_WEI;
    }
    let mut sorted = tips.to_vec();
    sorted.sort_unstable();
    sorted[sorted.len() / 2]
}
