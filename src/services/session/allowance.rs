// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::constants::APPROVE_GAS_LIMIT;
use crate::common::error::AppError;
use crate::common::units::{format_significant, normalize_value};
use crate::common::validation::AllowanceKey;
use crate::data::erc20::approve_calldata;
use crate::data::token_manager::TokenManager;
use crate::domain::types::{AllowanceRecord, ApprovalIntent, CallRequest};
use crate::network::wallet::TokenStateReader;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// ERC-20 allowance checks for the swap spender. Nothing is cached: every
/// question goes to the chain.
#[derive(Clone)]
pub struct AllowanceGate {
    reader: Arc<dyn TokenStateReader>,
    tokens: Arc<TokenManager>,
    chain_id: u64,
}

impl AllowanceGate {
    pub fn new(reader: Arc<dyn TokenStateReader>, tokens: Arc<TokenManager>, chain_id: u64) -> Self {
        Self {
            reader,
            tokens,
            chain_id,
        }
    }

    pub async fn current_allowance(&self, key: &AllowanceKey) -> Result<U256, AppError> {
        self.reader
            .allowance(key.token, key.owner, key.spender)
            .await
    }

    /// `None` when nothing needs approving or the question cannot be asked yet
    /// (zero amount, unknown owner, spender or token).
    pub async fn approval_needed(
        &self,
        owner: Option<Address>,
        spender: Option<Address>,
        token: Option<Address>,
        required: U256,
    ) -> Result<Option<ApprovalIntent>, AppError> {
        if required.is_zero() {
            return Ok(None);
        }
        let Ok(key) = AllowanceKey::validate(owner, spender, token) else {
            return Ok(None);
        };
        let current = self.current_allowance(&key).await?;
        Ok(self.intent_if_short(&key, current, required))
    }

    /// Pure half of [`approval_needed`] for an allowance already in hand.
    pub fn intent_if_short(
        &self,
        key: &AllowanceKey,
        current: U256,
        required: U256,
    ) -> Option<ApprovalIntent> {
        if required.is_zero() || current >= required {
            return None;
        }
        tracing::debug!(
            target: "allowance",
            token = %format!("{:#x}", key.token),
            spender = %format!("{:#x}", key.spender),
            %current,
            %required,
            "allowance short"
        );
        Some(self.build_approval(key.token, key.spender, required))
    }

    pub fn build_approval(&self, token: Address, spender: Address, required: U256) -> ApprovalIntent {
        let symbol = self.tokens.symbol(self.chain_id, token);
        let title = match self.tokens.decimals(self.chain_id, token) {
            Some(decimals) => format!(
                "Approve {} of {} for spending",
                format_significant(normalize_value(required, decimals), 6),
                symbol
            ),
            None => format!("Approve {symbol} for spending"),
        };
        ApprovalIntent {
            token,
            spender,
            amount: required,
            title,
        }
    }

    pub fn approval_call(&self, intent: &ApprovalIntent, from: Address) -> CallRequest {
        CallRequest {
            from: Some(from),
            to: intent.token,
            data: approve_calldata(intent.spender, intent.amount),
            value: U256::ZERO,
            chain_id: self.chain_id,
            gas: Some(APPROVE_GAS_LIMIT),
        }
    }

    /// Re-read `key` on every new block until the block feed closes.
    pub fn watch(&self, key: AllowanceKey, blocks: broadcast::Receiver<u64>) -> AllowanceWatch {
        AllowanceWatch {
            gate: self.clone(),
            key,
            blocks,
            primed: false,
        }
    }
}

pub struct AllowanceWatch {
    gate: AllowanceGate,
    key: AllowanceKey,
    blocks: broadcast::Receiver<u64>,
    primed: bool,
}

impl AllowanceWatch {
    pub fn key(&self) -> &AllowanceKey {
        &self.key
    }

    /// The first call reads right away; later calls wait for a block. A burst
    /// of blocks, or a lagged receiver, yields a single read.
    pub async fn next(&mut self) -> Option<Result<AllowanceRecord, AppError>> {
        if self.primed {
            match self.blocks.recv().await {
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(target: "allowance", skipped, "block feed lagged");
                }
                Err(RecvError::Closed) => return None,
            }
            loop {
                match self.blocks.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Empty) => break,
                    // Deliver the read for the block we already saw.
                    Err(TryRecvError::Closed) => break,
                }
            }
        }
        self.primed = true;
        let key = self.key;
        let result = self
            .gate
            .current_allowance(&key)
            .await
            .map(|amount| AllowanceRecord {
                owner: key.owner,
                spender: key.spender,
                token: key.token,
                amount,
            });
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::USDC_BASE;
    use crate::network::wallet::WalletProvider;
    use crate::test_support::MockWallet;

    fn gate(wallet: &Arc<MockWallet>) -> AllowanceGate {
        AllowanceGate::new(wallet.clone(), Arc::new(TokenManager::with_defaults()), 8453)
    }

    fn key() -> AllowanceKey {
        AllowanceKey {
            owner: Address::repeat_byte(1),
            spender: Address::repeat_byte(2),
            token: USDC_BASE,
        }
    }

    #[tokio::test]
    async fn short_allowance_builds_exact_intent() {
        let wallet = Arc::new(MockWallet::new(8453));
        let gate = gate(&wallet);
        let k = key();
        let required = U256::from(1_000_000u64);

        let intent = gate
            .approval_needed(Some(k.owner), Some(k.spender), Some(k.token), required)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(intent.amount, required);
        assert_eq!(intent.spender, k.spender);
        assert_eq!(intent.title, "Approve 1 of USDC for spending");

        wallet.set_allowance(k.token, k.owner, k.spender, required);
        assert!(
            gate.approval_needed(Some(k.owner), Some(k.spender), Some(k.token), required)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn missing_inputs_or_zero_amount_skip_the_read() {
        let wallet = Arc::new(MockWallet::new(8453));
        let gate = gate(&wallet);
        let k = key();
        assert!(
            gate.approval_needed(None, Some(k.spender), Some(k.token), U256::from(5u64))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            gate.approval_needed(Some(k.owner), Some(k.spender), Some(k.token), U256::ZERO)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(wallet.allowance_reads(), 0);
    }

    #[test]
    fn approval_call_targets_token() {
        let wallet = Arc::new(MockWallet::new(8453));
        let gate = gate(&wallet);
        let intent = gate.build_approval(USDC_BASE, Address::repeat_byte(2), U256::from(7u64));
        let call = gate.approval_call(&intent, Address::repeat_byte(1));
        assert_eq!(call.to, USDC_BASE);
        assert!(call.is_complete());
    }

    #[tokio::test]
    async fn watch_rereads_on_each_block() {
        let wallet = Arc::new(MockWallet::new(8453));
        let gate = gate(&wallet);
        let k = key();
        let mut watch = gate.watch(k, wallet.subscribe_blocks());

        assert_eq!(watch.next().await.unwrap().unwrap().amount, U256::ZERO);

        wallet.set_allowance(k.token, k.owner, k.spender, U256::from(9u64));
        wallet.emit_block(100);
        wallet.emit_block(101);
        assert_eq!(watch.next().await.unwrap().unwrap().amount, U256::from(9u64));
        // Both blocks collapsed into the one read above.
        assert_eq!(wallet.allowance_reads(), 2);
    }
}
