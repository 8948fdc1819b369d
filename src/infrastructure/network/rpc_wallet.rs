// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Wallet provider backed by local keys and a JSON-RPC node. One signer per
//! connector kind; the node is only used for reads, estimates and broadcast.

use crate::common::constants::GAS_BUFFER_BPS;
use crate::common::error::{AppError, WalletError};
use crate::domain::types::{ActiveAccount, CallRequest, ConnectorKind, TxReceiptSummary, WalletHandle};
use crate::network::gas::GasOracle;
use crate::network::provider::HttpProvider;
use crate::network::wallet::{TransactionSigner, WalletProvider};
use alloy::consensus::{SignableTransaction, TxEip1559};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256, TxKind};
use alloy::providers::Provider;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy_consensus::TxEnvelope;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::broadcast;

pub struct RpcWallet {
    provider: HttpProvider,
    chain_id: u64,
    signers: Vec<(ConnectorKind, PrivateKeySigner)>,
    connected: RwLock<Vec<ConnectorKind>>,
    active: RwLock<Option<ConnectorKind>>,
    gas: GasOracle,
    blocks: broadcast::Sender<u64>,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl RpcWallet {
    /// Every configured signer starts connected; none is active until the
    /// session activates one.
    pub fn new(
        provider: HttpProvider,
        chain_id: u64,
        signers: Vec<(ConnectorKind, PrivateKeySigner)>,
        blocks: broadcast::Sender<u64>,
        receipt_poll: Duration,
        receipt_timeout: Duration,
    ) -> Self {
        let connected = signers.iter().map(|(kind, _)| *kind).collect();
        Self {
            gas: GasOracle::new(provider.clone()),
            provider,
            chain_id,
            signers,
            connected: RwLock::new(connected),
            active: RwLock::new(None),
            blocks,
            receipt_poll,
            receipt_timeout,
        }
    }

    pub fn parse_key(raw: &str, field: &str) -> Result<PrivateKeySigner, AppError> {
        PrivateKeySigner::from_str(raw.trim())
            .map_err(|e| AppError::Config(format!("{field} is not a valid private key: {e}")))
    }

    fn signer_for(&self, kind: ConnectorKind) -> Option<&PrivateKeySigner> {
        self.signers
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, signer)| signer)
    }

    fn active_signer(&self) -> Result<&PrivateKeySigner, WalletError> {
        let active = *self
            .active
            .read()
            .map_err(|_| WalletError::Activation("wallet state poisoned".into()))?;
        let kind = active.ok_or_else(|| WalletError::Rejected("No active wallet".into()))?;
        self.signer_for(kind)
            .ok_or_else(|| WalletError::Activation(format!("no {kind} signer configured")))
    }

    fn request_for(&self, from: Address, call: &CallRequest) -> TransactionRequest {
        TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(call.to)),
            value: Some(call.value),
            input: TransactionInput::new(call.data.clone()),
            chain_id: Some(call.chain_id),
            ..Default::default()
        }
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    fn wallets(&self) -> Vec<WalletHandle> {
        let Ok(connected) = self.connected.read() else {
            return Vec::new();
        };
        connected
            .iter()
            .filter_map(|kind| {
                self.signer_for(*kind)
                    .map(|s| WalletHandle::new(s.address(), *kind, self.chain_id))
            })
            .collect()
    }

    fn active_account(&self) -> Option<ActiveAccount> {
        let kind = (*self.active.read().ok()?)?;
        self.signer_for(kind).map(|s| ActiveAccount {
            address: s.address(),
            chain_id: Some(self.chain_id),
        })
    }

    async fn connect(&self, kind: ConnectorKind) -> Result<WalletHandle, WalletError> {
        let signer = self
            .signer_for(kind)
            .ok_or_else(|| WalletError::Unsupported(format!("no {kind} wallet configured")))?;
        let mut connected = self
            .connected
            .write()
            .map_err(|_| WalletError::Activation("wallet state poisoned".into()))?;
        if !connected.contains(&kind) {
            connected.push(kind);
        }
        Ok(WalletHandle::new(signer.address(), kind, self.chain_id))
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        if let Ok(mut connected) = self.connected.write() {
            connected.clear();
        }
        if let Ok(mut active) = self.active.write() {
            *active = None;
        }
        Ok(())
    }

    async fn activate(&self, wallet: &WalletHandle) -> Result<(), WalletError> {
        let is_connected = self
            .connected
            .read()
            .map(|c| c.contains(&wallet.connector))
            .unwrap_or(false);
        let matches = self
            .signer_for(wallet.connector)
            .is_some_and(|s| s.address() == wallet.address);
        if !is_connected || !matches {
            return Err(WalletError::Activation(format!(
                "{:#x} is not a connected {} wallet",
                wallet.address, wallet.connector
            )));
        }
        let mut active = self
            .active
            .write()
            .map_err(|_| WalletError::Activation("wallet state poisoned".into()))?;
        *active = Some(wallet.connector);
        tracing::info!(
            target: "wallet",
            address = %format!("{:#x}", wallet.address),
            connector = %wallet.connector,
            "wallet activated"
        );
        Ok(())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        if chain_id == self.chain_id {
            return Ok(());
        }
        Err(WalletError::Unsupported(format!(
            "RPC endpoint serves chain {}, cannot switch to {chain_id}",
            self.chain_id
        )))
    }

    fn subscribe_blocks(&self) -> broadcast::Receiver<u64> {
        self.blocks.subscribe()
    }
}

#[async_trait]
impl TransactionSigner for RpcWallet {
    async fn simulate(&self, call: &CallRequest) -> Result<u64, WalletError> {
        let from = call
            .from
            .or_else(|| self.active_signer().ok().map(|s| s.address()))
            .unwrap_or_default();
        self.provider
            .estimate_gas(self.request_for(from, call))
            .await
            .map_err(|e| WalletError::Simulation(e.to_string()))
    }

    async fn send_transaction(&self, call: &CallRequest) -> Result<B256, WalletError> {
        let signer = self.active_signer()?.clone();
        if call.chain_id != self.chain_id {
            return Err(WalletError::Unsupported(format!(
                "call targets chain {}, wallet is on {}",
                call.chain_id, self.chain_id
            )));
        }
        let from = signer.address();

        let estimate = self
            .provider
            .estimate_gas(self.request_for(from, call))
            .await
            .map_err(|e| e.to_string());
        let gas_limit = resolve_gas_limit(estimate, call.gas)?;
        let fees = self
            .gas
            .estimate_eip1559_fees()
            .await
            .map_err(|e| WalletError::Broadcast(e.to_string()))?;
        let nonce = self
            .provider
            .get_transaction_count(from)
            .pending()
            .await
            .map_err(|e| WalletError::Broadcast(format!("nonce lookup failed: {e}")))?;

        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            gas_limit,
            to: TxKind::Call(call.to),
            value: call.value,
            access_list: Default::default(),
            input: call.data.clone(),
        };
        let sig = TxSignerSync::sign_transaction_sync(&signer, &mut tx)
            .map_err(|e| WalletError::Rejected(format!("Sign tx failed: {e}")))?;
        let signed: TxEnvelope = tx.into_signed(sig).into();
        let hash = *signed.tx_hash();
        let raw = signed.encoded_2718();

        self.provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| WalletError::Broadcast(e.to_string()))?;
        tracing::info!(
            target: "wallet",
            tx_hash = %format!("{:#x}", hash),
            nonce,
            gas_limit,
            "transaction broadcast"
        );
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceiptSummary, WalletError> {
        let mut last_error = None;
        let poll = async {
            loop {
                match self.provider.get_transaction_receipt(hash).await {
                    Ok(Some(rcpt)) => {
                        return TxReceiptSummary {
                            hash,
                            block_number: rcpt.block_number,
                            success: rcpt.status(),
                            gas_used: rcpt.gas_used,
                        };
                    }
                    Ok(None) => last_error = None,
                    Err(e) => {
                        tracing::debug!(target: "wallet", error = %e, "receipt poll failed");
                        last_error = Some(e.to_string());
                    }
                }
                tokio::time::sleep(self.receipt_poll).await;
            }
        };
        let result = tokio::time::timeout(self.receipt_timeout, poll).await;
        result.map_err(|_| receipt_deadline_error(hash, last_error))
    }
}

/// Padded node estimate, or the caller's hint when the estimate fails. A
/// failed estimate only blocks the send when there is nothing to fall back on.
fn resolve_gas_limit(estimate: Result<u64, String>, hint: Option<u64>) -> Result<u64, WalletError> {
    match (estimate, hint) {
        (Ok(gas), _) => Ok(gas.saturating_mul(GAS_BUFFER_BPS) / 10_000),
        (Err(e), Some(hint)) => {
            tracing::warn!(target: "wallet", error = %e, gas_limit = hint, "gas estimate failed, using hint");
            Ok(hint)
        }
        (Err(e), None) => Err(WalletError::Simulation(e)),
    }
}

/// Deadline hit: a node that kept failing is a lookup error, a node that kept
/// answering "not yet" is a timeout.
fn receipt_deadline_error(hash: B256, last_error: Option<String>) -> WalletError {
    match last_error {
        Some(e) => WalletError::Receipt(e),
        None => WalletError::ReceiptTimeout(hash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::provider::ConnectionFactory;

    fn wallet() -> (RpcWallet, PrivateKeySigner, PrivateKeySigner) {
        let injected = PrivateKeySigner::random();
        let embedded = PrivateKeySigner::random();
        let provider = ConnectionFactory::http("http://127.0.0.1:8545").unwrap();
        let (tx, _) = broadcast::channel(4);
        let wallet = RpcWallet::new(
            provider,
            8453,
            vec![
                (ConnectorKind::Injected, injected.clone()),
                (ConnectorKind::Embedded, embedded.clone()),
            ],
            tx,
            Duration::from_millis(10),
            Duration::from_millis(50),
        );
        (wallet, injected, embedded)
    }

    #[tokio::test]
    async fn lists_connected_wallets_without_active() {
        let (wallet, injected, embedded) = wallet();
        let handles = wallet.wallets();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].address, injected.address());
        assert_eq!(handles[1].address, embedded.address());
        assert_eq!(handles[1].chain, "eip155:8453");
        assert!(wallet.active_account().is_none());
    }

    #[tokio::test]
    async fn activation_requires_matching_connected_wallet() {
        let (wallet, injected, _) = wallet();
        let forged = WalletHandle::new(Address::repeat_byte(3), ConnectorKind::Injected, 8453);
        assert!(wallet.activate(&forged).await.is_err());

        let handle = WalletHandle::new(injected.address(), ConnectorKind::Injected, 8453);
        wallet.activate(&handle).await.unwrap();
        assert_eq!(wallet.active_account().unwrap().address, injected.address());

        wallet.disconnect().await.unwrap();
        assert!(wallet.active_account().is_none());
        assert!(wallet.activate(&handle).await.is_err());
    }

    #[tokio::test]
    async fn switching_to_another_chain_is_unsupported() {
        let (wallet, _, _) = wallet();
        assert!(wallet.switch_chain(8453).await.is_ok());
        assert!(matches!(
            wallet.switch_chain(1).await,
            Err(WalletError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn sending_without_active_wallet_is_rejected() {
        let (wallet, _, _) = wallet();
        let call = CallRequest {
            from: None,
            to: Address::repeat_byte(1),
            data: vec![0x09, 0x5e, 0xa7, 0xb3].into(),
            value: Default::default(),
            chain_id: 8453,
            gas: Some(70_000),
        };
        assert!(matches!(
            wallet.send_transaction(&call).await,
            Err(WalletError::Rejected(_))
        ));
    }

    #[test]
    fn failed_estimate_falls_back_to_hint() {
        assert_eq!(resolve_gas_limit(Ok(100_000), Some(70_000)), Ok(150_000));
        assert_eq!(resolve_gas_limit(Err("execution reverted".into()), Some(70_000)), Ok(70_000));
        assert_eq!(
            resolve_gas_limit(Err("execution reverted".into()), None),
            Err(WalletError::Simulation("execution reverted".into()))
        );
    }

    #[test]
    fn deadline_error_depends_on_last_poll() {
        let hash = B256::repeat_byte(7);
        assert_eq!(receipt_deadline_error(hash, None), WalletError::ReceiptTimeout(hash));
        assert_eq!(
            receipt_deadline_error(hash, Some("connection refused".into())),
            WalletError::Receipt("connection refused".into())
        );
    }

    #[test]
    fn invalid_key_is_config_error() {
        assert!(matches!(
            RpcWallet::parse_key("0x1234", "WALLET_KEY"),
            Err(AppError::Config(_))
        ));
    }
}
