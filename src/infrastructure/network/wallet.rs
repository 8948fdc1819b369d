// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Capabilities the session needs from the wallet-connection and signing
//! provider. The session only reads wallet state and asks for activation; it
//! never owns keys.

use crate::domain::error::{AppError, WalletError};
use crate::domain::types::{ActiveAccount, CallRequest, ConnectorKind, TxReceiptSummary, WalletHandle};
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use tokio::sync::broadcast;

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Every wallet currently connected, in provider order.
    fn wallets(&self) -> Vec<WalletHandle>;

    fn active_account(&self) -> Option<ActiveAccount>;

    async fn connect(&self, kind: ConnectorKind) -> Result<WalletHandle, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;

    async fn activate(&self, wallet: &WalletHandle) -> Result<(), WalletError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    /// New block heights as the provider observes them.
    fn subscribe_blocks(&self) -> broadcast::Receiver<u64>;
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Dry run; returns the gas estimate.
    async fn simulate(&self, call: &CallRequest) -> Result<u64, WalletError>;

    /// Sign and broadcast; returns the transaction hash.
    async fn send_transaction(&self, call: &CallRequest) -> Result<B256, WalletError>;

    /// Resolves once a receipt exists. Reverted receipts come back with
    /// `success == false`; a missing receipt is `ReceiptTimeout`.
    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceiptSummary, WalletError>;
}

#[async_trait]
pub trait TokenStateReader: Send + Sync {
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AppError>;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, AppError>;
}
