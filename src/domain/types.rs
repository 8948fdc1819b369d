// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, B256, Bytes, U256};
use std::fmt;
use std::str::FromStr;

/// Connector a wallet was attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorKind {
    /// Browser-extension style EOA wallet.
    Injected,
    /// Provider-managed smart/embedded wallet.
    Embedded,
}

impl ConnectorKind {
    /// Connector the session signs with for the given EOA-mode preference.
    pub fn for_eoa_mode(eoa_mode: bool) -> Self {
        if eoa_mode {
            ConnectorKind::Embedded
        } else {
            ConnectorKind::Injected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorKind::Injected => "injected",
            ConnectorKind::Embedded => "embedded",
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "injected" => Ok(ConnectorKind::Injected),
            "embedded" => Ok(ConnectorKind::Embedded),
            other => Err(format!("unknown connector kind '{other}'")),
        }
    }
}

/// A wallet exposed by the wallet provider. The session never mutates these,
/// it only reads them and asks the provider to activate one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletHandle {
    pub address: Address,
    pub connector: ConnectorKind,
    /// CAIP-2 chain reference, e.g. `eip155:8453`.
    pub chain: String,
}

impl WalletHandle {
    pub fn new(address: Address, connector: ConnectorKind, chain_id: u64) -> Self {
        Self {
            address,
            connector,
            chain: format!("eip155:{chain_id}"),
        }
    }

    /// Numeric chain id from the CAIP-2 reference. Bare numbers are accepted too.
    pub fn chain_id(&self) -> Option<u64> {
        let raw = self.chain.rsplit(':').next().unwrap_or(&self.chain);
        raw.trim().parse().ok()
    }
}

/// Address and chain the provider currently signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveAccount {
    pub address: Address,
    pub chain_id: Option<u64>,
}

/// On-chain allowance observed for an (owner, spender, token) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceRecord {
    pub owner: Address,
    pub spender: Address,
    pub token: Address,
    pub amount: U256,
}

/// A proposed ERC-20 approval. Only built when the allowance is short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalIntent {
    pub token: Address,
    pub spender: Address,
    /// Raw integer units, never normalized.
    pub amount: U256,
    pub title: String,
}

/// A write the signer can execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub chain_id: u64,
    pub gas: Option<u64>,
}

impl CallRequest {
    /// A call is complete once it has a target and a function selector.
    pub fn is_complete(&self) -> bool {
        self.to != Address::ZERO && self.data.len() >= 4
    }
}

/// Receipt outcome for a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceiptSummary {
    pub hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
    pub gas_used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Approve,
    Swap,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Approve => f.write_str("approve"),
            TxKind::Swap => f.write_str("swap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
    Idle,
    Simulating,
    AwaitingSignature,
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    /// Buttons spin while the wallet or the chain still owes us an answer.
    pub fn is_loading(&self) -> bool {
        matches!(self, TxStatus::AwaitingSignature | TxStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }

    /// Allowed edges of the job lifecycle. Reset to `Idle` is always allowed.
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        use TxStatus::*;
        match (self, next) {
            (_, Idle) => true,
            (Idle, Simulating) => true,
            (Idle | Simulating, AwaitingSignature) => true,
            // A fresh write on a finished or still-pending job re-arms it.
            (Pending | Confirmed | Failed, AwaitingSignature) => true,
            (Confirmed | Failed, Simulating) => true,
            (AwaitingSignature, Pending | Failed) => true,
            (Pending, Confirmed | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Idle => "idle",
            TxStatus::Simulating => "simulating",
            TxStatus::AwaitingSignature => "awaiting_signature",
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One user-initiated write and where it is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionJob {
    pub kind: TxKind,
    pub description: String,
    pub call: Option<CallRequest>,
    pub hash: Option<B256>,
    pub status: TxStatus,
}

impl TransactionJob {
    pub fn new(kind: TxKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            call: None,
            hash: None,
            status: TxStatus::Idle,
        }
    }
}

/// Advisory route result. Always re-simulated before it is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuote {
    pub amount_out: U256,
    pub gas: U256,
    /// Basis points, absent when the API has no USD price for a leg.
    pub price_impact_bps: Option<f64>,
    pub tx: Option<RouteTransaction>,
}

impl RouteQuote {
    /// Contract that pulls `token_in` from the sender, known only for routed quotes.
    pub fn spender(&self) -> Option<Address> {
        self.tx.as_ref().map(|tx| tx.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTransaction {
    pub to: Address,
    pub from: Address,
    pub data: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Meme,
    Defi,
    Defai,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Meme, Category::Defi, Category::Defai];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Meme => "meme",
            Category::Defi => "defi",
            Category::Defai => "defai",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meme" | "memes" => Ok(Category::Meme),
            "defi" => Ok(Category::Defi),
            "defai" => Ok(Category::Defai),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}
