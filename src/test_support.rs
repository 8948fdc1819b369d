// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! In-memory wallet and routing doubles shared by unit and integration tests.

use crate::common::error::{AppError, WalletError};
use crate::data::erc20::{ERC20, approve_calldata};
use crate::domain::types::{
    ActiveAccount, CallRequest, ConnectorKind, TxReceiptSummary, WalletHandle,
};
use crate::network::routing::{
    ApproveData, ApproveParams, ApproveTx, BalanceParams, QuoteData, QuoteParams, RouteData,
    RouteParams, RouteSource, RouteTx, TokenBalance,
};
use crate::network::wallet::{TokenStateReader, TransactionSigner, WalletProvider};
use alloy::primitives::{Address, B256, Bytes, U256, address};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tokio::sync::{Notify, broadcast};

/// Spender the mock routing API quotes against.
pub const ROUTER: Address = address!("80eba3855878739f4710233a8a19d89bdd2ffb8e");

pub const DEFAULT_SIMULATED_GAS: u64 = 21_000;

/// A complete call with a 4-byte selector.
pub fn sample_call() -> CallRequest {
    CallRequest {
        from: None,
        to: ROUTER,
        data: Bytes::from_static(&[0xb3, 0x5d, 0x7e, 0x73, 0x00, 0x01]),
        value: U256::ZERO,
        chain_id: 8453,
        gas: None,
    }
}

/// Runs `f` with temporary environment overrides under a process-wide lock.
pub fn with_locked_env<T>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let previous = vars
        .iter()
        .map(|(name, _)| ((*name).to_string(), std::env::var(name).ok()))
        .collect::<Vec<_>>();
    for (name, value) in vars {
        match value {
            Some(v) => unsafe { std::env::set_var(name, v) },
            None => unsafe { std::env::remove_var(name) },
        }
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (name, value) in previous {
        match value {
            Some(v) => unsafe { std::env::set_var(&name, v) },
            None => unsafe { std::env::remove_var(&name) },
        }
    }
    match result {
        Ok(output) => output,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReceiptBehaviour {
    #[default]
    Success,
    Reverted,
    Timeout,
}

type AllowanceSlot = (Address, Address, Address);

#[derive(Default)]
struct MockWalletState {
    wallets: Vec<WalletHandle>,
    active: Option<ActiveAccount>,
    activations: Vec<WalletHandle>,
    fail_activation: bool,
    defer_activation: bool,
    /// Accepted activation not yet reflected in `active`.
    pending_activation: Option<ActiveAccount>,
    allowance_error: Option<String>,
    simulation: Option<Result<u64, WalletError>>,
    send_error: Option<WalletError>,
    receipt: ReceiptBehaviour,
    allowances: HashMap<AllowanceSlot, U256>,
    balances: HashMap<(Address, Address), U256>,
    /// Approvals that take effect once their receipt is seen.
    pending_approvals: HashMap<B256, (AllowanceSlot, U256)>,
    sent: Vec<CallRequest>,
    allowance_reads: usize,
    nonce: u64,
    block: u64,
    receipt_gate: Option<Arc<Notify>>,
}

/// Wallet provider, signer and token reader in one, backed by plain maps.
pub struct MockWallet {
    chain_id: u64,
    state: Mutex<MockWalletState>,
    blocks: broadcast::Sender<u64>,
}

impl MockWallet {
    pub fn new(chain_id: u64) -> Self {
        let (blocks, _) = broadcast::channel(16);
        Self {
            chain_id,
            state: Mutex::new(MockWalletState::default()),
            blocks,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockWalletState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_wallet(self, handle: WalletHandle) -> Self {
        self.lock().wallets.push(handle);
        self
    }

    pub fn set_active(&self, address: Option<Address>) {
        self.lock().active = address.map(|address| ActiveAccount {
            address,
            chain_id: Some(self.chain_id),
        });
    }

    pub fn fail_activation(&self, fail: bool) {
        self.lock().fail_activation = fail;
    }

    /// Accept activations without switching the active account until
    /// [`complete_activation`](Self::complete_activation) runs.
    pub fn defer_activation(&self, defer: bool) {
        self.lock().defer_activation = defer;
    }

    /// Apply the last deferred activation. Returns whether there was one.
    pub fn complete_activation(&self) -> bool {
        let mut state = self.lock();
        match state.pending_activation.take() {
            Some(account) => {
                state.active = Some(account);
                true
            }
            None => false,
        }
    }

    pub fn activations(&self) -> Vec<WalletHandle> {
        self.lock().activations.clone()
    }

    pub fn set_simulation(&self, result: Result<u64, WalletError>) {
        self.lock().simulation = Some(result);
    }

    pub fn set_send_error(&self, error: Option<WalletError>) {
        self.lock().send_error = error;
    }

    pub fn set_receipt(&self, behaviour: ReceiptBehaviour) {
        self.lock().receipt = behaviour;
    }

    /// Receipts block until the returned handle is notified once per receipt.
    pub fn hold_receipts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().receipt_gate = Some(gate.clone());
        gate
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.lock().allowances.insert((token, owner, spender), amount);
    }

    /// Allowance reads fail with a connection error while set.
    pub fn fail_allowance_reads(&self, message: Option<&str>) {
        self.lock().allowance_error = message.map(str::to_string);
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.lock().balances.insert((token, owner), amount);
    }

    pub fn sent(&self) -> Vec<CallRequest> {
        self.lock().sent.clone()
    }

    pub fn allowance_reads(&self) -> usize {
        self.lock().allowance_reads
    }

    pub fn emit_block(&self, number: u64) {
        self.lock().block = number;
        let _ = self.blocks.send(number);
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn wallets(&self) -> Vec<WalletHandle> {
        self.lock().wallets.clone()
    }

    fn active_account(&self) -> Option<ActiveAccount> {
        self.lock().active
    }

    async fn connect(&self, kind: ConnectorKind) -> Result<WalletHandle, WalletError> {
        let mut state = self.lock();
        let byte = match kind {
            ConnectorKind::Injected => 0x1e,
            ConnectorKind::Embedded => 0xe8,
        };
        let handle = WalletHandle::new(Address::repeat_byte(byte), kind, self.chain_id);
        if !state.wallets.contains(&handle) {
            state.wallets.push(handle.clone());
        }
        Ok(handle)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        let mut state = self.lock();
        state.wallets.clear();
        state.active = None;
        Ok(())
    }

    async fn activate(&self, wallet: &WalletHandle) -> Result<(), WalletError> {
        let mut state = self.lock();
        state.activations.push(wallet.clone());
        if state.fail_activation {
            return Err(WalletError::Activation("user closed the prompt".into()));
        }
        let account = ActiveAccount {
            address: wallet.address,
            chain_id: wallet.chain_id(),
        };
        if state.defer_activation {
            state.pending_activation = Some(account);
        } else {
            state.active = Some(account);
        }
        Ok(())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        if let Some(active) = self.lock().active.as_mut() {
            active.chain_id = Some(chain_id);
        }
        Ok(())
    }

    fn subscribe_blocks(&self) -> broadcast::Receiver<u64> {
        self.blocks.subscribe()
    }
}

#[async_trait]
impl TransactionSigner for MockWallet {
    async fn simulate(&self, _call: &CallRequest) -> Result<u64, WalletError> {
        self.lock()
            .simulation
            .clone()
            .unwrap_or(Ok(DEFAULT_SIMULATED_GAS))
    }

    async fn send_transaction(&self, call: &CallRequest) -> Result<B256, WalletError> {
        let mut state = self.lock();
        if let Some(err) = state.send_error.clone() {
            return Err(err);
        }
        state.nonce += 1;
        let hash = B256::from(U256::from(state.nonce).to_be_bytes::<32>());
        state.sent.push(call.clone());

        let from = call.from.or(state.active.map(|a| a.address));
        if let (Some(owner), Ok(approve)) = (from, ERC20::approveCall::abi_decode(&call.data)) {
            state
                .pending_approvals
                .insert(hash, ((call.to, owner, approve.spender), approve.amount));
        }
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: B256) -> Result<TxReceiptSummary, WalletError> {
        let gate = self.lock().receipt_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut state = self.lock();
        let behaviour = state.receipt;
        state.block += 1;
        let block_number = Some(state.block);
        match behaviour {
            ReceiptBehaviour::Timeout => Err(WalletError::ReceiptTimeout(hash)),
            ReceiptBehaviour::Reverted => Ok(TxReceiptSummary {
                hash,
                block_number,
                success: false,
                gas_used: DEFAULT_SIMULATED_GAS,
            }),
            ReceiptBehaviour::Success => {
                if let Some((slot, amount)) = state.pending_approvals.remove(&hash) {
                    state.allowances.insert(slot, amount);
                }
                Ok(TxReceiptSummary {
                    hash,
                    block_number,
                    success: true,
                    gas_used: DEFAULT_SIMULATED_GAS,
                })
            }
        }
    }
}

#[async_trait]
impl TokenStateReader for MockWallet {
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AppError> {
        let mut state = self.lock();
        state.allowance_reads += 1;
        if let Some(msg) = &state.allowance_error {
            return Err(AppError::Connection(msg.clone()));
        }
        Ok(state
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, AppError> {
        Ok(self
            .lock()
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct MockRoutesState {
    amount_out: U256,
    price_impact: Option<f64>,
    fail: Option<String>,
    balances: Vec<TokenBalance>,
    route_calls: usize,
    quote_calls: usize,
    approval_calls: usize,
    route_slippages: Vec<u64>,
}

/// Routing API double. Routes always go through [`ROUTER`].
#[derive(Default)]
pub struct MockRoutes {
    state: Mutex<MockRoutesState>,
}

impl MockRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockRoutesState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_route_output(&self, amount_out: U256) {
        self.lock().amount_out = amount_out;
    }

    pub fn set_price_impact(&self, bps: Option<f64>) {
        self.lock().price_impact = bps;
    }

    pub fn fail_with(&self, message: Option<&str>) {
        self.lock().fail = message.map(str::to_string);
    }

    /// (token, amount, decimals, usd price)
    pub fn set_balances(&self, balances: Vec<(Address, U256, u8, Option<f64>)>) {
        self.lock().balances = balances
            .into_iter()
            .map(|(token, amount, decimals, price)| TokenBalance {
                amount,
                decimals,
                token,
                price,
            })
            .collect();
    }

    pub fn route_calls(&self) -> usize {
        self.lock().route_calls
    }

    pub fn quote_calls(&self) -> usize {
        self.lock().quote_calls
    }

    pub fn approval_calls(&self) -> usize {
        self.lock().approval_calls
    }

    /// Slippage sent with each route request, oldest first.
    pub fn route_slippages(&self) -> Vec<u64> {
        self.lock().route_slippages.clone()
    }
}

#[async_trait]
impl RouteSource for MockRoutes {
    async fn route(&self, params: &RouteParams) -> Result<RouteData, AppError> {
        let mut state = self.lock();
        state.route_calls += 1;
        state.route_slippages.push(params.slippage);
        if let Some(msg) = &state.fail {
            return Err(AppError::Api(msg.clone()));
        }
        Ok(RouteData {
            route: Vec::new(),
            gas: U256::from(180_000u64),
            amount_out: state.amount_out,
            price_impact: state.price_impact,
            created_at: None,
            tx: RouteTx {
                data: sample_call().data,
                to: ROUTER,
                from: params.from_address,
                value: U256::ZERO,
            },
            fee_amount: Vec::new(),
        })
    }

    async fn quote(&self, _params: &QuoteParams) -> Result<QuoteData, AppError> {
        let mut state = self.lock();
        state.quote_calls += 1;
        if let Some(msg) = &state.fail {
            return Err(AppError::Api(msg.clone()));
        }
        Ok(QuoteData {
            amount_out: state.amount_out,
            gas: U256::from(180_000u64),
            price_impact: state.price_impact,
        })
    }

    async fn approval(&self, params: &ApproveParams) -> Result<ApproveData, AppError> {
        let mut state = self.lock();
        state.approval_calls += 1;
        if let Some(msg) = &state.fail {
            return Err(AppError::Api(msg.clone()));
        }
        let amount: U256 = params
            .amount
            .parse()
            .map_err(|_| AppError::Api(format!("bad amount {}", params.amount)))?;
        Ok(ApproveData {
            amount,
            gas: U256::from(46_000u64),
            spender: ROUTER,
            token: params.token_address,
            tx: ApproveTx {
                data: approve_calldata(ROUTER, amount),
                from: params.from_address,
                to: params.token_address,
            },
        })
    }

    async fn balances(&self, _params: &BalanceParams) -> Result<Vec<TokenBalance>, AppError> {
        Ok(self.lock().balances.clone())
    }
}
