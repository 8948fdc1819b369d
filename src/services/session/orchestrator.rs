// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Composes route quote, allowance and the two transaction trackers into one
//! decision: log in, switch chain, approve, swap, or wait.
//!
//! Reads are two-phase. The quote comes first because it names the spender;
//! the allowance is only read against that spender. Every stored result is
//! tagged with the key it was fetched for and ignored once the key moves on.

use crate::common::constants::{GAS_BUFFER_BPS, NATIVE_TOKEN, PRICE_IMPACT_WARN_THRESHOLD_BPS};
use crate::common::error::AppError;
use crate::common::units::{exchange_rate, format_significant, normalize_value};
use crate::common::validation::{AllowanceKey, ExecutionVariant, RouteKey, SwapInput, ValidationError};
use crate::data::token_manager::TokenManager;
use crate::domain::types::{
    ActiveAccount, AllowanceRecord, ApprovalIntent, CallRequest, RouteQuote, TxKind,
};
use crate::network::routing::{ApproveParams, BalanceParams, QuoteParams, RouteParams, RouteSource};
use crate::network::wallet::{TokenStateReader, TransactionSigner};
use crate::services::session::allowance::{AllowanceGate, AllowanceWatch};
use crate::services::session::notify::Notifier;
use crate::services::session::tracker::{TransactionTracker, TxOutcome};
use alloy::primitives::{Address, U256};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

const FALLBACK_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    Invalid(ValidationError),
    AwaitingQuote,
    QuoteFailed(String),
    /// Quote-only variant: priced, nothing to execute.
    QuoteOnly,
    AwaitingAllowance,
    ApprovalPending,
    InsufficientBalance,
    SwapInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapAction {
    NeedsLogin,
    SwitchChain { required: u64 },
    Approve(ApprovalIntent),
    Swap,
    Blocked(BlockReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapDecision {
    pub action: SwapAction,
    pub wrong_chain: bool,
    pub approve_needed: bool,
    pub swap_enabled: bool,
    pub insufficient_balance: bool,
    pub high_price_impact: bool,
}

impl SwapDecision {
    fn blocked(action: SwapAction) -> Self {
        Self {
            action,
            wrong_chain: false,
            approve_needed: false,
            swap_enabled: false,
            insufficient_balance: false,
            high_price_impact: false,
        }
    }
}

/// Display values for a quote.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapPreview {
    pub amount_in: f64,
    pub amount_out: f64,
    pub amount_out_display: String,
    pub rate: f64,
    pub price_impact_pct: Option<f64>,
    pub gas: U256,
}

/// A holding reported by the balances endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub token: Address,
    pub symbol: String,
    pub amount: U256,
    pub decimals: u8,
    pub normalized: f64,
    pub value_usd: Option<f64>,
}

#[derive(Debug, Default)]
struct OrchestratorState {
    input: Option<SwapInput>,
    key: Option<Result<RouteKey, ValidationError>>,
    quote: Option<(RouteKey, RouteQuote)>,
    quote_error: Option<(RouteKey, String)>,
    /// Spender from the approve endpoint, for quotes without calldata.
    approval_spender: Option<(RouteKey, Address)>,
    allowance: Option<(AllowanceKey, U256)>,
    balance: Option<(RouteKey, U256)>,
}

impl OrchestratorState {
    fn current_key(&self) -> Option<&RouteKey> {
        self.key.as_ref().and_then(|k| k.as_ref().ok())
    }

    fn current_quote(&self) -> Option<&RouteQuote> {
        let key = self.current_key()?;
        self.quote
            .as_ref()
            .filter(|(k, _)| k == key)
            .map(|(_, q)| q)
    }

    /// The quoted transaction's target, else the approve endpoint's spender.
    fn current_spender(&self) -> Option<Address> {
        let key = self.current_key()?;
        self.current_quote()?.spender().or_else(|| {
            self.approval_spender
                .as_ref()
                .filter(|(k, _)| k == key)
                .map(|(_, spender)| *spender)
        })
    }

    /// Allowance key derived from the current route key and quote.
    fn allowance_key(&self) -> Option<AllowanceKey> {
        let key = self.current_key()?;
        if key.token_in == NATIVE_TOKEN {
            return None;
        }
        AllowanceKey::validate(key.from_address, self.current_spender(), Some(key.token_in)).ok()
    }

    fn current_allowance(&self) -> Option<U256> {
        let key = self.current_key()?;
        if key.token_in == NATIVE_TOKEN {
            return Some(U256::MAX);
        }
        let wanted = self.allowance_key()?;
        self.allowance
            .as_ref()
            .filter(|(k, _)| *k == wanted)
            .map(|(_, a)| *a)
    }

    fn current_balance(&self) -> Option<U256> {
        let key = self.current_key()?;
        self.balance
            .as_ref()
            .filter(|(k, _)| k == key)
            .map(|(_, b)| *b)
    }
}

pub struct SwapOrchestrator {
    routes: Arc<dyn RouteSource>,
    reader: Arc<dyn TokenStateReader>,
    gate: AllowanceGate,
    tokens: Arc<TokenManager>,
    approve: TransactionTracker,
    swap: TransactionTracker,
    notifier: Notifier,
    chain_id: u64,
    variant: ExecutionVariant,
    state: Mutex<OrchestratorState>,
}

impl SwapOrchestrator {
    pub fn new(
        routes: Arc<dyn RouteSource>,
        reader: Arc<dyn TokenStateReader>,
        signer: Arc<dyn TransactionSigner>,
        tokens: Arc<TokenManager>,
        notifier: Notifier,
        chain_id: u64,
        variant: ExecutionVariant,
    ) -> Self {
        Self {
            gate: AllowanceGate::new(reader.clone(), tokens.clone(), chain_id),
            approve: TransactionTracker::new(TxKind::Approve, "Approve", signer.clone(), notifier.clone()),
            swap: TransactionTracker::new(TxKind::Swap, "Swap", signer, notifier.clone()),
            routes,
            reader,
            tokens,
            notifier,
            chain_id,
            variant,
            state: Mutex::new(OrchestratorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn approve_tracker(&self) -> &TransactionTracker {
        &self.approve
    }

    pub fn swap_tracker(&self) -> &TransactionTracker {
        &self.swap
    }

    pub fn gate(&self) -> &AllowanceGate {
        &self.gate
    }

    /// New user input. A changed key drops every result fetched for the old
    /// one and resets both jobs.
    pub fn set_request(&self, input: SwapInput) -> Result<RouteKey, ValidationError> {
        let validated = RouteKey::validate(&input, self.variant);
        let changed = {
            let mut state = self.lock();
            let changed = state.key.as_ref() != Some(&validated);
            state.input = Some(input);
            if changed {
                state.key = Some(validated.clone());
                state.quote = None;
                state.quote_error = None;
                state.approval_spender = None;
                state.allowance = None;
                state.balance = None;
            }
            changed
        };
        if changed {
            if let Err(e) = &validated {
                tracing::debug!(target: "orchestrator", reason = %e, "route read disabled");
            }
            self.approve.prepare("Approve", None);
            self.swap.prepare("Swap", None);
        }
        validated
    }

    pub fn route_key(&self) -> Option<RouteKey> {
        self.lock().current_key().cloned()
    }

    pub fn quote(&self) -> Option<RouteQuote> {
        self.lock().current_quote().cloned()
    }

    /// Fetch a quote for `key`. Router variant asks for calldata; quote-only
    /// just prices.
    pub async fn load_quote(&self, key: &RouteKey) -> Result<RouteQuote, AppError> {
        match self.variant {
            ExecutionVariant::Router => {
                let params = RouteParams::for_key(key)
                    .ok_or_else(|| AppError::Api("route requires a sender address".into()))?;
                Ok(self.routes.route(&params).await?.into())
            }
            ExecutionVariant::QuoteOnly => Ok(self.routes.quote(&QuoteParams::for_key(key)).await?.into()),
        }
    }

    /// Store a quote if `key` is still current. Returns whether it was kept.
    pub fn apply_quote(&self, key: &RouteKey, result: Result<RouteQuote, String>) -> bool {
        let mut state = self.lock();
        if state.current_key() != Some(key) {
            tracing::debug!(target: "orchestrator", "stale quote discarded");
            return false;
        }
        match result {
            Ok(quote) => {
                state.quote = Some((key.clone(), quote));
                state.quote_error = None;
            }
            Err(e) => {
                state.quote = None;
                state.quote_error = Some((key.clone(), e));
            }
        }
        true
    }

    /// Store an allowance read if it matches the current (owner, spender, token).
    pub fn apply_allowance(&self, record: &AllowanceRecord) -> bool {
        let mut state = self.lock();
        let key = AllowanceKey {
            owner: record.owner,
            spender: record.spender,
            token: record.token,
        };
        if state.allowance_key() != Some(key) {
            return false;
        }
        state.allowance = Some((key, record.amount));
        drop(state);
        self.sync_jobs();
        true
    }

    /// Quote, then allowance and balance for the quoted spender.
    pub async fn refresh(&self) -> Result<(), AppError> {
        let Some(key) = self.route_key() else {
            return Ok(());
        };

        match self.load_quote(&key).await {
            Ok(quote) => {
                tracing::debug!(
                    target: "orchestrator",
                    amount_out = %quote.amount_out,
                    spender = ?quote.spender(),
                    "quote"
                );
                if !self.apply_quote(&key, Ok(quote)) {
                    return Ok(());
                }
            }
            Err(e) => {
                if self.apply_quote(&key, Err(e.to_string())) {
                    self.notifier.error(e.to_string());
                }
                return Err(e);
            }
        }

        // A failed read leaves the allowance unknown, which already blocks.
        let allowance = match self.refresh_spender(&key).await {
            Ok(()) => self.refresh_allowance().await,
            Err(e) => Err(e),
        };
        if let Err(e) = allowance {
            tracing::warn!(target: "allowance", error = %e, "allowance read failed");
            self.notifier.error(e.to_string());
        }
        self.refresh_balance(&key).await;
        self.sync_jobs();
        Ok(())
    }

    /// Quotes without calldata name no spender; ask the approve endpoint once
    /// per key instead.
    async fn refresh_spender(&self, key: &RouteKey) -> Result<(), AppError> {
        let needed = {
            let state = self.lock();
            key.token_in != NATIVE_TOKEN
                && state.current_quote().is_some_and(|q| q.spender().is_none())
                && state.approval_spender.as_ref().is_none_or(|(k, _)| k != key)
        };
        let Some(params) = ApproveParams::for_key(key).filter(|_| needed) else {
            return Ok(());
        };
        let data = self.routes.approval(&params).await?;
        tracing::debug!(
            target: "orchestrator",
            spender = %format!("{:#x}", data.spender),
            "spender from approve endpoint"
        );
        let mut state = self.lock();
        if state.current_key() == Some(key) {
            state.approval_spender = Some((key.clone(), data.spender));
        }
        Ok(())
    }

    /// Re-read the allowance for the current key, if there is one.
    pub async fn refresh_allowance(&self) -> Result<(), AppError> {
        let Some(key) = self.lock().allowance_key() else {
            return Ok(());
        };
        let amount = self.gate.current_allowance(&key).await?;
        self.apply_allowance(&AllowanceRecord {
            owner: key.owner,
            spender: key.spender,
            token: key.token,
            amount,
        });
        Ok(())
    }

    async fn refresh_balance(&self, key: &RouteKey) {
        let Some(owner) = key.from_address else {
            return;
        };
        if key.token_in == NATIVE_TOKEN {
            return;
        }
        match self.reader.balance_of(key.token_in, owner).await {
            Ok(balance) => {
                let mut state = self.lock();
                if state.current_key() == Some(key) {
                    state.balance = Some((key.clone(), balance));
                }
            }
            Err(e) => tracing::debug!(target: "orchestrator", error = %e, "balance read failed"),
        }
    }

    /// Allowance subscription for the current key. Feed its records back
    /// through [`apply_allowance`](Self::apply_allowance).
    pub fn allowance_watch(&self, blocks: broadcast::Receiver<u64>) -> Option<AllowanceWatch> {
        let key = self.lock().allowance_key()?;
        Some(self.gate.watch(key, blocks))
    }

    /// Wait for the next allowance read from `watch` and apply it. `None` when
    /// the block feed is closed.
    pub async fn next_block_update(&self, watch: &mut AllowanceWatch) -> Option<BlockUpdate> {
        let record = watch.next().await?;
        Some(match record {
            Ok(record) => {
                if self.apply_allowance(&record) {
                    BlockUpdate::Allowance(record.amount)
                } else {
                    BlockUpdate::Stale
                }
            }
            Err(e) => {
                tracing::warn!(target: "allowance", error = %e, "allowance re-read failed");
                BlockUpdate::ReadFailed
            }
        })
    }

    fn approval_intent(&self, state: &OrchestratorState) -> Option<ApprovalIntent> {
        let key = state.current_key()?;
        let allowance_key = state.allowance_key()?;
        let current = state.current_allowance()?;
        self.gate.intent_if_short(&allowance_key, current, key.amount_in)
    }

    /// Point both trackers at the calls the current state implies.
    fn sync_jobs(&self) {
        let (approve, swap) = {
            let state = self.lock();
            let from = state.current_key().and_then(|k| k.from_address);
            let approve = match (self.approval_intent(&state), from) {
                (Some(intent), Some(from)) => {
                    let call = self.gate.approval_call(&intent, from);
                    Some((intent.title, call))
                }
                _ => None,
            };
            let swap = state
                .current_key()
                .zip(state.current_quote())
                .and_then(|(key, quote)| {
                    let tx = quote.tx.as_ref()?;
                    Some((
                        self.swap_description(key),
                        CallRequest {
                            from: Some(tx.from),
                            to: tx.to,
                            data: tx.data.clone(),
                            value: tx.value,
                            chain_id: key.chain_id,
                            gas: padded_gas(quote.gas),
                        },
                    ))
                });
            (approve, swap)
        };
        // A job waiting on the wallet or the chain keeps its call until it
        // settles. A finished dry run does not count.
        if !self.approve.is_loading() {
            match approve {
                Some((title, call)) => self.approve.prepare(title, Some(call)),
                // Leave a finished approval alone so its status stays visible.
                None if !self.approve.status().is_terminal() => self.approve.prepare("Approve", None),
                None => {}
            }
        }
        if !self.swap.is_loading() {
            match swap {
                Some((description, call)) => self.swap.prepare(description, Some(call)),
                None => self.swap.prepare("Swap", None),
            }
        }
    }

    fn swap_description(&self, key: &RouteKey) -> String {
        let decimals = self.decimals(key.token_in);
        format!(
            "Swap {} {} for {}",
            format_significant(normalize_value(key.amount_in, decimals), 6),
            self.tokens.symbol(self.chain_id, key.token_in),
            self.tokens.symbol(self.chain_id, key.token_out)
        )
    }

    fn decimals(&self, token: Address) -> u8 {
        self.tokens
            .decimals(self.chain_id, token)
            .unwrap_or(FALLBACK_DECIMALS)
    }

    pub fn decision(&self, account: Option<&ActiveAccount>) -> SwapDecision {
        let state = self.lock();
        let Some(account) = account else {
            return SwapDecision::blocked(SwapAction::NeedsLogin);
        };

        let required_chain = state
            .current_key()
            .map(|k| k.chain_id)
            .or_else(|| state.input.as_ref().map(|i| i.chain_id))
            .unwrap_or(self.chain_id);
        let wrong_chain = account.chain_id.is_some_and(|c| c != required_chain);
        if wrong_chain {
            let mut decision = SwapDecision::blocked(SwapAction::SwitchChain {
                required: required_chain,
            });
            decision.wrong_chain = true;
            return decision;
        }

        let key = match &state.key {
            Some(Ok(key)) => key,
            Some(Err(e)) => return SwapDecision::blocked(SwapAction::Blocked(BlockReason::Invalid(e.clone()))),
            None => {
                return SwapDecision::blocked(SwapAction::Blocked(BlockReason::Invalid(
                    ValidationError::Missing("swap input"),
                )));
            }
        };
        let Some(quote) = state.current_quote() else {
            let reason = match &state.quote_error {
                Some((k, e)) if k == key => BlockReason::QuoteFailed(e.clone()),
                _ => BlockReason::AwaitingQuote,
            };
            return SwapDecision::blocked(SwapAction::Blocked(reason));
        };

        let high_price_impact = quote
            .price_impact_bps
            .is_some_and(|bps| bps >= PRICE_IMPACT_WARN_THRESHOLD_BPS);
        let insufficient_balance = state
            .current_balance()
            .is_some_and(|balance| balance < key.amount_in);
        let intent = self.approval_intent(&state);
        let approve_needed = intent.is_some() && !key.amount_in.is_zero();
        let approval_pending = self.approve.is_loading();
        let allowance_known = state.current_allowance().is_some();

        let executable = self.variant == ExecutionVariant::Router && quote.tx.is_some();

        // Approval is still offered without calldata; only the swap needs it.
        let action = if insufficient_balance {
            SwapAction::Blocked(BlockReason::InsufficientBalance)
        } else if approval_pending {
            SwapAction::Blocked(BlockReason::ApprovalPending)
        } else if let Some(intent) = intent.filter(|_| approve_needed) {
            SwapAction::Approve(intent)
        } else if !executable {
            SwapAction::Blocked(BlockReason::QuoteOnly)
        } else if !allowance_known {
            SwapAction::Blocked(BlockReason::AwaitingAllowance)
        } else if self.swap.is_loading() {
            SwapAction::Blocked(BlockReason::SwapInFlight)
        } else {
            SwapAction::Swap
        };
        let swap_enabled = action == SwapAction::Swap;

        SwapDecision {
            action,
            wrong_chain,
            approve_needed,
            swap_enabled,
            insufficient_balance,
            high_price_impact,
        }
    }

    pub fn preview(&self) -> Option<SwapPreview> {
        let state = self.lock();
        let key = state.current_key()?;
        let quote = state.current_quote()?;
        let amount_in = normalize_value(key.amount_in, self.decimals(key.token_in));
        let out_decimals = self.decimals(key.token_out);
        let amount_out = normalize_value(quote.amount_out, out_decimals);
        Some(SwapPreview {
            amount_in,
            amount_out,
            amount_out_display: format_significant(amount_out, 6),
            rate: exchange_rate(quote.amount_out, out_decimals, amount_in),
            price_impact_pct: quote.price_impact_bps.map(|bps| bps / 100.0),
            gas: quote.gas,
        })
    }

    /// Send the pending approval. The allowance is re-read once it confirms.
    pub async fn approve(&self, account: Option<&ActiveAccount>) -> TxOutcome {
        match self.decision(account).action {
            SwapAction::Approve(_) => {}
            other => {
                tracing::debug!(target: "orchestrator", action = ?other, "approve not applicable");
                return TxOutcome::Skipped;
            }
        }
        self.sync_jobs();
        let outcome = self.approve.write().await;
        if matches!(outcome, TxOutcome::Confirmed(_))
            && let Err(e) = self.refresh_allowance().await
        {
            tracing::warn!(target: "orchestrator", error = %e, "allowance re-read after approval failed");
        }
        outcome
    }

    /// Re-simulate the routed transaction and send it.
    pub async fn swap(&self, account: Option<&ActiveAccount>) -> TxOutcome {
        let decision = self.decision(account);
        if decision.action != SwapAction::Swap {
            tracing::debug!(target: "orchestrator", action = ?decision.action, "swap not ready");
            return TxOutcome::Skipped;
        }
        if decision.high_price_impact {
            self.notifier.warning("High price impact on this route");
        }
        self.sync_jobs();
        if self.swap.simulate().await.is_none()
            && let Some(reason) = self.swap.estimate_error()
        {
            self.notifier.warning(format!("Simulation failed: {reason}"));
        }
        self.swap.write().await
    }

    /// Holdings of `owner` as reported by the routing API. Token metadata is
    /// remembered for later display.
    pub async fn positions(&self, owner: Address, use_eoa: bool) -> Result<Vec<Position>, AppError> {
        let balances = self
            .routes
            .balances(&BalanceParams {
                chain_id: self.chain_id,
                eoa_address: owner,
                use_eoa,
            })
            .await?;
        let mut positions: Vec<Position> = balances
            .into_iter()
            .filter(|b| !b.amount.is_zero())
            .map(|b| {
                let symbol = self.tokens.symbol(self.chain_id, b.token);
                self.tokens.register(self.chain_id, b.token, &symbol, b.decimals);
                let normalized = normalize_value(b.amount, b.decimals);
                Position {
                    token: b.token,
                    symbol,
                    amount: b.amount,
                    decimals: b.decimals,
                    normalized,
                    value_usd: b.price.map(|p| p * normalized),
                }
            })
            .collect();
        positions.sort_by(|a, b| {
            b.value_usd
                .unwrap_or(0.0)
                .total_cmp(&a.value_usd.unwrap_or(0.0))
        });
        Ok(positions)
    }
}

/// Routing API gas figure with the signing buffer; `None` when the API gave none.
fn padded_gas(gas: U256) -> Option<u64> {
    u64::try_from(gas)
        .ok()
        .filter(|g| *g > 0)
        .map(|g| g.saturating_mul(GAS_BUFFER_BPS) / 10_000)
}

/// What a block-driven re-read changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockUpdate {
    Allowance(U256),
    /// Read for a key that is no longer current.
    Stale,
    ReadFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::{APPROVE_GAS_LIMIT, USDC_BASE};
    use crate::domain::types::TxStatus;
    use crate::services::session::notify::{Notification, Severity};
    use crate::services::session::tracker::Submit;
    use crate::test_support::{MockRoutes, MockWallet, ROUTER};
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;

    const DEGEN: &str = "0x4ed4e862860bed51a9570b96d89af5e1b0efefed";

    fn owner() -> Address {
        Address::repeat_byte(0x0a)
    }

    fn account() -> ActiveAccount {
        ActiveAccount {
            address: owner(),
            chain_id: Some(8453),
        }
    }

    fn input(amount: u64) -> SwapInput {
        SwapInput {
            token_in: format!("{USDC_BASE:#x}"),
            token_out: DEGEN.to_string(),
            amount_in: U256::from(amount),
            chain_id: 8453,
            slippage_bps: 25,
            from_address: Some(owner()),
        }
    }

    fn build(
        variant: ExecutionVariant,
        notifier: Notifier,
    ) -> (Arc<MockWallet>, Arc<MockRoutes>, SwapOrchestrator) {
        let wallet = Arc::new(MockWallet::new(8453));
        let routes = Arc::new(MockRoutes::new());
        routes.set_route_output(U256::from(500_000_000_000_000_000u64));
        let orchestrator = SwapOrchestrator::new(
            routes.clone(),
            wallet.clone(),
            wallet.clone(),
            Arc::new(TokenManager::with_defaults()),
            notifier,
            8453,
            variant,
        );
        (wallet, routes, orchestrator)
    }

    fn setup() -> (Arc<MockWallet>, Arc<MockRoutes>, SwapOrchestrator) {
        build(ExecutionVariant::Router, Notifier::silent())
    }

    fn severities(notes: &mut UnboundedReceiver<Notification>) -> Vec<Severity> {
        let mut out = Vec::new();
        while let Ok(n) = notes.try_recv() {
            out.push(n.severity);
        }
        out
    }

    #[tokio::test]
    async fn same_token_never_fetches_a_route() {
        let (_, routes, orch) = setup();
        let mut same = input(10);
        same.token_out = same.token_in.clone();
        assert_eq!(orch.set_request(same), Err(ValidationError::SameToken));
        orch.refresh().await.unwrap();
        assert_eq!(routes.route_calls(), 0);
        let decision = orch.decision(Some(&account()));
        assert!(!decision.swap_enabled);
        assert!(!decision.approve_needed);
        assert_eq!(
            decision.action,
            SwapAction::Blocked(BlockReason::Invalid(ValidationError::SameToken))
        );
    }

    #[tokio::test]
    async fn zero_allowance_needs_approval() {
        let (wallet, _, orch) = setup();
        wallet.set_balance(USDC_BASE, owner(), U256::from(50_000_000u64));
        orch.set_request(input(1_000_000)).unwrap();
        orch.refresh().await.unwrap();

        let decision = orch.decision(Some(&account()));
        assert!(decision.approve_needed);
        assert!(!decision.swap_enabled);
        let SwapAction::Approve(intent) = decision.action else {
            panic!("expected approval");
        };
        assert_eq!(intent.amount, U256::from(1_000_000u64));
        assert_eq!(intent.spender, ROUTER);
    }

    #[tokio::test]
    async fn wrong_chain_supersedes_approval() {
        let (_, _, orch) = setup();
        orch.set_request(input(1_000_000)).unwrap();
        orch.refresh().await.unwrap();
        let elsewhere = ActiveAccount {
            address: owner(),
            chain_id: Some(1),
        };
        let decision = orch.decision(Some(&elsewhere));
        assert!(decision.wrong_chain);
        assert!(!decision.approve_needed);
        assert_eq!(decision.action, SwapAction::SwitchChain { required: 8453 });
    }

    #[tokio::test]
    async fn no_account_needs_login() {
        let (_, _, orch) = setup();
        orch.set_request(input(1)).unwrap();
        assert_eq!(orch.decision(None).action, SwapAction::NeedsLogin);
    }

    #[tokio::test]
    async fn sufficient_allowance_enables_swap_and_preview() {
        let (wallet, _, orch) = setup();
        wallet.set_allowance(USDC_BASE, owner(), ROUTER, U256::MAX);
        wallet.set_balance(USDC_BASE, owner(), U256::from(10_000_000u64));
        orch.set_request(input(10_000_000)).unwrap();
        orch.refresh().await.unwrap();

        let decision = orch.decision(Some(&account()));
        assert_eq!(decision.action, SwapAction::Swap);
        assert!(decision.swap_enabled);

        let preview = orch.preview().unwrap();
        assert_eq!(preview.amount_out_display, "0.5");
        assert!((preview.rate - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn stale_quote_is_discarded() {
        let (_, _, orch) = setup();
        let old = orch.set_request(input(1_000_000)).unwrap();
        orch.set_request(input(2_000_000)).unwrap();
        let quote = RouteQuote {
            amount_out: U256::from(1u64),
            gas: U256::ZERO,
            price_impact_bps: None,
            tx: None,
        };
        assert!(!orch.apply_quote(&old, Ok(quote)));
        assert!(orch.quote().is_none());
    }

    #[tokio::test]
    async fn failed_quote_blocks_with_reason() {
        let (_, routes, orch) = setup();
        routes.fail_with(Some("Invalid token"));
        orch.set_request(input(1_000_000)).unwrap();
        assert!(orch.refresh().await.is_err());
        assert!(matches!(
            orch.decision(Some(&account())).action,
            SwapAction::Blocked(BlockReason::QuoteFailed(_))
        ));
    }

    #[tokio::test]
    async fn insufficient_balance_and_price_impact_flags() {
        let (wallet, routes, orch) = setup();
        routes.set_price_impact(Some(150.0));
        wallet.set_allowance(USDC_BASE, owner(), ROUTER, U256::MAX);
        wallet.set_balance(USDC_BASE, owner(), U256::from(5u64));
        orch.set_request(input(1_000_000)).unwrap();
        orch.refresh().await.unwrap();

        let decision = orch.decision(Some(&account()));
        assert!(decision.insufficient_balance);
        assert!(decision.high_price_impact);
        assert_eq!(
            decision.action,
            SwapAction::Blocked(BlockReason::InsufficientBalance)
        );
    }

    #[tokio::test]
    async fn positions_are_sorted_by_value() {
        let (_, routes, orch) = setup();
        routes.set_balances(vec![
            (USDC_BASE, U256::from(5_000_000u64), 6, Some(1.0)),
            (Address::repeat_byte(0x44), U256::from(2u64) * U256::from(10u64).pow(U256::from(18u64)), 18, Some(10.0)),
            (Address::repeat_byte(0x55), U256::ZERO, 18, Some(1.0)),
        ]);
        let positions = orch.positions(owner(), true).await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].token, Address::repeat_byte(0x44));
        assert_eq!(positions[0].value_usd, Some(20.0));
        assert_eq!(positions[1].symbol, "USDC");
    }

    #[tokio::test]
    async fn allowance_reread_while_approval_pending_keeps_tracking() {
        let (notifier, mut notes) = Notifier::channel();
        let (wallet, _, orch) = build(ExecutionVariant::Router, notifier);
        wallet.set_balance(USDC_BASE, owner(), U256::from(10_000_000u64));
        orch.set_request(input(10_000_000)).unwrap();
        orch.refresh().await.unwrap();
        let gate = wallet.hold_receipts();

        let Submit::Sent(submission) = orch.approve_tracker().submit().await else {
            panic!("expected the approval to be sent");
        };
        assert_eq!(orch.approve_tracker().status(), TxStatus::Pending);

        // Pending-block reads see the approval before its receipt is polled.
        assert!(orch.apply_allowance(&AllowanceRecord {
            owner: owner(),
            spender: ROUTER,
            token: USDC_BASE,
            amount: U256::from(10_000_000u64),
        }));
        assert_eq!(orch.approve_tracker().status(), TxStatus::Pending);
        assert_eq!(
            orch.decision(Some(&account())).action,
            SwapAction::Blocked(BlockReason::ApprovalPending)
        );

        gate.notify_one();
        assert!(matches!(
            orch.approve_tracker().await_confirmation(submission).await,
            TxOutcome::Confirmed(_)
        ));
        assert_eq!(orch.approve_tracker().status(), TxStatus::Confirmed);
        assert_eq!(severities(&mut notes), vec![Severity::Info, Severity::Success]);
        assert_eq!(orch.decision(Some(&account())).action, SwapAction::Swap);
    }

    #[tokio::test]
    async fn slippage_change_refetches_with_new_value() {
        let (_, routes, orch) = setup();
        let mut request = input(1_000_000);
        request.slippage_bps = 3_000;
        orch.set_request(request.clone()).unwrap();
        orch.refresh().await.unwrap();

        request.slippage_bps = 500;
        orch.set_request(request.clone()).unwrap();
        assert!(orch.quote().is_none());
        orch.refresh().await.unwrap();
        assert_eq!(routes.route_slippages(), vec![3_000, 500]);

        request.slippage_bps = 10_001;
        assert_eq!(
            orch.set_request(request),
            Err(ValidationError::SlippageOutOfRange(10_001))
        );
    }

    #[tokio::test]
    async fn prepared_calls_carry_gas_hints() {
        let (wallet, _, orch) = setup();
        wallet.set_balance(USDC_BASE, owner(), U256::from(10_000_000u64));
        orch.set_request(input(1_000_000)).unwrap();
        orch.refresh().await.unwrap();

        let approve = orch.approve_tracker().job().call.expect("approve call");
        assert_eq!(approve.gas, Some(APPROVE_GAS_LIMIT));
        // 180k from the routing API, padded by half.
        let swap = orch.swap_tracker().job().call.expect("swap call");
        assert_eq!(swap.gas, Some(270_000));
    }

    #[tokio::test]
    async fn quote_only_variant_prices_without_executing() {
        let (_, routes, orch) = build(ExecutionVariant::QuoteOnly, Notifier::silent());
        let mut anon = input(1_000_000);
        anon.from_address = None;
        orch.set_request(anon).unwrap();
        orch.refresh().await.unwrap();

        assert_eq!(routes.quote_calls(), 1);
        assert_eq!(routes.route_calls(), 0);
        assert_eq!(routes.approval_calls(), 0);
        let quote = orch.quote().expect("quote stored");
        assert!(quote.tx.is_none());
        assert!(orch.preview().is_some());

        let decision = orch.decision(Some(&account()));
        assert_eq!(decision.action, SwapAction::Blocked(BlockReason::QuoteOnly));
        assert!(!decision.swap_enabled);
        assert!(orch.swap_tracker().job().call.is_none());
    }

    #[tokio::test]
    async fn quote_only_variant_takes_spender_from_approve_endpoint() {
        let (wallet, routes, orch) = build(ExecutionVariant::QuoteOnly, Notifier::silent());
        wallet.set_balance(USDC_BASE, owner(), U256::from(10_000_000u64));
        orch.set_request(input(1_000_000)).unwrap();
        orch.refresh().await.unwrap();

        assert_eq!(routes.approval_calls(), 1);
        let SwapAction::Approve(intent) = orch.decision(Some(&account())).action else {
            panic!("expected approval");
        };
        assert_eq!(intent.spender, ROUTER);

        wallet.set_allowance(USDC_BASE, owner(), ROUTER, U256::MAX);
        orch.refresh().await.unwrap();
        assert_eq!(routes.approval_calls(), 1);
        assert_eq!(
            orch.decision(Some(&account())).action,
            SwapAction::Blocked(BlockReason::QuoteOnly)
        );
    }

    #[tokio::test]
    async fn failed_allowance_read_notifies_once_and_blocks() {
        let (notifier, mut notes) = Notifier::channel();
        let (wallet, _, orch) = build(ExecutionVariant::Router, notifier);
        wallet.set_balance(USDC_BASE, owner(), U256::from(10_000_000u64));
        wallet.fail_allowance_reads(Some("connection refused"));
        orch.set_request(input(1_000_000)).unwrap();

        orch.refresh().await.unwrap();
        assert_eq!(severities(&mut notes), vec![Severity::Error]);
        let decision = orch.decision(Some(&account()));
        assert_eq!(decision.action, SwapAction::Blocked(BlockReason::AwaitingAllowance));
        assert!(!decision.approve_needed);

        wallet.fail_allowance_reads(None);
        orch.refresh().await.unwrap();
        assert!(severities(&mut notes).is_empty());
        assert!(orch.decision(Some(&account())).approve_needed);
    }
}
