// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Lifecycle of one user-initiated write.
//!
//! `Idle -> Simulating -> AwaitingSignature -> Pending -> {Confirmed | Failed}`
//!
//! Every transition goes through [`TxStatus::can_transition_to`]. A generation
//! counter is bumped on reset and on each new submission; async results that
//! come back under an older generation are dropped without touching state or
//! notifying. The broadcast transaction itself is never cancelled.

use crate::common::error::WalletError;
use crate::domain::types::{CallRequest, TransactionJob, TxKind, TxReceiptSummary, TxStatus};
use crate::network::wallet::TransactionSigner;
use crate::services::session::notify::Notifier;
use alloy::primitives::B256;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Handle to a broadcast transaction under a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub generation: u64,
    pub hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submit {
    /// Call incomplete or a signature prompt already open.
    Skipped,
    Sent(Submission),
    Failed(WalletError),
    /// Reset while the wallet was signing.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Skipped,
    Confirmed(TxReceiptSummary),
    Failed(WalletError),
    Superseded,
}

#[derive(Debug)]
struct TrackerState {
    job: TransactionJob,
    generation: u64,
    estimate: Option<u64>,
    estimate_error: Option<String>,
}

#[derive(Clone)]
pub struct TransactionTracker {
    signer: Arc<dyn TransactionSigner>,
    notifier: Notifier,
    state: Arc<Mutex<TrackerState>>,
    status_tx: Arc<watch::Sender<TxStatus>>,
}

impl TransactionTracker {
    pub fn new(
        kind: TxKind,
        description: impl Into<String>,
        signer: Arc<dyn TransactionSigner>,
        notifier: Notifier,
    ) -> Self {
        let (status_tx, _) = watch::channel(TxStatus::Idle);
        Self {
            signer,
            notifier,
            state: Arc::new(Mutex::new(TrackerState {
                job: TransactionJob::new(kind, description),
                generation: 0,
                estimate: None,
                estimate_error: None,
            })),
            status_tx: Arc::new(status_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies `next` if the lifecycle allows it.
    fn transition(&self, state: &mut TrackerState, next: TxStatus) -> bool {
        let current = state.job.status;
        if !current.can_transition_to(next) {
            tracing::warn!(
                target: "tracker",
                kind = %state.job.kind,
                from = %current,
                to = %next,
                "illegal transition ignored"
            );
            return false;
        }
        state.job.status = next;
        if next == TxStatus::Idle {
            state.job.hash = None;
        }
        self.status_tx.send_replace(next);
        tracing::debug!(target: "tracker", kind = %state.job.kind, from = %current, to = %next);
        true
    }

    pub fn status(&self) -> TxStatus {
        self.lock().job.status
    }

    pub fn is_loading(&self) -> bool {
        self.status().is_loading()
    }

    pub fn job(&self) -> TransactionJob {
        self.lock().job.clone()
    }

    pub fn estimate(&self) -> Option<u64> {
        self.lock().estimate
    }

    /// Advisory; a failed dry run never blocks sending.
    pub fn estimate_error(&self) -> Option<String> {
        self.lock().estimate_error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TxStatus> {
        self.status_tx.subscribe()
    }

    /// Point the job at new inputs. Unchanged inputs leave it alone; anything
    /// else resets it and drops tracking of whatever was in flight.
    pub fn prepare(&self, description: impl Into<String>, call: Option<CallRequest>) {
        let description = description.into();
        let mut state = self.lock();
        if state.job.call == call && state.job.description == description {
            return;
        }
        state.job.call = call;
        state.job.description = description;
        Self::clear(&mut state);
        self.transition(&mut state, TxStatus::Idle);
    }

    pub fn reset(&self) {
        let mut state = self.lock();
        Self::clear(&mut state);
        self.transition(&mut state, TxStatus::Idle);
    }

    fn clear(state: &mut TrackerState) {
        state.generation += 1;
        state.estimate = None;
        state.estimate_error = None;
    }

    /// Dry-run the prepared call. Returns the gas estimate when it succeeded.
    pub async fn simulate(&self) -> Option<u64> {
        let (call, generation) = {
            let mut state = self.lock();
            let call = state.job.call.clone().filter(CallRequest::is_complete)?;
            if state.job.status != TxStatus::Simulating
                && !self.transition(&mut state, TxStatus::Simulating)
            {
                return None;
            }
            (call, state.generation)
        };

        let result = self.signer.simulate(&call).await;

        let mut state = self.lock();
        if state.generation != generation {
            return None;
        }
        match result {
            Ok(gas) => {
                state.estimate = Some(gas);
                state.estimate_error = None;
                Some(gas)
            }
            Err(e) => {
                tracing::warn!(target: "tracker", kind = %state.job.kind, error = %e, "simulation failed");
                state.estimate = None;
                state.estimate_error = Some(e.short_message());
                None
            }
        }
    }

    /// Ask the signer to sign and broadcast the prepared call.
    pub async fn submit(&self) -> Submit {
        let (call, generation, kind) = {
            let mut state = self.lock();
            let Some(call) = state.job.call.clone().filter(CallRequest::is_complete) else {
                return Submit::Skipped;
            };
            match state.job.status {
                TxStatus::AwaitingSignature => {
                    tracing::warn!(target: "tracker", kind = %state.job.kind, "signature prompt already open");
                    return Submit::Skipped;
                }
                TxStatus::Pending => {
                    tracing::warn!(
                        target: "tracker",
                        kind = %state.job.kind,
                        previous = ?state.job.hash,
                        "new submission while pending; previous tx no longer tracked"
                    );
                }
                _ => {}
            }
            state.generation += 1;
            if !self.transition(&mut state, TxStatus::AwaitingSignature) {
                return Submit::Skipped;
            }
            (call, state.generation, state.job.kind)
        };

        let result = self.signer.send_transaction(&call).await;

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(target: "tracker", %kind, "signing result superseded");
            return Submit::Superseded;
        }
        match result {
            Ok(hash) => {
                state.job.hash = Some(hash);
                self.transition(&mut state, TxStatus::Pending);
                let description = state.job.description.clone();
                drop(state);
                tracing::info!(target: "tracker", %kind, tx_hash = %format!("{:#x}", hash), "pending");
                self.notifier
                    .info(format!("{description}: waiting for confirmation"));
                Submit::Sent(Submission { generation, hash })
            }
            Err(e) => {
                self.transition(&mut state, TxStatus::Failed);
                drop(state);
                self.notifier.error(e.short_message());
                Submit::Failed(e)
            }
        }
    }

    /// Wait for the receipt of a submission made by this tracker.
    pub async fn await_confirmation(&self, submission: Submission) -> TxOutcome {
        if self.lock().generation != submission.generation {
            return TxOutcome::Superseded;
        }

        let result = self.signer.wait_for_receipt(submission.hash).await;

        let mut state = self.lock();
        if state.generation != submission.generation || state.job.hash != Some(submission.hash) {
            tracing::debug!(target: "tracker", kind = %state.job.kind, "receipt superseded");
            return TxOutcome::Superseded;
        }
        let kind = state.job.kind;
        let receipt = match result {
            Ok(receipt) if receipt.success => receipt,
            Ok(receipt) => {
                let err = WalletError::ReceiptReverted(receipt.hash);
                self.transition(&mut state, TxStatus::Failed);
                drop(state);
                self.notifier.error(err.short_message());
                return TxOutcome::Failed(err);
            }
            Err(e) => {
                self.transition(&mut state, TxStatus::Failed);
                drop(state);
                self.notifier.error(e.short_message());
                return TxOutcome::Failed(e);
            }
        };
        self.transition(&mut state, TxStatus::Confirmed);
        let description = state.job.description.clone();
        drop(state);
        tracing::info!(
            target: "tracker",
            %kind,
            tx_hash = %format!("{:#x}", receipt.hash),
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "confirmed"
        );
        self.notifier.success(description);
        TxOutcome::Confirmed(receipt)
    }

    /// Submit and wait for the receipt.
    pub async fn write(&self) -> TxOutcome {
        match self.submit().await {
            Submit::Sent(submission) => self.await_confirmation(submission).await,
            Submit::Skipped => TxOutcome::Skipped,
            Submit::Failed(e) => TxOutcome::Failed(e),
            Submit::Superseded => TxOutcome::Superseded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::notify::{Notification, Severity};
    use crate::test_support::{MockWallet, ReceiptBehaviour, sample_call};
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn tracker(wallet: &Arc<MockWallet>) -> (TransactionTracker, UnboundedReceiver<Notification>) {
        let (notifier, rx) = Notifier::channel();
        let tracker = TransactionTracker::new(TxKind::Swap, "Swap", wallet.clone(), notifier);
        (tracker, rx)
    }

    #[tokio::test]
    async fn happy_path_confirms_with_hash() {
        let wallet = Arc::new(MockWallet::new(8453));
        let (tracker, mut rx) = tracker(&wallet);
        tracker.prepare("Swapped 10 USDC", Some(sample_call()));

        assert_eq!(tracker.simulate().await, Some(21_000));
        assert_eq!(tracker.status(), TxStatus::Simulating);

        let outcome = tracker.write().await;
        assert!(matches!(outcome, TxOutcome::Confirmed(_)));
        let job = tracker.job();
        assert_eq!(job.status, TxStatus::Confirmed);
        assert!(job.hash.is_some());
        assert!(!tracker.is_loading());

        assert_eq!(rx.try_recv().unwrap().severity, Severity::Info);
        let done = rx.try_recv().unwrap();
        assert_eq!(done.severity, Severity::Success);
        assert_eq!(done.message, "Swapped 10 USDC");
    }

    #[tokio::test]
    async fn rejection_fails_with_one_error() {
        let wallet = Arc::new(MockWallet::new(8453));
        wallet.set_send_error(Some(WalletError::Rejected("User rejected the request.".into())));
        let (tracker, mut rx) = tracker(&wallet);
        tracker.prepare("Swap", Some(sample_call()));

        let outcome = tracker.write().await;
        assert!(matches!(outcome, TxOutcome::Failed(ref e) if e.is_user_rejection()));
        assert_eq!(tracker.status(), TxStatus::Failed);
        assert!(!tracker.is_loading());
        assert!(tracker.job().hash.is_none());

        let note = rx.try_recv().unwrap();
        assert_eq!(note.severity, Severity::Error);
        assert_eq!(note.message, "User rejected the request.");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reverted_receipt_fails() {
        let wallet = Arc::new(MockWallet::new(8453));
        wallet.set_receipt(ReceiptBehaviour::Reverted);
        let (tracker, mut rx) = tracker(&wallet);
        tracker.prepare("Swap", Some(sample_call()));

        assert!(matches!(
            tracker.write().await,
            TxOutcome::Failed(WalletError::ReceiptReverted(_))
        ));
        let _pending = rx.try_recv().unwrap();
        assert_eq!(rx.try_recv().unwrap().severity, Severity::Error);
    }

    #[tokio::test]
    async fn receipt_timeout_fails_but_keeps_hash() {
        let wallet = Arc::new(MockWallet::new(8453));
        wallet.set_receipt(ReceiptBehaviour::Timeout);
        let (tracker, mut rx) = tracker(&wallet);
        tracker.prepare("Swap", Some(sample_call()));

        let outcome = tracker.write().await;
        let job = tracker.job();
        let hash = job.hash.expect("broadcast hash is kept");
        assert_eq!(outcome, TxOutcome::Failed(WalletError::ReceiptTimeout(hash)));
        assert_eq!(job.status, TxStatus::Failed);
        assert!(!tracker.is_loading());

        assert_eq!(rx.try_recv().unwrap().severity, Severity::Info);
        let note = rx.try_recv().unwrap();
        assert_eq!(note.severity, Severity::Error);
        assert!(note.message.starts_with("Timed out waiting for receipt of 0x"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn incomplete_call_is_a_noop() {
        let wallet = Arc::new(MockWallet::new(8453));
        let (tracker, _rx) = tracker(&wallet);
        assert_eq!(tracker.write().await, TxOutcome::Skipped);
        assert_eq!(tracker.simulate().await, None);
        assert_eq!(tracker.status(), TxStatus::Idle);
        assert!(wallet.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_simulation_is_advisory() {
        let wallet = Arc::new(MockWallet::new(8453));
        wallet.set_simulation(Err(WalletError::Simulation("execution reverted".into())));
        let (tracker, _rx) = tracker(&wallet);
        tracker.prepare("Swap", Some(sample_call()));

        assert_eq!(tracker.simulate().await, None);
        assert_eq!(tracker.estimate_error().as_deref(), Some("execution reverted"));
        assert!(matches!(tracker.write().await, TxOutcome::Confirmed(_)));
    }

    #[tokio::test]
    async fn reset_while_pending_drops_the_result() {
        let wallet = Arc::new(MockWallet::new(8453));
        let gate = wallet.hold_receipts();
        let (tracker, mut rx) = tracker(&wallet);
        tracker.prepare("Swap", Some(sample_call()));

        let Submit::Sent(submission) = tracker.submit().await else {
            panic!("expected a submission");
        };
        assert_eq!(tracker.status(), TxStatus::Pending);
        assert!(tracker.is_loading());

        let waiting = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.await_confirmation(submission).await })
        };
        tracker.reset();
        gate.notify_one();

        assert_eq!(waiting.await.unwrap(), TxOutcome::Superseded);
        assert_eq!(tracker.status(), TxStatus::Idle);
        let _pending = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn status_is_observable() {
        let wallet = Arc::new(MockWallet::new(8453));
        let (tracker, _rx) = tracker(&wallet);
        let mut status = tracker.subscribe();
        tracker.prepare("Swap", Some(sample_call()));
        tracker.write().await;
        assert!(status.has_changed().unwrap());
        assert_eq!(*status.borrow_and_update(), TxStatus::Confirmed);
    }
}
