// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod allowance;
pub mod context;
pub mod lucky;
pub mod notify;
pub mod orchestrator;
pub mod reconciler;
pub mod tracker;

pub use allowance::{AllowanceGate, AllowanceWatch};
pub use context::{ProviderFactory, SessionContext};
pub use lucky::LuckyPicker;
pub use notify::{Notification, Notifier, Severity};
pub use orchestrator::{BlockReason, SwapAction, SwapDecision, SwapOrchestrator};
pub use reconciler::{AddressReconciler, Reconciliation};
pub use tracker::{TransactionTracker, TxOutcome};
