// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Decides which connected wallet signs for the session.
//!
//! The EOA-mode preference picks a connector kind; the first connected wallet
//! of that kind is the target. When it differs from the provider's active
//! address the reconciler asks the provider to activate it, once per
//! divergence. A rejected activation is remembered so the same inputs do not
//! trigger a second prompt.

use crate::common::error::WalletError;
use crate::domain::types::{ConnectorKind, WalletHandle};
use crate::network::wallet::WalletProvider;
use alloy::primitives::Address;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Target already active.
    InSync,
    /// Activation requested and accepted.
    Activated(WalletHandle),
    /// This exact divergence was already acted on.
    AlreadyRequested,
    /// No connected wallet of the required kind; active address untouched.
    NoMatchingWallet(ConnectorKind),
    ActivationFailed(WalletError),
}

/// (target, active address observed when activation was requested)
type Divergence = (Address, Option<Address>);

#[derive(Debug)]
pub struct AddressReconciler {
    eoa_mode: bool,
    last_request: Mutex<Option<Divergence>>,
}

/// First wallet attached through the connector the mode calls for.
pub fn select_target(wallets: &[WalletHandle], eoa_mode: bool) -> Option<&WalletHandle> {
    let kind = ConnectorKind::for_eoa_mode(eoa_mode);
    wallets.iter().find(|w| w.connector == kind)
}

impl AddressReconciler {
    pub fn new(eoa_mode: bool) -> Self {
        Self {
            eoa_mode,
            last_request: Mutex::new(None),
        }
    }

    pub fn eoa_mode(&self) -> bool {
        self.eoa_mode
    }

    pub fn required_connector(&self) -> ConnectorKind {
        ConnectorKind::for_eoa_mode(self.eoa_mode)
    }

    fn remember(&self, divergence: Option<Divergence>) {
        if let Ok(mut guard) = self.last_request.lock() {
            *guard = divergence;
        }
    }

    fn already_requested(&self, divergence: Divergence) -> bool {
        self.last_request
            .lock()
            .map(|guard| *guard == Some(divergence))
            .unwrap_or(false)
    }

    /// Run after any change to the wallet list or the active address.
    pub async fn reconcile(&self, provider: &dyn WalletProvider) -> Reconciliation {
        let wallets = provider.wallets();
        let active = provider.active_account().map(|a| a.address);

        let Some(target) = select_target(&wallets, self.eoa_mode) else {
            tracing::debug!(
                target: "reconciler",
                required = %self.required_connector(),
                "no connected wallet of the required kind"
            );
            self.remember(None);
            return Reconciliation::NoMatchingWallet(self.required_connector());
        };

        if active == Some(target.address) {
            self.remember(None);
            return Reconciliation::InSync;
        }

        let divergence = (target.address, active);
        if self.already_requested(divergence) {
            return Reconciliation::AlreadyRequested;
        }
        self.remember(Some(divergence));

        tracing::info!(
            target: "reconciler",
            target_address = %format!("{:#x}", target.address),
            connector = %target.connector,
            active = ?active,
            "activating wallet"
        );
        match provider.activate(target).await {
            Ok(()) => Reconciliation::Activated(target.clone()),
            Err(e) => {
                tracing::warn!(target: "reconciler", error = %e, "wallet activation rejected");
                Reconciliation::ActivationFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockWallet;
    use pretty_assertions::assert_eq;

    fn handle(byte: u8, kind: ConnectorKind) -> WalletHandle {
        WalletHandle::new(Address::repeat_byte(byte), kind, 8453)
    }

    #[test]
    fn selection_picks_first_of_required_kind() {
        let wallets = vec![
            handle(1, ConnectorKind::Embedded),
            handle(2, ConnectorKind::Injected),
            handle(3, ConnectorKind::Embedded),
        ];
        assert_eq!(select_target(&wallets, true).unwrap().address, Address::repeat_byte(1));
        assert_eq!(select_target(&wallets, false).unwrap().address, Address::repeat_byte(2));
        assert!(select_target(&wallets[..1], false).is_none());
    }

    #[tokio::test]
    async fn activates_once_per_divergence() {
        let wallet = MockWallet::new(8453).with_wallet(handle(2, ConnectorKind::Injected));
        wallet.fail_activation(true);
        let reconciler = AddressReconciler::new(false);

        assert!(matches!(
            reconciler.reconcile(&wallet).await,
            Reconciliation::ActivationFailed(_)
        ));
        assert_eq!(reconciler.reconcile(&wallet).await, Reconciliation::AlreadyRequested);
        assert_eq!(reconciler.reconcile(&wallet).await, Reconciliation::AlreadyRequested);
        assert_eq!(wallet.activations().len(), 1);
        assert!(wallet.active_account().is_none());
    }

    #[tokio::test]
    async fn in_sync_inputs_trigger_nothing() {
        let wallet = MockWallet::new(8453).with_wallet(handle(2, ConnectorKind::Injected));
        let reconciler = AddressReconciler::new(false);

        assert!(matches!(
            reconciler.reconcile(&wallet).await,
            Reconciliation::Activated(_)
        ));
        assert_eq!(reconciler.reconcile(&wallet).await, Reconciliation::InSync);
        assert_eq!(reconciler.reconcile(&wallet).await, Reconciliation::InSync);
        assert_eq!(wallet.activations().len(), 1);
    }

    #[tokio::test]
    async fn drift_after_sync_is_corrected() {
        let wallet = MockWallet::new(8453)
            .with_wallet(handle(1, ConnectorKind::Embedded))
            .with_wallet(handle(2, ConnectorKind::Injected));
        let reconciler = AddressReconciler::new(true);
        reconciler.reconcile(&wallet).await;
        assert_eq!(wallet.active_account().unwrap().address, Address::repeat_byte(1));

        wallet.set_active(Some(Address::repeat_byte(2)));
        assert!(matches!(
            reconciler.reconcile(&wallet).await,
            Reconciliation::Activated(_)
        ));
        assert_eq!(wallet.activations().len(), 2);
        assert_eq!(wallet.active_account().unwrap().address, Address::repeat_byte(1));
    }

    #[tokio::test]
    async fn missing_kind_leaves_active_untouched() {
        let wallet = MockWallet::new(8453).with_wallet(handle(2, ConnectorKind::Injected));
        wallet.set_active(Some(Address::repeat_byte(2)));
        let reconciler = AddressReconciler::new(true);
        assert_eq!(
            reconciler.reconcile(&wallet).await,
            Reconciliation::NoMatchingWallet(ConnectorKind::Embedded)
        );
        assert!(wallet.activations().is_empty());
        assert_eq!(wallet.active_account().unwrap().address, Address::repeat_byte(2));
    }

    #[tokio::test]
    async fn late_activation_is_not_requested_twice() {
        let wallet = MockWallet::new(8453)
            .with_wallet(handle(1, ConnectorKind::Embedded))
            .with_wallet(handle(2, ConnectorKind::Injected));
        wallet.set_active(Some(Address::repeat_byte(2)));
        wallet.defer_activation(true);
        let reconciler = AddressReconciler::new(true);

        // The provider accepts but has not switched yet; re-runs triggered by
        // its own change events must not prompt again.
        assert!(matches!(
            reconciler.reconcile(&wallet).await,
            Reconciliation::Activated(_)
        ));
        assert_eq!(reconciler.reconcile(&wallet).await, Reconciliation::AlreadyRequested);
        assert_eq!(wallet.activations().len(), 1);

        assert!(wallet.complete_activation());
        assert_eq!(reconciler.reconcile(&wallet).await, Reconciliation::InSync);

        // Same divergence again after it was resolved: one new request.
        wallet.set_active(Some(Address::repeat_byte(2)));
        assert!(matches!(
            reconciler.reconcile(&wallet).await,
            Reconciliation::Activated(_)
        ));
        assert_eq!(reconciler.reconcile(&wallet).await, Reconciliation::AlreadyRequested);
        assert_eq!(wallet.activations().len(), 2);

        assert!(wallet.complete_activation());
        assert_eq!(reconciler.reconcile(&wallet).await, Reconciliation::InSync);
        assert_eq!(wallet.active_account().unwrap().address, Address::repeat_byte(1));
    }
}
