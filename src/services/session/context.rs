// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::constants::{EOA_DISABLED_ENV, EOA_MODE_KEY};
use crate::common::error::{AppError, WalletError};
use crate::common::parsing::parse_boolish;
use crate::data::preference::PreferenceStore;
use crate::domain::types::{ActiveAccount, ConnectorKind, WalletHandle};
use crate::network::wallet::WalletProvider;
use crate::services::session::reconciler::{AddressReconciler, Reconciliation};
use std::sync::Arc;

/// Builds the wallet-provider context for a given EOA mode.
pub type ProviderFactory =
    Box<dyn Fn(bool) -> Result<Arc<dyn WalletProvider>, AppError> + Send + Sync>;

/// Owns the wallet provider and the reconciler for the current EOA mode.
///
/// The mode is a restart boundary: toggling persists the new value, tears the
/// provider down and builds a fresh one, then reconciles from scratch.
pub struct SessionContext {
    store: PreferenceStore,
    factory: ProviderFactory,
    eoa_mode: bool,
    provider: Arc<dyn WalletProvider>,
    reconciler: AddressReconciler,
}

/// Deployment default when no preference has been stored yet.
pub fn default_eoa_mode() -> bool {
    let disabled = std::env::var(EOA_DISABLED_ENV)
        .ok()
        .and_then(|v| parse_boolish(&v))
        .unwrap_or(false);
    !disabled
}

impl SessionContext {
    pub fn start(store: PreferenceStore, factory: ProviderFactory) -> Result<Self, AppError> {
        let eoa_mode = match store.get_bool(EOA_MODE_KEY)? {
            Some(stored) => stored,
            None => default_eoa_mode(),
        };
        let provider = factory(eoa_mode)?;
        tracing::info!(
            target: "reconciler",
            eoa_mode,
            connector = %ConnectorKind::for_eoa_mode(eoa_mode),
            "session started"
        );
        Ok(Self {
            store,
            factory,
            eoa_mode,
            provider,
            reconciler: AddressReconciler::new(eoa_mode),
        })
    }

    pub fn eoa_mode(&self) -> bool {
        self.eoa_mode
    }

    pub fn provider(&self) -> Arc<dyn WalletProvider> {
        self.provider.clone()
    }

    pub fn active_account(&self) -> Option<ActiveAccount> {
        self.provider.active_account()
    }

    pub fn wallets(&self) -> Vec<WalletHandle> {
        self.provider.wallets()
    }

    pub async fn reconcile(&self) -> Reconciliation {
        self.reconciler.reconcile(self.provider.as_ref()).await
    }

    /// Connect through `kind`, then reconcile against the new wallet set.
    pub async fn connect(&self, kind: ConnectorKind) -> Result<Reconciliation, WalletError> {
        self.provider.connect(kind).await?;
        Ok(self.reconcile().await)
    }

    pub async fn switch_chain(&self, chain_id: u64) -> Result<Reconciliation, WalletError> {
        self.provider.switch_chain(chain_id).await?;
        Ok(self.reconcile().await)
    }

    /// Flip EOA mode, persist it, and rebuild the provider context.
    pub async fn toggle_eoa_mode(&mut self) -> Result<Reconciliation, AppError> {
        let next = !self.eoa_mode;
        self.store.set_bool(EOA_MODE_KEY, next)?;

        if let Err(e) = self.provider.disconnect().await {
            tracing::warn!(target: "reconciler", error = %e, "disconnect before rebuild failed");
        }
        self.provider = (self.factory)(next)?;
        self.eoa_mode = next;
        self.reconciler = AddressReconciler::new(next);
        tracing::info!(target: "reconciler", eoa_mode = next, "wallet context rebuilt");
        Ok(self.reconcile().await)
    }
}
