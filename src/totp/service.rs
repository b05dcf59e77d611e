//! Consumer-facing authenticator service.
//!
//! Composes an [`AccountStore`] and a [`RefreshScheduler`] behind one
//! state object. Registration flows persist through the injected store
//! and keep the background tasks in step with the account list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::totp::refresh::{AccountHandle, RefreshScheduler};
use crate::totp::storage::AccountStore;
use crate::totp::types::{CodeReading, RefreshConfig, TotpAccount, TotpError, TotpResult};

/// Shared service state.
pub type AuthenticatorState = Arc<Mutex<AuthenticatorService>>;

pub struct AuthenticatorService {
    store: Box<dyn AccountStore>,
    scheduler: RefreshScheduler,
    accounts: Vec<TotpAccount>,
}

impl AuthenticatorService {
    /// New service over a store, with the default refresh cadence.
    pub fn new(store: impl AccountStore + 'static) -> AuthenticatorState {
        Self::with_config(store, RefreshConfig::default())
    }

    pub fn with_config(store: impl AccountStore + 'static, config: RefreshConfig) -> AuthenticatorState {
        Arc::new(Mutex::new(Self {
            store: Box::new(store),
            scheduler: RefreshScheduler::with_config(config),
            accounts: Vec::new(),
        }))
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Load every stored account and start a refresh task for each.
    pub async fn load_accounts(&mut self) -> TotpResult<Vec<TotpAccount>> {
        let accounts = self.store.load_all()?;
        log::info!("loaded {} accounts", accounts.len());
        for account in &accounts {
            self.scheduler.start(account.clone()).await;
        }
        self.accounts = accounts;
        Ok(self.accounts.clone())
    }

    /// Stop every refresh task. The account list itself is kept.
    pub async fn stop_all(&self) -> usize {
        self.scheduler.stop_all().await
    }

    // ── Registration ─────────────────────────────────────────────

    /// Add an account, persist the list, and start refreshing it.
    pub async fn add_account(&mut self, account: TotpAccount) -> TotpResult<AccountHandle> {
        if self.accounts.iter().any(|a| a.label == account.label) {
            return Err(TotpError::duplicate_account(&account.label));
        }
        self.accounts.push(account.clone());
        if let Err(e) = self.persist() {
            self.accounts.pop();
            return Err(e);
        }
        log::info!("account added: {} ({})", account.label, account.id);
        Ok(self.scheduler.start(account).await)
    }

    /// Remove an account, persist the list, and stop its refresh task.
    pub async fn remove_account(&mut self, id: &str) -> TotpResult<TotpAccount> {
        let index = self
            .accounts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| TotpError::account_not_found(id))?;
        let removed = self.accounts.remove(index);
        self.scheduler.stop(id).await;
        self.persist()?;
        log::info!("account removed: {} ({})", removed.label, removed.id);
        Ok(removed)
    }

    /// Replace an account's stored fields and restart its refresh task
    /// so the new parameters take effect immediately.
    pub async fn update_account(&mut self, account: TotpAccount) -> TotpResult<AccountHandle> {
        if self
            .accounts
            .iter()
            .any(|a| a.id != account.id && a.label == account.label)
        {
            return Err(TotpError::duplicate_account(&account.label));
        }
        let existing = self
            .accounts
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| TotpError::account_not_found(&account.id))?;
        *existing = account.clone();
        self.persist()?;
        log::info!("account updated: {} ({})", account.label, account.id);
        Ok(self.scheduler.start(account).await)
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Snapshot of the registered accounts.
    pub fn accounts(&self) -> Vec<TotpAccount> {
        self.accounts.clone()
    }

    pub fn get_account(&self, id: &str) -> TotpResult<TotpAccount> {
        self.accounts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| TotpError::account_not_found(id))
    }

    /// Latest reading for an account, if its task is running.
    pub async fn reading(&self, id: &str) -> Option<CodeReading> {
        self.scheduler.reading(id).await
    }

    /// Live handle onto an account's refresh task, if running.
    pub async fn handle(&self, id: &str) -> Option<AccountHandle> {
        self.scheduler.handle(id).await
    }

    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            account_count: self.accounts.len(),
            running_refreshers: self.scheduler.active_count().await,
        }
    }

    /// Persist the current account list now.
    pub fn save(&self) -> TotpResult<()> {
        self.persist()
    }

    fn persist(&self) -> TotpResult<()> {
        self.store.save(&self.accounts)
    }
}

/// Summary statistics returned by [`AuthenticatorService::stats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub account_count: usize,
    pub running_refreshers: usize,
}
