//! Account persistence.
//!
//! [`AccountStore`] is the seam between the service and wherever the
//! accounts actually live. [`JsonFileStore`] keeps them in a pretty
//! printed JSON file; a missing file just means no accounts yet.
//! [`MemoryStore`] backs tests and scratch sessions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex as StdMutex, MutexGuard};

use crate::totp::types::{TotpAccount, TotpError, TotpResult};

/// File name used when only a directory is given.
pub const DEFAULT_STORE_FILE: &str = "totp_accounts.json";

/// Where accounts are loaded from and saved to.
pub trait AccountStore: Send + Sync {
    /// Load every stored account. A store that has never been written
    /// returns an empty list, not an error.
    fn load_all(&self) -> TotpResult<Vec<TotpAccount>>;

    /// Replace the stored accounts with this list.
    fn save(&self, accounts: &[TotpAccount]) -> TotpResult<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  JSON file store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stores the account list as a pretty-printed JSON array on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the default file name inside a directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(DEFAULT_STORE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AccountStore for JsonFileStore {
    fn load_all(&self) -> TotpResult<Vec<TotpAccount>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| TotpError::storage(format!("read {}: {}", self.path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| TotpError::parse(format!("parse {}: {}", self.path.display(), e)))
    }

    fn save(&self, accounts: &[TotpAccount]) -> TotpResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    TotpError::storage(format!("create {}: {}", parent.display(), e))
                })?;
            }
        }
        let json = serde_json::to_string_pretty(accounts)
            .map_err(|e| TotpError::storage(format!("serialise accounts: {}", e)))?;
        fs::write(&self.path, json)
            .map_err(|e| TotpError::storage(format!("write {}: {}", self.path.display(), e)))?;
        log::debug!("saved {} accounts to {}", accounts.len(), self.path.display());
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  In-memory store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Keeps accounts in memory. Useful for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    accounts: StdMutex<Vec<TotpAccount>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: Vec<TotpAccount>) -> Self {
        Self {
            accounts: StdMutex::new(accounts),
        }
    }
}

impl AccountStore for MemoryStore {
    fn load_all(&self) -> TotpResult<Vec<TotpAccount>> {
        Ok(lock(&self.accounts).clone())
    }

    fn save(&self, accounts: &[TotpAccount]) -> TotpResult<()> {
        *lock(&self.accounts) = accounts.to_vec();
        Ok(())
    }
}

fn lock(cell: &StdMutex<Vec<TotpAccount>>) -> MutexGuard<'_, Vec<TotpAccount>> {
    cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
