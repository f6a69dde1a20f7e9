use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::Account;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no account with id {0}")]
    Missing(Uuid),
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Narrow credential-store surface the account manager is written against.
///
/// Point lookups plus whole-document writes only: every mutation in the
/// system is a full replace, so the store never needs field-level updates.
/// `get_by_username` and `get_by_email` return an *active* match in
/// preference to an inactive one, since a deactivated account's username or
/// email may have been reused by a newer active account.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;
    async fn get_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    async fn insert(&self, account: Account) -> Result<(), StoreError>;
    /// Overwrite the whole document for an existing id in one write.
    async fn replace(&self, account: Account) -> Result<(), StoreError>;
}

/// In-memory account collection with an optional JSON snapshot on disk.
///
/// Each insert and each replace is atomic on its own (one write under the
/// lock); a read-modify-write pair spanning two calls is not, and the later
/// replace wins.
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    snapshot: Option<PathBuf>,
    /// Serializes snapshot writes so a slow write cannot be overtaken by a
    /// staler one. Never held while the accounts lock is held for writing.
    snapshot_lock: tokio::sync::Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            snapshot: None,
            snapshot_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open a store backed by a JSON snapshot file, loading any existing
    /// contents. The whole file is rewritten after every successful write.
    pub fn with_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut accounts = HashMap::new();
        if path.exists() {
            let bytes = std::fs::read(&path)?;
            let loaded: Vec<Account> = serde_json::from_slice(&bytes)?;
            info!(count = loaded.len(), path = %path.display(), "loaded account snapshot");
            accounts = loaded.into_iter().map(|a| (a.id, a)).collect();
        }
        Ok(Self {
            accounts: RwLock::new(accounts),
            snapshot: Some(path),
            snapshot_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Rewrite the snapshot file from the current map contents. Runs after
    /// the mutating write guard has been released: the state is re-read
    /// under the snapshot mutex, so the last write to finish always leaves
    /// the latest state on disk, and the disk write itself never blocks a
    /// runtime worker or other store access.
    async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let _write_order = self.snapshot_lock.lock().await;
        let bytes = {
            let accounts = self.accounts.read().await;
            let all: Vec<&Account> = accounts.values().collect();
            serde_json::to_vec_pretty(&all)?
        };
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn active_first<'a>(
    accounts: &'a HashMap<Uuid, Account>,
    matches: impl Fn(&Account) -> bool,
) -> Option<&'a Account> {
    let mut fallback = None;
    for account in accounts.values() {
        if matches(account) {
            if account.is_active {
                return Some(account);
            }
            fallback.get_or_insert(account);
        }
    }
    fallback
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(active_first(&accounts, |a| a.username == username).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(active_first(&accounts, |a| a.email == email).cloned())
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        {
            let mut accounts = self.accounts.write().await;
            accounts.insert(account.id, account);
        }
        self.persist().await
    }

    async fn replace(&self, account: Account) -> Result<(), StoreError> {
        {
            let mut accounts = self.accounts.write().await;
            if !accounts.contains_key(&account.id) {
                return Err(StoreError::Missing(account.id));
            }
            accounts.insert(account.id, account);
        }
        self.persist().await
    }
}
