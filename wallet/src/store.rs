use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Transactional, Tree};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::error::{Result, WalletError};
use crate::types::{Account, User, UserId};

const MEMORY_URL: &str = "memory://";
const SLED_SCHEME: &str = "sled://";

/// Persistence for users and their accounts.
///
/// Balance writes go through [`AccountStore::compare_and_swap`] so that two
/// writers holding the same snapshot cannot both succeed.
pub trait AccountStore: Send + Sync {
    /// Create a user together with its account. Fails with `DuplicateUser`
    /// if the username is taken, in which case nothing is written.
    fn insert_user(&self, user: &User, account: &Account) -> Result<()>;

    fn find_user(&self, username: &str) -> Result<Option<User>>;

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>>;

    /// Replace the stored account if its version still equals `expected_version`
    fn compare_and_swap(&self, account: &Account, expected_version: u64) -> Result<()>;

    /// Make pending writes durable
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the store named by a database URL: `memory://` or `sled://<path>`
pub fn open(database_url: &str) -> Result<Arc<dyn AccountStore>> {
    if database_url == MEMORY_URL {
        info!("Using in-memory account store");
        return Ok(Arc::new(InMemoryStore::new()));
    }

    if let Some(path) = database_url.strip_prefix(SLED_SCHEME) {
        if path.is_empty() {
            return Err(WalletError::Config("sled:// URL needs a path".to_string()));
        }
        info!(path, "Opening sled account store");
        return Ok(Arc::new(SledStore::open(path)?));
    }

    Err(WalletError::Config(format!(
        "Unsupported DATABASE_URL '{database_url}', expected {MEMORY_URL} or {SLED_SCHEME}<path>"
    )))
}

// Simple in-memory storage implementation
#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<Mutex<HashMap<String, User>>>,
    accounts: Arc<Mutex<HashMap<UserId, Account>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<String, User>>> {
        self.users
            .lock()
            .map_err(|_| WalletError::Store("user map lock poisoned".to_string()))
    }

    fn accounts(&self) -> Result<MutexGuard<'_, HashMap<UserId, Account>>> {
        self.accounts
            .lock()
            .map_err(|_| WalletError::Store("account map lock poisoned".to_string()))
    }
}

impl AccountStore for InMemoryStore {
    fn insert_user(&self, user: &User, account: &Account) -> Result<()> {
        // Users lock is held across both inserts so a failed signup leaves no account behind
        let mut users = self.users()?;
        if users.contains_key(&user.username) {
            return Err(WalletError::DuplicateUser(user.username.clone()));
        }
        self.accounts()?.insert(account.user_id.clone(), account.clone());
        users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    fn find_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users()?.get(username).cloned())
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        Ok(self.accounts()?.get(user_id).cloned())
    }

    fn compare_and_swap(&self, account: &Account, expected_version: u64) -> Result<()> {
        let mut accounts = self.accounts()?;
        match accounts.get_mut(&account.user_id) {
            Some(stored) if stored.version == expected_version => {
                *stored = account.clone();
                Ok(())
            }
            Some(_) => Err(WalletError::VersionConflict(account.user_id.to_string())),
            None => Err(WalletError::AccountNotFound(account.user_id.to_string())),
        }
    }
}

/// Persistent store backed by sled, one tree per record type, values as JSON
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    users: Tree,
    accounts: Tree,
}

impl SledStore {
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)?;
        let users = db.open_tree("users")?;
        let accounts = db.open_tree("accounts")?;
        Ok(Self {
            db,
            users,
            accounts,
        })
    }
}

impl AccountStore for SledStore {
    fn insert_user(&self, user: &User, account: &Account) -> Result<()> {
        let user_bytes = serde_json::to_vec(user)?;
        let account_bytes = serde_json::to_vec(account)?;

        let outcome: std::result::Result<(), TransactionError<WalletError>> =
            (&self.users, &self.accounts).transaction(|(users, accounts)| {
                if users.get(user.username.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        WalletError::DuplicateUser(user.username.clone()),
                    ));
                }
                users.insert(user.username.as_bytes(), user_bytes.clone())?;
                accounts.insert(account.user_id.as_str().as_bytes(), account_bytes.clone())?;
                Ok(())
            });

        match outcome {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    fn find_user(&self, username: &str) -> Result<Option<User>> {
        match self.users.get(username.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        match self.accounts.get(user_id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn compare_and_swap(&self, account: &Account, expected_version: u64) -> Result<()> {
        let key = account.user_id.as_str().as_bytes();
        let current = self
            .accounts
            .get(key)?
            .ok_or_else(|| WalletError::AccountNotFound(account.user_id.to_string()))?;
        let stored: Account = serde_json::from_slice(&current)?;
        if stored.version != expected_version {
            return Err(WalletError::VersionConflict(account.user_id.to_string()));
        }

        // Swap against the exact bytes we read so an interleaved writer is detected
        let new_bytes = serde_json::to_vec(account)?;
        match self.accounts.compare_and_swap(key, Some(current), Some(new_bytes))? {
            Ok(()) => Ok(()),
            Err(_) => Err(WalletError::VersionConflict(account.user_id.to_string())),
        }
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
