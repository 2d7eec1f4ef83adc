//! In-memory storage implementation.
//!
//! All data is held in RAM behind a [`RwLock`] and is lost when the process
//! exits. Use this for tests, testnets, and ephemeral hosts.
//!
//! Entries live in a [`BTreeMap`] keyed by `(owner, path)`, so a directory
//! listing is a range scan starting at the prefix.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyhost_core::{PublicIdentity, SignedRecord};

use super::{Entry, Storage, StorageError, StoredSession};

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    accounts: HashMap<PublicIdentity, DateTime<Utc>>,
    /// Nonce → time after which it may be forgotten.
    nonces: HashMap<String, DateTime<Utc>>,
    sessions: HashMap<String, StoredSession>,
    entries: BTreeMap<(PublicIdentity, String), Entry>,
    records: HashMap<PublicIdentity, SignedRecord>,
    host_config: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`Storage`].
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for MemoryStorage {
    // --- Accounts ------------------------------------------------------------

    async fn create_account(
        &self,
        identity: &PublicIdentity,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut inner = self.write();
        if inner.accounts.contains_key(identity) {
            return Err(StorageError::AlreadyExists(format!(
                "{identity} is already registered"
            )));
        }
        inner.accounts.insert(*identity, created_at);
        Ok(())
    }

    async fn account_exists(&self, identity: &PublicIdentity) -> Result<bool, StorageError> {
        Ok(self.read().accounts.contains_key(identity))
    }

    // --- Nonces --------------------------------------------------------------

    async fn record_nonce(
        &self,
        nonce: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let now = Utc::now();
        let mut inner = self.write();
        inner.nonces.retain(|_, until| *until > now);
        if inner.nonces.contains_key(nonce) {
            return Ok(false);
        }
        inner.nonces.insert(nonce.to_string(), expires_at);
        Ok(true)
    }

    // --- Sessions ------------------------------------------------------------

    async fn put_session(&self, session: &StoredSession) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut inner = self.write();
        inner.sessions.retain(|_, s| !s.is_expired(now));
        inner
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, StorageError> {
        Ok(self.read().sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        self.write().sessions.remove(token);
        Ok(())
    }

    // --- Entries -------------------------------------------------------------

    async fn put_entry(
        &self,
        owner: &PublicIdentity,
        path: &str,
        entry: Entry,
    ) -> Result<(), StorageError> {
        self.write().entries.insert((*owner, path.to_string()), entry);
        Ok(())
    }

    async fn get_entry(
        &self,
        owner: &PublicIdentity,
        path: &str,
    ) -> Result<Option<Entry>, StorageError> {
        Ok(self.read().entries.get(&(*owner, path.to_string())).cloned())
    }

    async fn delete_entry(&self, owner: &PublicIdentity, path: &str) -> Result<(), StorageError> {
        self.write()
            .entries
            .remove(&(*owner, path.to_string()))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn list_entries(
        &self,
        owner: &PublicIdentity,
        prefix: &str,
    ) -> Result<Vec<String>, StorageError> {
        let inner = self.read();
        Ok(inner
            .entries
            .range((*owner, prefix.to_string())..)
            .take_while(|((o, path), _)| o == owner && path.starts_with(prefix))
            .map(|((_, path), _)| path.clone())
            .collect())
    }

    // --- Relay records -------------------------------------------------------

    async fn put_record(&self, record: &SignedRecord) -> Result<(), StorageError> {
        let mut inner = self.write();
        if let Some(existing) = inner.records.get(&record.identity) {
            if existing.timestamp > record.timestamp {
                return Err(StorageError::Stale(format!(
                    "a newer record for {} is already stored",
                    record.identity
                )));
            }
        }
        inner.records.insert(record.identity, record.clone());
        Ok(())
    }

    async fn get_record(
        &self,
        identity: &PublicIdentity,
    ) -> Result<Option<SignedRecord>, StorageError> {
        Ok(self.read().records.get(identity).cloned())
    }

    // --- Host configuration --------------------------------------------------

    async fn get_host_config(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read().host_config.get(key).cloned())
    }

    async fn set_host_config(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write()
            .host_config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
