//! Storage abstraction layer for the keyhost host.
//!
//! The [`Storage`] trait defines the contract between the HTTP handler layer
//! and persistence. All authorization logic lives in the handlers; storage
//! is purely a data access layer.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStorage`] | Tests, testnets, ephemeral hosts |
//!
//! [`MemoryStorage`]: memory::MemoryStorage

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use keyhost_core::{PublicIdentity, SignedRecord};

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested item does not exist.
    #[error("not found")]
    NotFound,

    /// An item with the same key already exists (e.g. a second signup).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A relay record older than the one already stored.
    #[error("stale: {0}")]
    Stale(String),

    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Stored types
// ---------------------------------------------------------------------------

/// A session issued by this host.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    /// Bearer credential. Random, hex-encoded.
    pub token: String,
    pub identity: PublicIdentity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// One stored file.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub content: Bytes,
    pub content_type: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// The persistence contract for a keyhost host.
///
/// All methods are `async` and return `Result<_, StorageError>`. Implementations
/// must be `Send + Sync + 'static` so they can be held in an `Arc<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // --- Accounts ------------------------------------------------------------

    /// Register `identity`. Returns [`StorageError::AlreadyExists`] if it
    /// already has an account.
    async fn create_account(
        &self,
        identity: &PublicIdentity,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn account_exists(&self, identity: &PublicIdentity) -> Result<bool, StorageError>;

    // --- Auth token nonces ---------------------------------------------------

    /// Remember `nonce` until `expires_at`. Returns `false` if it was already
    /// remembered, i.e. the token is a replay. Expired nonces may be pruned.
    async fn record_nonce(
        &self,
        nonce: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    // --- Sessions ------------------------------------------------------------

    async fn put_session(&self, session: &StoredSession) -> Result<(), StorageError>;

    /// Look a session up by bearer token. Expired sessions are still
    /// returned; callers decide what expiry means.
    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, StorageError>;

    /// Revoke a session. No-op if the token is unknown.
    async fn delete_session(&self, token: &str) -> Result<(), StorageError>;

    // --- Entries -------------------------------------------------------------

    /// Create or replace the entry at `path` in `owner`'s namespace.
    async fn put_entry(
        &self,
        owner: &PublicIdentity,
        path: &str,
        entry: Entry,
    ) -> Result<(), StorageError>;

    async fn get_entry(
        &self,
        owner: &PublicIdentity,
        path: &str,
    ) -> Result<Option<Entry>, StorageError>;

    /// Returns [`StorageError::NotFound`] if there is no entry at `path`.
    async fn delete_entry(&self, owner: &PublicIdentity, path: &str) -> Result<(), StorageError>;

    /// Every path in `owner`'s namespace that starts with `prefix`, in
    /// lexicographic order.
    async fn list_entries(
        &self,
        owner: &PublicIdentity,
        prefix: &str,
    ) -> Result<Vec<String>, StorageError>;

    // --- Relay records -------------------------------------------------------

    /// Store `record` unless a newer one is already held, in which case
    /// [`StorageError::Stale`] is returned.
    async fn put_record(&self, record: &SignedRecord) -> Result<(), StorageError>;

    async fn get_record(
        &self,
        identity: &PublicIdentity,
    ) -> Result<Option<SignedRecord>, StorageError>;

    // --- Host configuration --------------------------------------------------

    /// Retrieve a host-level config value by key (e.g. `"host_identity_secret"`).
    async fn get_host_config(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Persist a host-level config value (upsert by key).
    async fn set_host_config(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
