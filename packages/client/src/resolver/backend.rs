//! The lookup network seam.

use async_trait::async_trait;
use keyhost_core::{Endpoint, PublicIdentity, SignedRecord};
use thiserror::Error;

/// What a backend knows about one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupAnswer {
    /// A record published by the identity itself. The resolver verifies it
    /// before use.
    Signed(SignedRecord),

    /// An endpoint list fixed by local configuration, trusted as-is.
    Pinned { endpoints: Vec<Endpoint>, ttl_secs: u32 },
}

/// Errors returned by a [`LookupBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("record rejected: {0}")]
    Rejected(String),
}

/// A distributed (or simulated) directory of signed endpoint records.
///
/// `lookup` returns `Ok(None)` when the network answered and has no record
/// for the identity; transport and decoding failures are errors.
#[async_trait]
pub trait LookupBackend: Send + Sync {
    async fn lookup(&self, identity: &PublicIdentity) -> Result<Option<LookupAnswer>, BackendError>;

    async fn publish(&self, record: &SignedRecord) -> Result<(), BackendError>;
}
