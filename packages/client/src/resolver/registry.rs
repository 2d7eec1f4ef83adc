//! In-memory lookup backend for testnets.
//!
//! A [`StaticRegistry`] is constructed explicitly and cloned into every
//! client that should share it; clones see the same map. It never touches
//! the network.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use keyhost_core::{Endpoint, PublicIdentity, SignedRecord};

use super::backend::{BackendError, LookupAnswer, LookupBackend};

/// TTL handed out for pinned entries.
pub const PINNED_TTL_SECS: u32 = 3600;

#[derive(Clone, Default)]
pub struct StaticRegistry {
    entries: Arc<RwLock<HashMap<PublicIdentity, LookupAnswer>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`pin_host`](Self::pin_host).
    pub fn with_host(self, identity: PublicIdentity, url: impl Into<String>) -> Self {
        self.pin_host(identity, url);
        self
    }

    /// Pin a host identity to a fixed base URL.
    pub fn pin_host(&self, identity: PublicIdentity, url: impl Into<String>) {
        self.pin(identity, vec![Endpoint::url(url, 0)]);
    }

    /// Pin an arbitrary endpoint list.
    pub fn pin(&self, identity: PublicIdentity, endpoints: Vec<Endpoint>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                identity,
                LookupAnswer::Pinned {
                    endpoints,
                    ttl_secs: PINNED_TTL_SECS,
                },
            );
    }

    /// Store a signed record as given. Checking it is the resolver's job.
    pub fn insert(&self, record: SignedRecord) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.identity, LookupAnswer::Signed(record));
    }

    pub fn remove(&self, identity: &PublicIdentity) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for StaticRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

#[async_trait]
impl LookupBackend for StaticRegistry {
    async fn lookup(&self, identity: &PublicIdentity) -> Result<Option<LookupAnswer>, BackendError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned())
    }

    async fn publish(&self, record: &SignedRecord) -> Result<(), BackendError> {
        self.insert(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyhost_core::Keypair;

    #[tokio::test]
    async fn clones_share_entries() {
        let registry = StaticRegistry::new();
        let other = registry.clone();

        let kp = Keypair::generate();
        let record = SignedRecord::sign(&kp, vec![Endpoint::url("http://a", 0)], 60).unwrap();
        other.publish(&record).await.unwrap();

        let answer = registry.lookup(&kp.public_identity()).await.unwrap();
        assert_eq!(answer, Some(LookupAnswer::Signed(record)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn pinned_host_is_served() {
        let host = Keypair::generate().public_identity();
        let registry = StaticRegistry::new().with_host(host, "http://127.0.0.1:6286/");

        match registry.lookup(&host).await.unwrap() {
            Some(LookupAnswer::Pinned { endpoints, ttl_secs }) => {
                assert_eq!(endpoints, vec![Endpoint::url("http://127.0.0.1:6286", 0)]);
                assert_eq!(ttl_secs, PINNED_TTL_SECS);
            }
            other => panic!("unexpected answer: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_identity_is_absent() {
        let registry = StaticRegistry::new();
        let id = Keypair::generate().public_identity();
        assert_eq!(registry.lookup(&id).await.unwrap(), None);
        assert!(registry.is_empty());
    }
}
