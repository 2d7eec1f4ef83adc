//! Endpoint resolution: identity → where its data lives.
//!
//! [`Resolver::resolve`] serves a cached [`EndpointRecord`] until it expires
//! and otherwise performs exactly one backend lookup. Signed records are
//! verified against the identity before they are cached. Concurrent
//! resolutions of the same identity may both reach the backend; the cache
//! keeps whichever result is written last.
//!
//! [`Resolver::resolve_url`] walks a record's endpoints in priority order and
//! follows `Host` delegations up to [`MAX_DELEGATION_DEPTH`] hops.

mod backend;
mod registry;
mod relay;

pub use backend::{BackendError, LookupAnswer, LookupBackend};
pub use registry::{StaticRegistry, PINNED_TTL_SECS};
pub use relay::RelayBackend;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use keyhost_core::{Endpoint, EndpointRecord, Keypair, PublicIdentity, SignedRecord, Target};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// How many `Host` delegations `resolve_url` follows before giving up.
pub const MAX_DELEGATION_DEPTH: usize = 3;

struct CacheEntry {
    record: EndpointRecord,
    deadline: Instant,
}

pub struct Resolver {
    backend: Arc<dyn LookupBackend>,
    cache: Mutex<HashMap<PublicIdentity, CacheEntry>>,
    min_ttl: Duration,
    max_ttl: Duration,
}

impl Resolver {
    pub fn new(backend: Arc<dyn LookupBackend>, min_ttl: Duration, max_ttl: Duration) -> Self {
        Self {
            backend,
            cache: Mutex::new(HashMap::new()),
            min_ttl,
            max_ttl: max_ttl.max(min_ttl),
        }
    }

    /// Resolve `identity` to its current endpoint record.
    pub async fn resolve(&self, identity: &PublicIdentity) -> Result<EndpointRecord> {
        if let Some(record) = self.cached(identity) {
            debug!(%identity, "resolver cache hit");
            return Ok(record);
        }

        debug!(%identity, "resolver cache miss, querying backend");
        let answer = self
            .backend
            .lookup(identity)
            .await
            .map_err(|e| Error::resolution(e.to_string()))?
            .ok_or_else(|| Error::resolution(format!("no record published for {identity}")))?;

        let (endpoints, ttl_secs) = match answer {
            LookupAnswer::Signed(record) => {
                if record.identity != *identity {
                    return Err(Error::resolution(format!(
                        "identity mismatch: asked for {identity}, got a record for {}",
                        record.identity
                    )));
                }
                record
                    .verify()
                    .map_err(|e| Error::resolution(format!("bad record for {identity}: {e}")))?;
                (record.endpoints, record.ttl_secs)
            }
            LookupAnswer::Pinned {
                endpoints,
                ttl_secs,
            } => (endpoints, ttl_secs),
        };

        if endpoints.is_empty() {
            return Err(Error::resolution(format!("record for {identity} has no endpoints")));
        }

        Ok(self.store(*identity, endpoints, ttl_secs))
    }

    /// Resolve `identity` all the way down to a base URL.
    pub async fn resolve_url(&self, identity: &PublicIdentity) -> Result<String> {
        self.resolve_url_at_depth(*identity, 0).await
    }

    fn resolve_url_at_depth<'a>(
        &'a self,
        identity: PublicIdentity,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let record = self.resolve(&identity).await?;
            let mut last_error = None;

            for endpoint in record.ranked() {
                match &endpoint.target {
                    Target::Url(url) => return Ok(url.clone()),
                    Target::Host(host) if *host == identity => {
                        debug!(%identity, "skipping self-delegation");
                    }
                    Target::Host(_) if depth >= MAX_DELEGATION_DEPTH => {
                        last_error = Some(Error::resolution(format!(
                            "delegation chain from {identity} is deeper than {MAX_DELEGATION_DEPTH}"
                        )));
                    }
                    Target::Host(host) => match self.resolve_url_at_depth(*host, depth + 1).await {
                        Ok(url) => return Ok(url),
                        Err(e) => {
                            debug!(%identity, %host, error = %e, "delegation failed, trying next endpoint");
                            last_error = Some(e);
                        }
                    },
                }
            }

            Err(last_error
                .unwrap_or_else(|| Error::resolution(format!("no usable endpoint for {identity}"))))
        })
    }

    /// Sign and publish `keypair`'s endpoint list, then prime the cache.
    pub async fn publish(
        &self,
        keypair: &Keypair,
        endpoints: Vec<Endpoint>,
        ttl: Duration,
    ) -> Result<SignedRecord> {
        let ttl_secs = u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX);
        let record = SignedRecord::sign(keypair, endpoints, ttl_secs)
            .map_err(|e| Error::resolution(format!("cannot sign record: {e}")))?;

        self.backend
            .publish(&record)
            .await
            .map_err(|e| Error::resolution(format!("publish failed: {e}")))?;

        self.store(record.identity, record.endpoints.clone(), ttl_secs);
        info!(identity = %record.identity, "endpoint record published");
        Ok(record)
    }

    /// Drop any cached record for `identity`.
    pub fn invalidate(&self, identity: &PublicIdentity) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);
    }

    fn cached(&self, identity: &PublicIdentity) -> Option<EndpointRecord> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        match cache.get(identity) {
            Some(entry) if Instant::now() < entry.deadline => Some(entry.record.clone()),
            Some(_) => {
                cache.remove(identity);
                None
            }
            None => None,
        }
    }

    fn store(&self, identity: PublicIdentity, endpoints: Vec<Endpoint>, ttl_secs: u32) -> EndpointRecord {
        let ttl = self.clamp_ttl(ttl_secs);
        let record = EndpointRecord::new(
            identity,
            endpoints,
            Utc::now(),
            chrono::Duration::seconds(ttl.as_secs() as i64),
        );
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).insert(
            identity,
            CacheEntry {
                record: record.clone(),
                deadline: Instant::now() + ttl,
            },
        );
        record
    }

    fn clamp_ttl(&self, ttl_secs: u32) -> Duration {
        Duration::from_secs(u64::from(ttl_secs))
            .min(self.max_ttl)
            .max(self.min_ttl)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps a registry and counts lookups.
    struct CountingBackend {
        inner: StaticRegistry,
        lookups: AtomicUsize,
    }

    impl CountingBackend {
        fn new(inner: StaticRegistry) -> Arc<Self> {
            Arc::new(Self {
                inner,
                lookups: AtomicUsize::new(0),
            })
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LookupBackend for CountingBackend {
        async fn lookup(
            &self,
            identity: &PublicIdentity,
        ) -> std::result::Result<Option<LookupAnswer>, BackendError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(identity).await
        }

        async fn publish(&self, record: &SignedRecord) -> std::result::Result<(), BackendError> {
            self.inner.publish(record).await
        }
    }

    struct DownBackend;

    #[async_trait]
    impl LookupBackend for DownBackend {
        async fn lookup(
            &self,
            _identity: &PublicIdentity,
        ) -> std::result::Result<Option<LookupAnswer>, BackendError> {
            Err(BackendError::Unreachable("connection refused".into()))
        }

        async fn publish(&self, _record: &SignedRecord) -> std::result::Result<(), BackendError> {
            Err(BackendError::Unreachable("connection refused".into()))
        }
    }

    fn resolver(backend: Arc<dyn LookupBackend>) -> Resolver {
        Resolver::new(backend, Duration::from_secs(60), Duration::from_secs(3600))
    }

    #[tokio::test(start_paused = true)]
    async fn second_resolution_within_ttl_hits_cache() {
        let registry = StaticRegistry::new();
        let kp = Keypair::generate();
        registry.insert(SignedRecord::sign(&kp, vec![Endpoint::url("http://a", 0)], 300).unwrap());

        let backend = CountingBackend::new(registry);
        let resolver = resolver(backend.clone());
        let id = kp.public_identity();

        resolver.resolve(&id).await.unwrap();
        resolver.resolve(&id).await.unwrap();
        assert_eq!(backend.lookups(), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        resolver.resolve(&id).await.unwrap();
        assert_eq!(backend.lookups(), 2);

        resolver.resolve(&id).await.unwrap();
        assert_eq!(backend.lookups(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_is_clamped_to_bounds() {
        let registry = StaticRegistry::new();
        let short = Keypair::generate();
        let long = Keypair::generate();
        registry.insert(SignedRecord::sign(&short, vec![Endpoint::url("http://s", 0)], 1).unwrap());
        registry.insert(SignedRecord::sign(&long, vec![Endpoint::url("http://l", 0)], 86_400).unwrap());

        let backend = CountingBackend::new(registry);
        let resolver = resolver(backend.clone());

        resolver.resolve(&short.public_identity()).await.unwrap();
        resolver.resolve(&long.public_identity()).await.unwrap();
        assert_eq!(backend.lookups(), 2);

        // A 1 s record is held for the 60 s floor.
        tokio::time::advance(Duration::from_secs(30)).await;
        resolver.resolve(&short.public_identity()).await.unwrap();
        assert_eq!(backend.lookups(), 2);

        // A 1 day record is dropped at the 1 h ceiling.
        tokio::time::advance(Duration::from_secs(3600)).await;
        resolver.resolve(&long.public_identity()).await.unwrap();
        assert_eq!(backend.lookups(), 3);
    }

    #[tokio::test]
    async fn forged_record_is_rejected() {
        let registry = StaticRegistry::new();
        let kp = Keypair::generate();
        let mut record = SignedRecord::sign(&kp, vec![Endpoint::url("http://honest", 0)], 60).unwrap();
        record.endpoints = vec![Endpoint::url("http://attacker", 0)];
        registry.insert(record);

        let err = resolver(Arc::new(registry))
            .resolve(&kp.public_identity())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResolutionFailed { .. }), "{err}");
    }

    #[tokio::test]
    async fn record_signed_by_another_key_is_rejected() {
        let registry = StaticRegistry::new();
        let victim = Keypair::generate();
        let attacker = Keypair::generate();
        let mut record =
            SignedRecord::sign(&attacker, vec![Endpoint::url("http://attacker", 0)], 60).unwrap();
        record.identity = victim.public_identity();
        registry.insert(record);

        let err = resolver(Arc::new(registry))
            .resolve(&victim.public_identity())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResolutionFailed { .. }));
    }

    #[tokio::test]
    async fn missing_record_is_resolution_failure() {
        let id = Keypair::generate().public_identity();
        let err = resolver(Arc::new(StaticRegistry::new()))
            .resolve(&id)
            .await
            .unwrap_err();
        match err {
            Error::ResolutionFailed { reason } => assert!(reason.contains("no record")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_resolution_failure() {
        let id = Keypair::generate().public_identity();
        let err = resolver(Arc::new(DownBackend)).resolve(&id).await.unwrap_err();
        match err {
            Error::ResolutionFailed { reason } => assert!(reason.contains("unreachable")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn resolve_url_prefers_lowest_priority() {
        let registry = StaticRegistry::new();
        let kp = Keypair::generate();
        registry.insert(
            SignedRecord::sign(
                &kp,
                vec![Endpoint::url("http://backup", 10), Endpoint::url("http://primary", 1)],
                60,
            )
            .unwrap(),
        );

        let url = resolver(Arc::new(registry))
            .resolve_url(&kp.public_identity())
            .await
            .unwrap();
        assert_eq!(url, "http://primary");
    }

    #[tokio::test]
    async fn resolve_url_follows_delegation_and_skips_dead_hosts() {
        let registry = StaticRegistry::new();
        let host = Keypair::generate().public_identity();
        let dead_host = Keypair::generate().public_identity();
        registry.pin_host(host, "http://host.test");

        let user = Keypair::generate();
        registry.insert(
            SignedRecord::sign(
                &user,
                vec![Endpoint::host(dead_host, 0), Endpoint::host(host, 1)],
                60,
            )
            .unwrap(),
        );

        let url = resolver(Arc::new(registry))
            .resolve_url(&user.public_identity())
            .await
            .unwrap();
        assert_eq!(url, "http://host.test");
    }

    #[tokio::test]
    async fn delegation_depth_is_bounded() {
        let registry = StaticRegistry::new();
        let keys: Vec<Keypair> = (0..5).map(|_| Keypair::generate()).collect();
        for pair in keys.windows(2) {
            registry.insert(
                SignedRecord::sign(&pair[0], vec![Endpoint::host(pair[1].public_identity(), 0)], 60)
                    .unwrap(),
            );
        }
        registry.pin_host(keys[4].public_identity(), "http://end");

        let resolver = resolver(Arc::new(registry));
        // 0 → 1 → 2 → 3 → 4 needs four hops.
        assert!(resolver.resolve_url(&keys[0].public_identity()).await.is_err());
        // 1 → 2 → 3 → 4 needs three.
        assert_eq!(
            resolver.resolve_url(&keys[1].public_identity()).await.unwrap(),
            "http://end"
        );
    }

    #[tokio::test]
    async fn publish_primes_cache() {
        let backend = CountingBackend::new(StaticRegistry::new());
        let resolver = resolver(backend.clone());
        let kp = Keypair::generate();
        let host = Keypair::generate().public_identity();

        resolver
            .publish(&kp, vec![Endpoint::host(host, 0)], Duration::from_secs(600))
            .await
            .unwrap();

        let record = resolver.resolve(&kp.public_identity()).await.unwrap();
        assert_eq!(record.endpoints, vec![Endpoint::host(host, 0)]);
        assert_eq!(backend.lookups(), 0);

        resolver.invalidate(&kp.public_identity());
        resolver.resolve(&kp.public_identity()).await.unwrap();
        assert_eq!(backend.lookups(), 1);
    }
}
