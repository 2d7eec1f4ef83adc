//! Self-announcement: keep the host's own endpoint record published.
//!
//! The host signs a record pointing its identity at `KEYHOST_PUBLIC_URL`,
//! stores it in its own relay, and PUTs it to every external relay in
//! `KEYHOST_RELAYS`. [`Announcer::run`] repeats this at half the record TTL
//! so resolvers never see the record lapse.

use std::sync::Arc;
use std::time::Duration;

use keyhost_core::{Endpoint, Keypair, RecordError, SignedRecord};
use reqwest::Client;
use tracing::{info, warn};

use crate::storage::{Storage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    #[error("cannot sign host record: {0}")]
    Sign(#[from] RecordError),
    #[error("cannot store host record: {0}")]
    Store(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Announcer
// ---------------------------------------------------------------------------

pub struct Announcer {
    client: Client,
    storage: Arc<dyn Storage>,
    keypair: Keypair,
    public_url: String,
    relays: Vec<String>,
    ttl_secs: u32,
}

impl Announcer {
    pub fn new(
        client: Client,
        storage: Arc<dyn Storage>,
        keypair: Keypair,
        public_url: String,
        relays: Vec<String>,
        ttl_secs: u32,
    ) -> Self {
        Self {
            client,
            storage,
            keypair,
            public_url,
            relays,
            ttl_secs,
        }
    }

    /// Sign a fresh record, store it locally, and push it to every relay.
    /// Relay failures are logged; only local failures are errors.
    pub async fn announce(&self) -> Result<SignedRecord, AnnounceError> {
        let record = SignedRecord::sign(
            &self.keypair,
            vec![Endpoint::url(&self.public_url, 0)],
            self.ttl_secs,
        )?;
        self.storage.put_record(&record).await?;

        for relay in &self.relays {
            self.push(relay.trim_end_matches('/'), &record).await;
        }
        Ok(record)
    }

    /// Republish every half TTL, starting one period from now. Intended to
    /// be called once at startup inside a `tokio::spawn`, after a first
    /// [`announce`](Self::announce).
    pub async fn run(self) {
        let period = Duration::from_secs(u64::from(self.ttl_secs / 2).max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.announce().await {
                warn!("announce: {e}");
            }
        }
    }

    /// PUT `record` to `{relay}/{identity}`.
    async fn push(&self, relay: &str, record: &SignedRecord) {
        let url = format!("{relay}/{}", record.identity);
        match self
            .client
            .put(&url)
            .json(record)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => {
                info!("announce: published host record to {relay}");
            }
            Ok(r) => {
                warn!("announce: {relay} returned {}", r.status());
            }
            Err(e) => {
                warn!("announce: publishing to {relay} failed: {e}");
            }
        }
    }
}
