//! HTTP record relays, the production lookup backend.
//!
//! A relay stores the latest [`SignedRecord`] per identity:
//!
//! | Method | Path | Result |
//! |--------|------|--------|
//! | GET | `{relay}/{identity}` | `200` + record, or `404` |
//! | PUT | `{relay}/{identity}` | `204`; `400` bad record; `409` stale record |
//!
//! Relays are queried in configured order and the first record that verifies
//! wins. Publishing goes to every relay and succeeds when at least one
//! accepts.

use async_trait::async_trait;
use keyhost_core::{PublicIdentity, SignedRecord};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::backend::{BackendError, LookupAnswer, LookupBackend};

pub struct RelayBackend {
    http: Client,
    relays: Vec<String>,
}

impl RelayBackend {
    pub fn new(http: Client, relays: Vec<String>) -> Self {
        Self {
            http,
            relays: relays
                .into_iter()
                .map(|r| r.trim_end_matches('/').to_string())
                .collect(),
        }
    }

    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    fn record_url(relay: &str, identity: &PublicIdentity) -> String {
        format!("{relay}/{identity}")
    }
}

#[async_trait]
impl LookupBackend for RelayBackend {
    async fn lookup(&self, identity: &PublicIdentity) -> Result<Option<LookupAnswer>, BackendError> {
        let mut not_found = false;
        let mut last_error = BackendError::Unreachable("no relays configured".into());

        for relay in &self.relays {
            let url = Self::record_url(relay, identity);
            let resp = match self.http.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(%url, error = %e, "relay unreachable");
                    last_error = BackendError::Unreachable(format!("{url}: {e}"));
                    continue;
                }
            };

            match resp.status() {
                StatusCode::NOT_FOUND => {
                    debug!(%url, "relay has no record");
                    not_found = true;
                    continue;
                }
                s if !s.is_success() => {
                    warn!(%url, status = %s, "relay lookup failed");
                    last_error = BackendError::Unreachable(format!("{url} answered {s}"));
                    continue;
                }
                _ => {}
            }

            match resp.json::<SignedRecord>().await {
                Ok(record) if record.identity != *identity => {
                    warn!(%url, "relay served a record for another identity");
                    last_error = BackendError::Malformed(format!(
                        "{url} served a record for {}",
                        record.identity
                    ));
                }
                Ok(record) => match record.verify() {
                    Ok(()) => return Ok(Some(LookupAnswer::Signed(record))),
                    Err(e) => {
                        warn!(%url, error = %e, "relay served an unverifiable record");
                        last_error = BackendError::Malformed(format!("{url}: {e}"));
                    }
                },
                Err(e) => {
                    warn!(%url, error = %e, "relay response is not a record");
                    last_error = BackendError::Malformed(format!("{url}: {e}"));
                }
            }
        }

        if not_found {
            Ok(None)
        } else {
            Err(last_error)
        }
    }

    async fn publish(&self, record: &SignedRecord) -> Result<(), BackendError> {
        let mut accepted = 0usize;
        let mut last_error = BackendError::Unreachable("no relays configured".into());

        for relay in &self.relays {
            let url = Self::record_url(relay, &record.identity);
            match self.http.put(&url).json(record).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(%url, "record accepted");
                    accepted += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    warn!(%url, %status, "relay rejected record");
                    last_error = BackendError::Rejected(format!("{url} answered {status}"));
                }
                Err(e) => {
                    warn!(%url, error = %e, "relay unreachable");
                    last_error = BackendError::Unreachable(format!("{url}: {e}"));
                }
            }
        }

        if accepted == 0 {
            return Err(last_error);
        }
        info!(identity = %record.identity, accepted, "published endpoint record");
        Ok(())
    }
}
