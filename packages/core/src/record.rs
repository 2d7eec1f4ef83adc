//! Endpoint records: where an identity's data can be reached.
//!
//! An identity announces its endpoints by publishing a [`SignedRecord`] to the
//! lookup network. Anyone holding the record can check it against the
//! identity's own key, so relays and caches never have to be trusted.
//!
//! A resolver turns a verified record into an [`EndpointRecord`]: the same
//! endpoint list with an absolute expiry attached.
//!
//! # Endpoint targets
//!
//! | Target | Meaning |
//! |---|---|
//! | [`Target::Url`] | A direct HTTP(S) base URL, e.g. `https://host.example.com` |
//! | [`Target::Host`] | Delegation: "my data lives at the host whose identity is X" |
//!
//! Lower [`Endpoint::priority`] values are preferred (the SVCB/SRV convention).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{Keypair, PublicIdentity};
use crate::signing::{canonical_bytes, decode_signature, encode_signature};

/// Errors returned when signing or verifying a [`SignedRecord`].
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("record has no endpoints")]
    NoEndpoints,
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),
    #[error("signature decoding failed: {0}")]
    DecodingFailed(String),
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Where an endpoint points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Target {
    Url(String),
    Host(PublicIdentity),
}

/// One entry of an endpoint list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub target: Target,
    /// Lower is preferred.
    #[serde(default)]
    pub priority: u16,
}

impl Endpoint {
    pub fn url(url: impl Into<String>, priority: u16) -> Self {
        Self {
            target: Target::Url(url.into().trim_end_matches('/').to_string()),
            priority,
        }
    }

    pub fn host(host: PublicIdentity, priority: u16) -> Self {
        Self {
            target: Target::Host(host),
            priority,
        }
    }
}

/// A resolved, time-bounded endpoint list for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRecord {
    pub identity: PublicIdentity,
    pub endpoints: Vec<Endpoint>,
    pub expiry: DateTime<Utc>,
}

impl EndpointRecord {
    /// A record for `identity` that expires `ttl` after `now`.
    pub fn new(
        identity: PublicIdentity,
        endpoints: Vec<Endpoint>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            identity,
            endpoints,
            expiry: now + ttl,
        }
    }

    /// Endpoints in preference order. Ties keep their published order.
    pub fn ranked(&self) -> Vec<&Endpoint> {
        let mut ranked: Vec<&Endpoint> = self.endpoints.iter().collect();
        ranked.sort_by_key(|e| e.priority);
        ranked
    }
}

/// The signed, publishable form of an identity's endpoint list.
///
/// ```json
/// {
///   "identity": "8pinxxgqs41n4aididenw5apqp1urfmzdztr8jt4abrkdn435ewo",
///   "endpoints": [{ "target": { "type": "url", "value": "https://host.example.com" }, "priority": 0 }],
///   "ttl_secs": 300,
///   "timestamp": 1760000000000000,
///   "signature": "z3Jx…"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRecord {
    pub identity: PublicIdentity,
    pub endpoints: Vec<Endpoint>,
    /// How long resolvers may cache this record.
    pub ttl_secs: u32,
    /// Microseconds since the Unix epoch at signing time. Newer records
    /// replace older ones on relays.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
}

impl SignedRecord {
    /// Build and sign a record for `keypair`'s identity, timestamped now.
    pub fn sign(
        keypair: &Keypair,
        endpoints: Vec<Endpoint>,
        ttl_secs: u32,
    ) -> Result<Self, RecordError> {
        if endpoints.is_empty() {
            return Err(RecordError::NoEndpoints);
        }

        let mut record = Self {
            identity: keypair.public_identity(),
            endpoints,
            ttl_secs,
            timestamp: Utc::now().timestamp_micros(),
            signature: String::new(),
        };
        let payload = canonical_bytes(&record).map_err(RecordError::Canonicalization)?;
        record.signature = encode_signature(&keypair.sign(&payload));
        Ok(record)
    }

    /// Check the signature against the record's own identity.
    pub fn verify(&self) -> Result<(), RecordError> {
        if self.endpoints.is_empty() {
            return Err(RecordError::NoEndpoints);
        }

        let signature = decode_signature(&self.signature).map_err(RecordError::DecodingFailed)?;

        let mut unsigned = self.clone();
        unsigned.signature = String::new();
        let payload = canonical_bytes(&unsigned).map_err(RecordError::Canonicalization)?;

        if self.identity.verify(&payload, &signature) {
            Ok(())
        } else {
            Err(RecordError::VerificationFailed)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
