//! Host discovery types for `GET /.well-known/keyhost`.

use keyhost_core::PublicIdentity;
use serde::{Deserialize, Serialize};

/// Optional features a host advertises in its discovery document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Accepts new accounts via `POST /signup`.
    Signup,
    /// Serves directory listings for addresses ending in `/`.
    List,
    /// Hosts a record relay under `/relay`.
    Relay,
}

/// The response body for `GET /.well-known/keyhost`.
///
/// # Example
///
/// ```json
/// {
///   "identity": "8pinxxgqs41n4aididenw5apqp1urfmzdztr8jt4abrkdn435ewo",
///   "name": "Example Host",
///   "protocol_version": "1.0",
///   "public_url": "https://host.example.com",
///   "capabilities": ["signup", "list", "relay"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostInfo {
    /// The host's own identity. Auth tokens must be minted for it.
    pub identity: PublicIdentity,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub protocol_version: String,

    /// Base URL under which this host serves `/{identity}/{path}`.
    pub public_url: String,

    pub capabilities: Vec<Capability>,
}

impl HostInfo {
    pub const PROTOCOL_VERSION: &'static str = "1.0";

    pub fn new(identity: PublicIdentity, public_url: impl Into<String>) -> Self {
        Self {
            identity,
            name: None,
            protocol_version: Self::PROTOCOL_VERSION.to_string(),
            public_url: public_url.into(),
            capabilities: vec![Capability::Signup],
        }
    }
}
