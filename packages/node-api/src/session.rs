//! Session types: `POST /signup`, `POST /session`, `GET/DELETE /session`.
//!
//! Signup and login both take a signed [`AuthToken`] as the request body and
//! answer with a [`SessionResponse`] carrying the bearer token. The token is
//! returned exactly once, at creation; `GET /session` echoes the session
//! without it.
//!
//! [`AuthToken`]: keyhost_core::AuthToken

use chrono::{DateTime, Utc};
use keyhost_core::PublicIdentity;
use serde::{Deserialize, Serialize};

/// `Authorization` header scheme for session credentials.
pub const BEARER: &str = "Bearer";

/// A session as reported by the host.
///
/// # Example
///
/// ```json
/// {
///   "identity": "o4dksfbqk85ogzdb5osziw6befigbuxmuxkuxq8434q89uj56uyy",
///   "host": "8pinxxgqs41n4aididenw5apqp1urfmzdztr8jt4abrkdn435ewo",
///   "created_at": "2026-10-18T12:00:00Z",
///   "expires_at": "2026-10-19T12:00:00Z",
///   "token": "9f2c…"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    pub identity: PublicIdentity,
    pub host: PublicIdentity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Bearer credential. Present only in signup and login responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl SessionResponse {
    /// The same session with the credential removed.
    pub fn without_token(mut self) -> Self {
        self.token = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyhost_core::Keypair;

    #[test]
    fn token_omitted_when_absent() {
        let resp = SessionResponse {
            identity: Keypair::generate().public_identity(),
            host: Keypair::generate().public_identity(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
            token: Some("secret".into()),
        }
        .without_token();
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("token").is_none());
    }
}
