//! Signed authentication tokens for signup and login.
//!
//! The private key never leaves the client. To prove possession of it, the
//! client signs a short statement binding together *who* (its identity),
//! *where* (the host's identity), *why* (signup or login), *when* (a Unix
//! timestamp) and a random nonce. A host accepts the token only if all of
//! these check out:
//!
//! - the signature verifies against `identity`,
//! - `host` is the host's own identity (tokens cannot be replayed elsewhere),
//! - `purpose` matches the endpoint,
//! - `timestamp` is within [`AuthToken::MAX_SKEW_SECS`] of the host clock,
//! - the nonce has not been seen before (tracked by the host).
//!
//! # Signing string
//!
//! ```text
//! keyhost-auth:v1
//! {purpose}
//! {identity}
//! {host}
//! {timestamp}
//! {nonce}
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{Keypair, PublicIdentity};
use crate::signing::{decode_signature, encode_signature};

/// Errors returned by [`AuthToken::verify`].
#[derive(Debug, Error, PartialEq)]
pub enum AuthTokenError {
    #[error("token was issued for host {0}")]
    WrongHost(PublicIdentity),
    #[error("token purpose is {0}, expected {1}")]
    WrongPurpose(AuthPurpose, AuthPurpose),
    #[error("token timestamp is {0}s from host clock (max {max}s allowed)", max = AuthToken::MAX_SKEW_SECS)]
    ClockSkew(i64),
    #[error("signature decoding failed: {0}")]
    DecodingFailed(String),
    #[error("signature verification failed")]
    VerificationFailed,
}

/// What the token authorises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPurpose {
    Signup,
    Login,
}

impl fmt::Display for AuthPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthPurpose::Signup => write!(f, "signup"),
            AuthPurpose::Login => write!(f, "login"),
        }
    }
}

/// A time-bound, host-bound proof of key possession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub identity: PublicIdentity,
    pub host: PublicIdentity,
    pub purpose: AuthPurpose,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// 16 random bytes, hex-encoded.
    pub nonce: String,
    pub signature: String,
}

impl AuthToken {
    pub const NAMESPACE: &'static str = "keyhost-auth:v1";

    /// Replay window on either side of the host clock.
    pub const MAX_SKEW_SECS: i64 = 300;

    /// Sign a fresh token for `host`, timestamped now.
    pub fn sign(keypair: &Keypair, host: &PublicIdentity, purpose: AuthPurpose) -> Self {
        Self::sign_at(keypair, host, purpose, Utc::now())
    }

    /// Sign a token with an explicit timestamp.
    pub fn sign_at(
        keypair: &Keypair,
        host: &PublicIdentity,
        purpose: AuthPurpose,
        at: DateTime<Utc>,
    ) -> Self {
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        let mut token = Self {
            identity: keypair.public_identity(),
            host: *host,
            purpose,
            timestamp: at.timestamp(),
            nonce: hex::encode(nonce),
            signature: String::new(),
        };
        token.signature = encode_signature(&keypair.sign(token.signing_string().as_bytes()));
        token
    }

    fn signing_string(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            Self::NAMESPACE,
            self.purpose,
            self.identity,
            self.host,
            self.timestamp,
            self.nonce
        )
    }

    /// Check the token on the host side. Nonce replay is the caller's job.
    pub fn verify(
        &self,
        host: &PublicIdentity,
        purpose: AuthPurpose,
        now: DateTime<Utc>,
    ) -> Result<(), AuthTokenError> {
        if self.host != *host {
            return Err(AuthTokenError::WrongHost(self.host));
        }
        if self.purpose != purpose {
            return Err(AuthTokenError::WrongPurpose(self.purpose, purpose));
        }

        let skew = now
            .timestamp()
            .checked_sub(self.timestamp)
            .and_then(i64::checked_abs)
            .unwrap_or(i64::MAX);
        if skew > Self::MAX_SKEW_SECS {
            return Err(AuthTokenError::ClockSkew(skew));
        }

        let signature = decode_signature(&self.signature).map_err(AuthTokenError::DecodingFailed)?;
        if self
            .identity
            .verify(self.signing_string().as_bytes(), &signature)
        {
            Ok(())
        } else {
            Err(AuthTokenError::VerificationFailed)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
