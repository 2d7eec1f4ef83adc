//! Identity: Ed25519 keypair and z-base-32 public identity.
//!
//! A [`Keypair`] is the only authentication factor in keyhost. It never leaves
//! the process that created it; the *host* application is responsible for
//! persisting [`Keypair::secret`] and handing it back on restart.
//!
//! The [`PublicIdentity`] is the public half, used both as the addressing
//! token in `pk://` URLs and as the authorization subject on storage hosts.
//!
//! # Text encoding
//!
//! ```text
//! 32-byte Ed25519 public key ──z-base-32──▶ 52 lowercase characters
//! ```
//!
//! z-base-32 avoids visually ambiguous characters, so identities can be read
//! aloud or copied by hand.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a raw Ed25519 secret key.
pub const SECRET_LEN: usize = 32;

/// Length of the z-base-32 text form of a public identity.
pub const ENCODED_LEN: usize = 52;

/// Errors produced while importing keys or decoding identities.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("malformed identity {input:?}: {reason}")]
    MalformedIdentity { input: String, reason: String },
}

// ── Keypair ──────────────────────────────────────────────────────────────────

/// An Ed25519 keypair.
///
/// The public key is derived deterministically from the 32-byte secret, so
/// restoring from the same secret always yields the same [`PublicIdentity`].
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair using OS randomness.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restore a keypair from a previously saved 32-byte secret.
    pub fn from_secret(secret: &[u8]) -> Result<Self, IdentityError> {
        let bytes: [u8; SECRET_LEN] = secret.try_into().map_err(|_| {
            IdentityError::InvalidKeyMaterial(format!(
                "secret must be {SECRET_LEN} bytes, got {}",
                secret.len()
            ))
        })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&bytes),
        })
    }

    /// Restore a keypair from a hex-encoded secret (64 hex characters).
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, IdentityError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| IdentityError::InvalidKeyMaterial(format!("invalid hex: {e}")))?;
        Self::from_secret(&bytes)
    }

    /// The raw 32-byte secret. **Keep this secret.**
    pub fn secret(&self) -> [u8; SECRET_LEN] {
        self.signing_key.to_bytes()
    }

    /// The public identity derived from this keypair.
    pub fn public_identity(&self) -> PublicIdentity {
        PublicIdentity(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign `message`, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public_identity())
            .finish_non_exhaustive()
    }
}

// ── PublicIdentity ───────────────────────────────────────────────────────────

/// A 32-byte Ed25519 public key acting as a self-certifying address.
///
/// Equality, ordering and hashing are over the raw key bytes. The value is
/// always a valid curve point: every constructor checks it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicIdentity([u8; 32]);

impl PublicIdentity {
    /// Wrap raw public-key bytes, rejecting anything that is not a valid
    /// Ed25519 point.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, IdentityError> {
        VerifyingKey::from_bytes(bytes)
            .map_err(|e| IdentityError::InvalidKeyMaterial(format!("invalid Ed25519 key: {e}")))?;
        Ok(Self(*bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The canonical z-base-32 text form.
    pub fn encode(&self) -> String {
        z32::encode(&self.0)
    }

    /// Parse the canonical z-base-32 text form.
    pub fn decode(input: &str) -> Result<Self, IdentityError> {
        let malformed = |reason: &str| IdentityError::MalformedIdentity {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if input.len() != ENCODED_LEN {
            return Err(malformed(&format!(
                "expected {ENCODED_LEN} characters, got {}",
                input.len()
            )));
        }

        let decoded =
            z32::decode(input.as_bytes()).map_err(|_| malformed("not valid z-base-32"))?;
        let bytes: [u8; 32] = decoded
            .get(..32)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| malformed("decoded key is shorter than 32 bytes"))?;

        let identity = Self::from_bytes(&bytes).map_err(|_| malformed("not an Ed25519 public key"))?;

        // Reject non-canonical spellings so that equal identities always have
        // equal text.
        if identity.encode() != input {
            return Err(malformed("non-canonical encoding"));
        }
        Ok(identity)
    }

    /// Verify a 64-byte Ed25519 `signature` over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        key.verify(message, &Signature::from_bytes(signature)).is_ok()
    }
}

impl fmt::Display for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for PublicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicIdentity({})", self.encode())
    }
}

impl FromStr for PublicIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for PublicIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PublicIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
