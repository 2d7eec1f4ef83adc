//! Client error taxonomy.

use keyhost_core::{AddressError, IdentityError, PublicIdentity};
use thiserror::Error;

/// Every failure a [`Client`](crate::Client) operation can report.
///
/// HTTP error statuses on data requests are *not* errors: they come back in
/// [`Response`](crate::Response). Only the session endpoints translate host
/// statuses into variants here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("malformed identity '{input}': {reason}")]
    MalformedIdentity { input: String, reason: String },

    #[error(transparent)]
    MalformedAddress(#[from] AddressError),

    #[error("resolution failed: {reason}")]
    ResolutionFailed { reason: String },

    #[error("identity is already registered at this host")]
    SignupConflict,

    #[error("signup rejected by host (status {status})")]
    SignupRejected { status: u16 },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("no session for {0}")]
    NotAuthenticated(PublicIdentity),

    #[error("network error: {cause}")]
    NetworkError {
        #[from]
        cause: reqwest::Error,
    },

    #[error("unexpected host response (status {status})")]
    HostError { status: u16 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn resolution(reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            reason: reason.into(),
        }
    }
}

impl From<IdentityError> for Error {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidKeyMaterial(msg) => Self::InvalidKeyMaterial(msg),
            IdentityError::MalformedIdentity { input, reason } => {
                Self::MalformedIdentity { input, reason }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
