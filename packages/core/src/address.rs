//! Resource addressing: `pk://<identity>/<path…>` URLs.
//!
//! A [`ResourceAddress`] names one stored item by *who* owns it (the
//! [`PublicIdentity`]) and *what* it is (the path), independent of which
//! physical host currently serves it. Turning an address into a transport URL
//! requires an endpoint base, which the resolver supplies.
//!
//! # Format
//!
//! ```text
//! pk://8pinxxgqs41n4aididenw5apqp1urfmzdztr8jt4abrkdn435ewo/pub/example.com/demo.json
//! └──┘ └──────────────────────────────────────────────────┘ └──────────────────────┘
//! scheme            z-base-32 public identity                      path segments
//! ```
//!
//! By convention the first segment `pub` marks data a host serves to anyone.
//! The convention belongs to the host; addresses only expose it via
//! [`ResourceAddress::is_public`].
//!
//! A trailing `/` marks a directory address, used for listings.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use urlencoding::encode;

use crate::identity::{IdentityError, PublicIdentity};

/// The URL scheme for resource addresses.
pub const SCHEME: &str = "pk";

/// First path segment that hosts treat as publicly readable.
pub const PUBLIC_SEGMENT: &str = "pub";

/// Errors that can occur when parsing a resource address.
#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("missing 'pk://' scheme in address: '{0}'")]
    MissingScheme(String),

    #[error("empty identity in address: '{0}'")]
    EmptyIdentity(String),

    #[error("invalid identity in address '{address}': {source}")]
    InvalidIdentity {
        address: String,
        source: IdentityError,
    },

    #[error("invalid path segment {segment:?} in address '{address}'")]
    InvalidSegment { address: String, segment: String },
}

/// A parsed `pk://` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    /// The owner of the addressed data.
    pub identity: PublicIdentity,
    /// Path segments, never empty strings, never `.` or `..`.
    pub path: Vec<String>,
    /// `true` when the address ends in `/`.
    pub directory: bool,
}

impl ResourceAddress {
    /// Construct from pre-validated parts. The result addresses a file.
    pub fn new<I, S>(identity: PublicIdentity, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity,
            path: path.into_iter().map(Into::into).collect(),
            directory: false,
        }
    }

    /// Parse a `pk://identity/path` string.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let rest = s
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| AddressError::MissingScheme(s.to_string()))?;

        let (identity_str, path_str) = match rest.split_once('/') {
            Some((id, path)) => (id, path),
            None => (rest, ""),
        };

        if identity_str.is_empty() {
            return Err(AddressError::EmptyIdentity(s.to_string()));
        }

        let identity =
            PublicIdentity::decode(identity_str).map_err(|source| AddressError::InvalidIdentity {
                address: s.to_string(),
                source,
            })?;

        let directory = path_str.is_empty() || path_str.ends_with('/');
        let trimmed = path_str.strip_suffix('/').unwrap_or(path_str);

        let mut path = Vec::new();
        if !trimmed.is_empty() {
            for segment in trimmed.split('/') {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return Err(AddressError::InvalidSegment {
                        address: s.to_string(),
                        segment: segment.to_string(),
                    });
                }
                path.push(segment.to_string());
            }
        }

        Ok(Self {
            identity,
            path,
            directory,
        })
    }

    /// Mark this address as a directory (trailing `/`).
    pub fn into_directory(mut self) -> Self {
        self.directory = true;
        self
    }

    /// The path joined with `/`, without a leading slash.
    pub fn path_string(&self) -> String {
        let mut joined = self.path.join("/");
        if self.directory && !joined.is_empty() {
            joined.push('/');
        }
        joined
    }

    /// `true` when the first segment is [`PUBLIC_SEGMENT`].
    pub fn is_public(&self) -> bool {
        self.path.first().map(String::as_str) == Some(PUBLIC_SEGMENT)
    }

    /// `{base}/{identity}/{segments…}` with every segment percent-encoded.
    pub fn endpoint_url(&self, base: &str) -> String {
        let mut url = format!("{}/{}", base.trim_end_matches('/'), self.identity);
        for segment in &self.path {
            url.push('/');
            url.push_str(&encode(segment));
        }
        if self.directory {
            url.push('/');
        }
        url
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}/{}", self.identity, self.path_string())
    }
}

impl FromStr for ResourceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
