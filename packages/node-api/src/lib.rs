//! Request and response types for the keyhost HTTP API.
//!
//! Shared by the client (`keyhost`) and the reference host (`keyhost-node`)
//! so both ends agree on every payload.
//!
//! # Endpoints covered
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | GET | `/.well-known/keyhost` | → [`HostInfo`] |
//! | POST | `/signup` | [`AuthToken`] → [`SessionResponse`] |
//! | POST | `/session` | [`AuthToken`] → [`SessionResponse`] |
//! | GET | `/session` | → [`SessionResponse`] (no token) |
//! | DELETE | `/session` | → `204` |
//! | PUT/GET/DELETE | `/{identity}/{path}` | raw bytes |
//! | GET | `/relay/{identity}` | → [`SignedRecord`] |
//! | PUT | `/relay/{identity}` | [`SignedRecord`] → `204` |
//!
//! Errors on every endpoint use [`ErrorResponse`].
//!
//! [`AuthToken`]: keyhost_core::AuthToken
//! [`SignedRecord`]: keyhost_core::SignedRecord

pub mod error;
pub mod host;
pub mod session;

pub use error::{codes, ErrorResponse};
pub use host::{Capability, HostInfo};
pub use session::{SessionResponse, BEARER};

/// Path of the host discovery document.
pub const WELL_KNOWN_PATH: &str = "/.well-known/keyhost";

/// Path prefix under which a host mounts its record relay.
pub const RELAY_PREFIX: &str = "/relay";
