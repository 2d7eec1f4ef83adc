//! Pure-logic primitives for keyhost.
//!
//! This crate has **no I/O**: no networking, filesystem or async
//! runtime. It defines what an identity is, how resource addresses are
//! spelled, and how endpoint records and authentication tokens are signed
//! and checked. The client (`keyhost`) and the reference host
//! (`keyhost-node`) both build on it, so the two sides of every signature
//! share one implementation.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`identity`] | [`Keypair`], [`PublicIdentity`] and the z-base-32 text form |
//! | [`address`] | `pk://identity/path` parsing via [`ResourceAddress`] |
//! | [`record`] | [`SignedRecord`] publication format and [`EndpointRecord`] |
//! | [`auth`] | [`AuthToken`] proofs of key possession for signup and login |
//! | [`signing`] | JCS canonicalisation and signature encoding helpers |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use keyhost_core::{Keypair, ResourceAddress};
//!
//! let keypair = Keypair::generate();
//! let me = keypair.public_identity();
//!
//! let address: ResourceAddress = format!("pk://{me}/pub/example.com/demo.json").parse()?;
//! assert!(address.is_public());
//! ```

pub mod address;
pub mod auth;
pub mod identity;
pub mod record;
pub mod signing;

pub use address::{AddressError, ResourceAddress};
pub use auth::{AuthPurpose, AuthToken, AuthTokenError};
pub use identity::{IdentityError, Keypair, PublicIdentity};
pub use record::{Endpoint, EndpointRecord, RecordError, SignedRecord, Target};
