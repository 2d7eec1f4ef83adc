//! Client for public-key-addressed storage hosts.
//!
//! An identity is an Ed25519 public key. It publishes a signed record naming
//! the host that stores its data, signs up or logs in there with a proof of
//! key possession, and then reads and writes `pk://<identity>/<path>`
//! addresses. Anyone can read the public (`pub/`) part of that namespace
//! anonymously.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | [`NetworkProfile`] and [`ClientConfig`], including `KEYHOST_*` env parsing |
//! | [`resolver`] | [`Resolver`] cache over a [`LookupBackend`] ([`RelayBackend`] or [`StaticRegistry`]) |
//! | [`session`] | [`SessionManager`]: signup, login, verify, logout |
//! | [`client`] | [`Client`], [`Request`], [`Response`] and [`Credentials`] |
//! | [`error`] | [`Error`], the single error type for all of the above |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use keyhost::{Client, Credentials, Keypair, Request, StaticRegistry};
//!
//! let registry = StaticRegistry::new().with_host(host_id, "http://127.0.0.1:6286");
//! let client = Client::testnet(registry)?;
//!
//! let keypair = Keypair::generate();
//! client.signup(&keypair, &host_id).await?;
//!
//! let url = format!("pk://{}/pub/example.com/demo.json", keypair.public_identity());
//! client.put(&url, r#"{"foo":"bar"}"#).await?;
//!
//! let anon = client.fetch(Request::get(&url)?.credentials(Credentials::Omit)).await?;
//! assert_eq!(anon.text(), r#"{"foo":"bar"}"#);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod resolver;
pub mod session;

pub use client::{Client, ClientBuilder, Credentials, Method, Request, Response};
pub use config::{ClientConfig, NetworkProfile};
pub use error::{Error, Result};
pub use resolver::{
    BackendError, LookupAnswer, LookupBackend, RelayBackend, Resolver, StaticRegistry,
};
pub use session::{Session, SessionManager, SessionState};

pub use keyhost_core::{Endpoint, EndpointRecord, Keypair, PublicIdentity, ResourceAddress, Target};
