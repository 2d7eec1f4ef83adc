//! Shared helpers for the keyhost end-to-end test suite.
//!
//! Provides [`spawn_testnet`], which binds a `TcpListener` on an ephemeral
//! port, wires up an in-process host backed by `MemoryStorage`, and returns a
//! [`Testnet`] handle. The handle carries a [`StaticRegistry`] with the host
//! pinned in it, so any number of clients built from it share one lookup
//! network, and the host's storage so tests can inspect it directly.

use std::io;
use std::sync::Arc;

use keyhost::{Client, ClientConfig, NetworkProfile, StaticRegistry};
use keyhost_api::RELAY_PREFIX;
use keyhost_core::{Keypair, PublicIdentity};
use keyhost_node::{build_router, Announcer, HostIdentity, MemoryStorage, NodeConfig, Storage};

/// A running in-process testnet.
pub struct Testnet {
    /// Lookup network shared by every client from [`Testnet::client`].
    pub registry: StaticRegistry,
    /// The host's identity.
    pub host: PublicIdentity,
    /// Base URL of the host, e.g. `http://127.0.0.1:51234`.
    pub host_url: String,
    /// The storage instance the host serves from.
    pub storage: Arc<MemoryStorage>,
}

impl Testnet {
    /// A fresh client on the shared registry. Clients never share sessions.
    pub fn client(&self) -> keyhost::Result<Client> {
        Client::testnet(self.registry.clone())
    }

    /// Start another host and pin it into the shared registry.
    pub async fn add_host(&self) -> io::Result<TestHost> {
        let host = spawn_host().await?;
        self.registry.pin_host(host.identity, host.url.clone());
        Ok(host)
    }

    /// Base URL of the host's record relay.
    pub fn relay_url(&self) -> String {
        format!("{}{RELAY_PREFIX}", self.host_url)
    }

    /// A client resolving through the host's relay over HTTP, the way a
    /// mainnet client resolves through public relays.
    pub fn relay_client(&self) -> keyhost::Result<Client> {
        let profile = NetworkProfile::Mainnet {
            relays: vec![self.relay_url()],
        };
        Client::new(ClientConfig::new(profile))
    }
}

/// An extra host started with [`Testnet::add_host`].
pub struct TestHost {
    pub identity: PublicIdentity,
    pub url: String,
    pub storage: Arc<MemoryStorage>,
}

/// Start an ephemeral in-process host and return a [`Testnet`] around it.
///
/// The host runs in a background `tokio` task bound to an OS-assigned port on
/// `127.0.0.1`. Before returning, the host has published its own endpoint
/// record to its relay, so it resolves both through the registry and through
/// the relay.
pub async fn spawn_testnet() -> io::Result<Testnet> {
    let host = spawn_host().await?;
    Ok(Testnet {
        registry: StaticRegistry::new().with_host(host.identity, host.url.clone()),
        host: host.identity,
        host_url: host.url,
        storage: host.storage,
    })
}

async fn spawn_host() -> io::Result<TestHost> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let url = format!("http://{addr}");

    let mem_storage = Arc::new(MemoryStorage::new());
    let storage: Arc<dyn Storage> = Arc::clone(&mem_storage) as Arc<dyn Storage>;

    let identity = HostIdentity::from_keypair(Keypair::generate());
    let host = identity.public_identity();

    let mut config = NodeConfig::for_url(&url);
    config.bind_addr = addr;
    config.name = Some("testnet-host".into());

    Announcer::new(
        reqwest::Client::new(),
        Arc::clone(&storage),
        identity.keypair().clone(),
        url.clone(),
        vec![],
        config.record_ttl_secs,
    )
    .announce()
    .await
    .map_err(io::Error::other)?;

    let router = build_router(storage, config, host);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("testnet host error: {e}");
        }
    });

    Ok(TestHost {
        identity: host,
        url,
        storage: mem_storage,
    })
}
