//! `keyhost-node`: keyhost reference storage host and record relay.
//!
//! # Quick start
//!
//! ```sh
//! # In-memory host on the default port:
//! keyhost-node
//!
//! # Stable identity, public URL and an external relay to announce to:
//! KEYHOST_SECRET=<64 hex chars> \
//! KEYHOST_PUBLIC_URL=https://host.example.com \
//! KEYHOST_RELAYS=https://relay.keyhost.dev \
//!   keyhost-node
//! ```
//!
//! # Environment variables
//!
//! See [`keyhost_node::NodeConfig`] for the full list.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use keyhost_node::{build_router, Announcer, HostIdentity, MemoryStorage, NodeConfig, Storage};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyhost_node=info,tower_http=debug".into()),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = NodeConfig::from_env()?;

    tracing::info!("storage: in-memory (data will not survive restart)");
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

    let identity = HostIdentity::load_or_generate(&storage, config.secret_hex.as_deref()).await?;
    let host = identity.public_identity();
    tracing::info!("host identity: {host}");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let announcer = Announcer::new(
        client,
        Arc::clone(&storage),
        identity.keypair().clone(),
        config.public_url.clone(),
        config.relays.clone(),
        config.record_ttl_secs,
    );
    // Publish once before serving so the host resolves from its own relay
    // immediately, then keep republishing in the background.
    announcer.announce().await?;
    tokio::spawn(announcer.run());

    let app = build_router(Arc::clone(&storage), config.clone(), host);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {} (public url {})", config.bind_addr, config.public_url);
    axum::serve(listener, app).await?;
    Ok(())
}
