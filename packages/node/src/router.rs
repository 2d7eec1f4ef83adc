//! Assembles the Axum [`Router`] from all handler modules.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use keyhost_api::{RELAY_PREFIX, WELL_KNOWN_PATH};
use keyhost_core::PublicIdentity;
use tower_http::trace::TraceLayer;

use crate::{
    config::NodeConfig,
    handlers::{data, host, relay, session, AppState},
    storage::Storage,
};

/// Build the complete application router with shared state.
pub fn build_router(storage: Arc<dyn Storage>, config: NodeConfig, host: PublicIdentity) -> Router {
    let state = AppState {
        storage,
        config,
        host,
    };

    Router::new()
        // Host discovery
        .route(WELL_KNOWN_PATH, get(host::well_known))
        // Accounts and sessions
        .route("/signup", post(session::signup))
        .route(
            "/session",
            post(session::login)
                .get(session::get_session)
                .delete(session::delete_session),
        )
        // Record relay
        .route(
            &format!("{RELAY_PREFIX}/{{identity}}"),
            get(relay::get_record).put(relay::put_record),
        )
        // Per-identity data
        .route("/{identity}/", get(data::list_root))
        .route(
            "/{identity}/{*path}",
            get(data::get).put(data::put).delete(data::delete),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
