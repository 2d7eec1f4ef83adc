//! HTTP request handlers for all keyhost host endpoints.
//!
//! Each submodule covers a logical group of endpoints. Handlers are pure
//! async functions that receive Axum extractors and return
//! `Result<impl IntoResponse, AppError>`.
//!
//! All authorization logic (public vs. owner-only paths) lives here, not in
//! storage.

pub mod data;
pub mod host;
pub mod relay;
pub mod session;

use std::sync::Arc;

use keyhost_core::PublicIdentity;

use crate::{config::NodeConfig, storage::Storage};

/// Shared application state threaded through all Axum handlers via [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub config: NodeConfig,
    /// This host's identity. Auth tokens must be minted for it.
    pub host: PublicIdentity,
}
