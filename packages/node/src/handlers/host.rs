//! Host discovery handler for `GET /.well-known/keyhost`.

use axum::{extract::State, Json};
use keyhost_api::{Capability, HostInfo};

use super::AppState;

/// `GET /.well-known/keyhost`
///
/// Returns this host's discovery document. Clients use it to learn the
/// identity their auth tokens must name.
pub async fn well_known(State(state): State<AppState>) -> Json<HostInfo> {
    let mut info = HostInfo::new(state.host, &state.config.public_url);
    info.name = state.config.name.clone();
    info.capabilities = vec![Capability::Signup, Capability::List, Capability::Relay];
    Json(info)
}
