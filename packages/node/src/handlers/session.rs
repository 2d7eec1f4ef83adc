//! Account and session handlers.
//!
//! - `POST   /signup`  create an account and its first session.
//! - `POST   /session` log in to an existing account.
//! - `GET    /session` echo the caller's session.
//! - `DELETE /session` revoke the caller's session.
//!
//! Signup and login take a signed [`AuthToken`] as the body. The bearer
//! credential is returned only in their responses.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use keyhost_api::SessionResponse;
use keyhost_core::{AuthPurpose, AuthToken, PublicIdentity};
use rand::{rngs::OsRng, RngCore};
use tracing::info;

use crate::error::AppError;
use crate::middleware::auth::{accept_auth_token, RequireSession};
use crate::storage::StoredSession;

use super::AppState;

/// `POST /signup`
///
/// Returns 401 for an invalid or replayed token, 409 if the identity already
/// has an account here, and 201 with a fresh session otherwise.
pub async fn signup(
    State(state): State<AppState>,
    Json(token): Json<AuthToken>,
) -> Result<impl IntoResponse, AppError> {
    accept_auth_token(&state, &token, AuthPurpose::Signup).await?;

    state
        .storage
        .create_account(&token.identity, Utc::now())
        .await?;
    info!(identity = %token.identity, "account created");

    let session = issue_session(&state, token.identity).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /session`
///
/// Returns 401 for an invalid or replayed token or an unknown identity, and
/// 200 with a fresh session otherwise.
pub async fn login(
    State(state): State<AppState>,
    Json(token): Json<AuthToken>,
) -> Result<impl IntoResponse, AppError> {
    accept_auth_token(&state, &token, AuthPurpose::Login).await?;

    if !state.storage.account_exists(&token.identity).await? {
        return Err(AppError::Unauthorized(format!(
            "no account for {}",
            token.identity
        )));
    }
    info!(identity = %token.identity, "session opened");

    let session = issue_session(&state, token.identity).await?;
    Ok((StatusCode::OK, Json(session)))
}

/// `GET /session`
pub async fn get_session(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
) -> Json<SessionResponse> {
    Json(to_response(&state, &session).without_token())
}

/// `DELETE /session`
pub async fn delete_session(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
) -> Result<impl IntoResponse, AppError> {
    state.storage.delete_session(&session.token).await?;
    info!(identity = %session.identity, "session revoked");
    Ok(StatusCode::NO_CONTENT)
}

async fn issue_session(
    state: &AppState,
    identity: PublicIdentity,
) -> Result<SessionResponse, AppError> {
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);

    let now = Utc::now();
    let ttl = i64::try_from(state.config.session_ttl_secs).unwrap_or(i64::MAX);
    let session = StoredSession {
        token: hex::encode(secret),
        identity,
        created_at: now,
        expires_at: now + Duration::seconds(ttl),
    };
    state.storage.put_session(&session).await?;
    Ok(to_response(state, &session))
}

fn to_response(state: &AppState, session: &StoredSession) -> SessionResponse {
    SessionResponse {
        identity: session.identity,
        host: state.host,
        created_at: session.created_at,
        expires_at: session.expires_at,
        token: Some(session.token.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
