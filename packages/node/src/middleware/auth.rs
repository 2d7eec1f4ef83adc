//! Session authentication extractors and auth-token checks.
//!
//! Provides two extractors:
//! - [`RequireSession`]: requires a live bearer session; returns 401 if absent, unknown or expired.
//! - [`OptionalSession`]: accepts requests with or without a live bearer session.
//!
//! Also exposes [`accept_auth_token`], which signup and login use to check a
//! signed [`AuthToken`] and burn its nonce.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use keyhost_api::{codes, ErrorResponse, BEARER};
use keyhost_core::{AuthPurpose, AuthToken};
use tracing::debug;

use crate::{error::AppError, handlers::AppState, storage::StoredSession};

// ---------------------------------------------------------------------------
// Auth errors
// ---------------------------------------------------------------------------

/// An authentication failure that maps to HTTP 401.
#[derive(Debug)]
pub struct AuthError(pub String);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(codes::UNAUTHORIZED, self.0);
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// RequireSession extractor
// ---------------------------------------------------------------------------

/// Axum extractor that requires `Authorization: Bearer <token>` naming a
/// live session.
pub struct RequireSession(pub StoredSession);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        let token = bearer_token(parts);
        async move {
            let token = token.ok_or_else(|| AuthError("missing bearer credential".into()))?;
            let session = live_session(&app_state, &token).await.map_err(AuthError)?;
            Ok(RequireSession(session))
        }
    }
}

// ---------------------------------------------------------------------------
// OptionalSession extractor
// ---------------------------------------------------------------------------

/// Axum extractor that accepts requests with or without a live session.
///
/// Yields `Some(session)` if a valid bearer credential is present, `None`
/// otherwise.
pub struct OptionalSession(pub Option<StoredSession>);

impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        let token = bearer_token(parts);
        async move {
            let session = match token {
                Some(token) => live_session(&app_state, &token).await.ok(),
                None => None,
            };
            Ok(OptionalSession(session))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER) || token.trim().is_empty() {
        return None;
    }
    Some(token.trim().to_string())
}

async fn live_session(state: &AppState, token: &str) -> Result<StoredSession, String> {
    let session = state
        .storage
        .get_session(token)
        .await
        .map_err(|e| format!("session lookup failed: {e}"))?
        .ok_or_else(|| "unknown or revoked session".to_string())?;

    if session.is_expired(Utc::now()) {
        debug!(identity = %session.identity, "rejecting expired session");
        return Err("session expired".into());
    }
    Ok(session)
}

// ---------------------------------------------------------------------------
// Auth tokens
// ---------------------------------------------------------------------------

/// Check a signup/login token against this host and record its nonce.
///
/// Rejects tokens for another host or purpose, tokens outside the
/// ±[`AuthToken::MAX_SKEW_SECS`] window, bad signatures and replays.
pub async fn accept_auth_token(
    state: &AppState,
    token: &AuthToken,
    purpose: AuthPurpose,
) -> Result<(), AppError> {
    let now = Utc::now();
    token
        .verify(&state.host, purpose, now)
        .map_err(|e| AppError::Unauthorized(format!("invalid auth token: {e}")))?;

    // Past this point the timestamp check rejects the token anyway.
    let forget_after = now + Duration::seconds(2 * AuthToken::MAX_SKEW_SECS);
    let fresh = state
        .storage
        .record_nonce(&token.nonce, forget_after)
        .await?;
    if !fresh {
        return Err(AppError::Unauthorized("auth token already used".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
