//! Session management: signup, login, verification and logout.
//!
//! Each identity moves through
//!
//! ```text
//! Unauthenticated ──signup/login──▶ SigningUp ──host accepts──▶ Active
//!                                      │                          │
//!                                      └──failure / cancel──▶ (previous state)
//!                                                                 │
//!                         Invalidated ◀──logout──────────────────┤
//!                         Expired     ◀──verify sees rejection───┘
//! ```
//!
//! A session is committed only after the host has answered. Dropping a
//! signup or login future part-way restores the state it started from.
//! Login and logout for one identity are serialised; different identities
//! never wait on each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use keyhost_api::{SessionResponse, BEARER};
use keyhost_core::{AuthPurpose, AuthToken, Endpoint, Keypair, PublicIdentity, Target};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::resolver::Resolver;

/// TTL of the endpoint record published after a successful signup.
pub const PUBLISHED_RECORD_TTL: Duration = Duration::from_secs(3600);

/// An authenticated session with one host.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: PublicIdentity,
    pub host: PublicIdentity,
    /// Opaque bearer credential issued by the host.
    pub credential: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("host", &self.host)
            .field("credential", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where an identity stands with its host.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    /// A signup or login request is in flight.
    SigningUp,
    Active(Session),
    /// Ended by logout.
    Invalidated,
    /// The host stopped accepting the credential.
    Expired,
}

type StateTable = Mutex<HashMap<PublicIdentity, SessionState>>;

pub struct SessionManager {
    http: Client,
    resolver: Arc<Resolver>,
    states: StateTable,
    locks: Mutex<HashMap<PublicIdentity, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(http: Client, resolver: Arc<Resolver>) -> Self {
        Self {
            http,
            resolver,
            states: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Signup / login
    // -----------------------------------------------------------------------

    /// Create an account for `keypair` at `host` and keep the resulting session.
    ///
    /// On success the identity's endpoint record is republished to point at
    /// `host`. A failed publish is logged; the session stands.
    pub async fn signup(&self, keypair: &Keypair, host: &PublicIdentity) -> Result<Session> {
        let identity = keypair.public_identity();
        let serial = self.lock_for(&identity);
        let _serial = serial.lock().await;

        let base = self.resolver.resolve_url(host).await?;
        let pending = Pending::begin(&self.states, identity);

        let token = AuthToken::sign(keypair, host, AuthPurpose::Signup);
        let resp = self
            .http
            .post(format!("{base}/signup"))
            .json(&token)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            return Err(Error::SignupConflict);
        }
        if !status.is_success() {
            return Err(Error::SignupRejected {
                status: status.as_u16(),
            });
        }

        let session = session_from(resp.json().await?, identity, *host, status)?;
        pending.commit(session.clone());
        info!(%identity, %host, "signed up");

        if let Err(e) = self
            .resolver
            .publish(keypair, vec![Endpoint::host(*host, 0)], PUBLISHED_RECORD_TTL)
            .await
        {
            warn!(%identity, error = %e, "signed up but could not publish endpoint record");
        }

        Ok(session)
    }

    /// Authenticate an existing account at `host`.
    pub async fn login(&self, keypair: &Keypair, host: &PublicIdentity) -> Result<Session> {
        let identity = keypair.public_identity();
        let serial = self.lock_for(&identity);
        let _serial = serial.lock().await;

        let base = self.resolver.resolve_url(host).await?;
        let pending = Pending::begin(&self.states, identity);

        let token = AuthToken::sign(keypair, host, AuthPurpose::Login);
        let resp = self
            .http
            .post(format!("{base}/session"))
            .json(&token)
            .send()
            .await?;

        let status = resp.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                return Err(Error::AuthenticationFailed)
            }
            s if !s.is_success() => return Err(Error::HostError { status: s.as_u16() }),
            _ => {}
        }

        let session = session_from(resp.json().await?, identity, *host, status)?;
        pending.commit(session.clone());
        info!(%identity, %host, "logged in");
        Ok(session)
    }

    /// Log in at whichever host `keypair`'s published record delegates to.
    pub async fn signin(&self, keypair: &Keypair) -> Result<Session> {
        let identity = keypair.public_identity();
        let record = self.resolver.resolve(&identity).await?;
        let host = record
            .ranked()
            .into_iter()
            .find_map(|e| match e.target {
                Target::Host(h) => Some(h),
                Target::Url(_) => None,
            })
            .ok_or_else(|| Error::resolution(format!("record for {identity} names no host")))?;
        self.login(keypair, &host).await
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn current_session(&self, identity: &PublicIdentity) -> Option<Session> {
        match self.state(identity) {
            SessionState::Active(session) => Some(session),
            _ => None,
        }
    }

    pub fn state(&self, identity: &PublicIdentity) -> SessionState {
        lock(&self.states)
            .get(identity)
            .cloned()
            .unwrap_or(SessionState::Unauthenticated)
    }

    /// Ask the host whether the current session is still valid.
    ///
    /// A host that rejects the credential ends the local session. Transport
    /// failures answer `false` and leave it in place.
    pub async fn verify(&self, identity: &PublicIdentity) -> bool {
        let Some(session) = self.current_session(identity) else {
            return false;
        };

        let base = match self.resolver.resolve_url(&session.host).await {
            Ok(base) => base,
            Err(e) => {
                debug!(%identity, error = %e, "cannot reach host to verify session");
                return false;
            }
        };

        let resp = self
            .http
            .get(format!("{base}/session"))
            .header(AUTHORIZATION, format!("{BEARER} {}", session.credential))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => true,
            Ok(r) if matches!(r.status(), StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND) => {
                let mut states = lock(&self.states);
                if let Some(SessionState::Active(current)) = states.get(identity) {
                    if current.credential == session.credential {
                        states.insert(*identity, SessionState::Expired);
                        info!(%identity, "session no longer accepted by host");
                    }
                }
                false
            }
            Ok(r) => {
                debug!(%identity, status = %r.status(), "session check inconclusive");
                false
            }
            Err(e) => {
                debug!(%identity, error = %e, "session check failed");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Logout
    // -----------------------------------------------------------------------

    /// End the session locally, then tell the host. Host failures are logged.
    pub async fn logout(&self, identity: &PublicIdentity) {
        let serial = self.lock_for(identity);
        let _serial = serial.lock().await;

        let previous = lock(&self.states).insert(*identity, SessionState::Invalidated);
        let Some(SessionState::Active(session)) = previous else {
            return;
        };
        info!(%identity, "logged out");

        let base = match self.resolver.resolve_url(&session.host).await {
            Ok(base) => base,
            Err(e) => {
                warn!(%identity, error = %e, "could not reach host to revoke session");
                return;
            }
        };

        match self
            .http
            .delete(format!("{base}/session"))
            .header(AUTHORIZATION, format!("{BEARER} {}", session.credential))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => debug!(%identity, "host revoked session"),
            Ok(r) => warn!(%identity, status = %r.status(), "host refused session revocation"),
            Err(e) => warn!(%identity, error = %e, "could not reach host to revoke session"),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Every active session, for the caller to persist.
    pub fn export_sessions(&self) -> Vec<Session> {
        lock(&self.states)
            .values()
            .filter_map(|s| match s {
                SessionState::Active(session) => Some(session.clone()),
                _ => None,
            })
            .collect()
    }

    /// Restore sessions saved by [`export_sessions`](Self::export_sessions).
    /// Imported sessions replace any local state for the same identity.
    pub fn import_sessions(&self, sessions: impl IntoIterator<Item = Session>) {
        let mut states = lock(&self.states);
        for session in sessions {
            states.insert(session.identity, SessionState::Active(session));
        }
    }

    /// The serialisation lock for `identity`. Locks nobody else holds are
    /// dropped from the table on the way.
    fn lock_for(&self, identity: &PublicIdentity) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = lock(&self.locks);
        locks.retain(|_, l| Arc::strong_count(l) > 1);
        locks.entry(*identity).or_default().clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn session_from(
    body: SessionResponse,
    identity: PublicIdentity,
    host: PublicIdentity,
    status: StatusCode,
) -> Result<Session> {
    if body.identity != identity || body.host != host {
        warn!(%identity, %host, "host answered with a session for someone else");
        return Err(Error::HostError {
            status: status.as_u16(),
        });
    }
    let credential = body.token.ok_or(Error::HostError {
        status: status.as_u16(),
    })?;
    Ok(Session {
        identity,
        host,
        credential,
        created_at: body.created_at,
        expires_at: Some(body.expires_at),
    })
}

// ---------------------------------------------------------------------------
// Pending state guard
// ---------------------------------------------------------------------------

/// Marks an identity `SigningUp` and puts the previous state back on drop
/// unless committed.
struct Pending<'a> {
    states: &'a StateTable,
    identity: PublicIdentity,
    previous: Option<SessionState>,
    committed: bool,
}

impl<'a> Pending<'a> {
    fn begin(states: &'a StateTable, identity: PublicIdentity) -> Self {
        let previous = lock(states).insert(identity, SessionState::SigningUp);
        Self {
            states,
            identity,
            previous,
            committed: false,
        }
    }

    fn commit(mut self, session: Session) {
        lock(self.states).insert(self.identity, SessionState::Active(session));
        self.committed = true;
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut states = lock(self.states);
        match self.previous.take() {
            Some(previous) => states.insert(self.identity, previous),
            None => states.remove(&self.identity),
        };
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticRegistry;

    fn manager() -> SessionManager {
        manager_with(StaticRegistry::new())
    }

    fn manager_with(registry: StaticRegistry) -> SessionManager {
        let resolver = Resolver::new(
            Arc::new(registry),
            Duration::from_secs(60),
            Duration::from_secs(3600),
        );
        SessionManager::new(Client::new(), Arc::new(resolver))
    }

    fn session_for(identity: PublicIdentity) -> Session {
        Session {
            identity,
            host: Keypair::generate().public_identity(),
            credential: "secret-token".into(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn unknown_identity_is_unauthenticated() {
        let id = Keypair::generate().public_identity();
        let sessions = manager();
        assert_eq!(sessions.state(&id), SessionState::Unauthenticated);
        assert!(sessions.current_session(&id).is_none());
    }

    #[test]
    fn pending_guard_restores_previous_state() {
        let sessions = manager();
        let id = Keypair::generate().public_identity();

        {
            let _pending = Pending::begin(&sessions.states, id);
            assert_eq!(sessions.state(&id), SessionState::SigningUp);
            assert!(sessions.current_session(&id).is_none());
        }
        assert_eq!(sessions.state(&id), SessionState::Unauthenticated);

        sessions.import_sessions([session_for(id)]);
        {
            let _pending = Pending::begin(&sessions.states, id);
        }
        assert!(sessions.current_session(&id).is_some());
    }

    #[test]
    fn pending_guard_commits() {
        let sessions = manager();
        let id = Keypair::generate().public_identity();
        Pending::begin(&sessions.states, id).commit(session_for(id));
        assert_eq!(sessions.current_session(&id).unwrap().identity, id);
    }

    #[test]
    fn export_and_import_round_trip() {
        let a = manager();
        let id = Keypair::generate().public_identity();
        a.import_sessions([session_for(id)]);

        let saved = serde_json::to_string(&a.export_sessions()).unwrap();
        let b = manager();
        b.import_sessions(serde_json::from_str::<Vec<Session>>(&saved).unwrap());
        assert_eq!(b.current_session(&id), a.current_session(&id));
    }

    #[tokio::test]
    async fn logout_without_host_still_ends_session() {
        let sessions = manager();
        let id = Keypair::generate().public_identity();
        sessions.import_sessions([session_for(id)]);

        // The session's host is not in the registry, so revocation cannot
        // be delivered.
        sessions.logout(&id).await;
        assert_eq!(sessions.state(&id), SessionState::Invalidated);
        assert!(!sessions.verify(&id).await);
    }

    #[tokio::test]
    async fn verify_without_session_is_false() {
        let sessions = manager();
        assert!(!sessions.verify(&Keypair::generate().public_identity()).await);
    }

    #[tokio::test]
    async fn signup_against_unknown_host_fails_resolution() {
        let sessions = manager();
        let kp = Keypair::generate();
        let host = Keypair::generate().public_identity();
        let err = sessions.signup(&kp, &host).await.unwrap_err();
        assert!(matches!(err, Error::ResolutionFailed { .. }));
        assert_eq!(sessions.state(&kp.public_identity()), SessionState::Unauthenticated);
    }

    /// A host that accepts connections and never answers.
    async fn silent_host() -> (tokio::net::TcpListener, PublicIdentity, StaticRegistry) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let host = Keypair::generate().public_identity();
        (listener, host, StaticRegistry::new().with_host(host, url))
    }

    #[tokio::test]
    async fn cancelled_signup_leaves_identity_unauthenticated() {
        let (_listener, host, registry) = silent_host().await;
        let sessions = manager_with(registry);
        let kp = Keypair::generate();

        let outcome =
            tokio::time::timeout(Duration::from_millis(200), sessions.signup(&kp, &host)).await;
        assert!(outcome.is_err());
        assert_eq!(sessions.state(&kp.public_identity()), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn cancelled_login_keeps_previous_session_and_releases_lock() {
        let (_listener, host, registry) = silent_host().await;
        let sessions = manager_with(registry);
        let kp = Keypair::generate();
        let id = kp.public_identity();
        let previous = session_for(id);
        sessions.import_sessions([previous.clone()]);

        let outcome =
            tokio::time::timeout(Duration::from_millis(200), sessions.login(&kp, &host)).await;
        assert!(outcome.is_err());
        assert_eq!(sessions.state(&id), SessionState::Active(previous));

        // Logout would wait forever on a lock the cancelled login still held.
        tokio::time::timeout(Duration::from_secs(5), sessions.logout(&id))
            .await
            .unwrap();
        assert_eq!(sessions.state(&id), SessionState::Invalidated);
    }

    #[tokio::test]
    async fn login_waits_for_logout_of_same_identity() {
        let (_listener, host, registry) = silent_host().await;
        let sessions = Arc::new(manager_with(registry));
        let kp = Keypair::generate();
        let id = kp.public_identity();

        let serial = sessions.lock_for(&id);
        let held = serial.lock().await;

        let login = tokio::spawn({
            let sessions = Arc::clone(&sessions);
            let kp = kp.clone();
            async move { sessions.login(&kp, &host).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sessions.state(&id), SessionState::Unauthenticated);

        // Another identity is not held up.
        let other = Keypair::generate().public_identity();
        sessions.import_sessions([session_for(other)]);
        tokio::time::timeout(Duration::from_secs(5), sessions.logout(&other))
            .await
            .unwrap();

        drop(held);
        tokio::time::timeout(Duration::from_secs(5), async {
            while sessions.state(&id) != SessionState::SigningUp {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        login.abort();
        let _ = login.await;
        assert_eq!(sessions.state(&id), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn unused_locks_are_dropped() {
        let sessions = manager();
        for _ in 0..100 {
            sessions.logout(&Keypair::generate().public_identity()).await;
        }
        let _serial = sessions.lock_for(&Keypair::generate().public_identity());
        assert_eq!(lock(&sessions.locks).len(), 1);
    }

    #[test]
    fn held_locks_are_kept() {
        let sessions = manager();
        let id = Keypair::generate().public_identity();
        let held = sessions.lock_for(&id);
        let _other = sessions.lock_for(&Keypair::generate().public_identity());
        assert!(Arc::ptr_eq(&held, &sessions.lock_for(&id)));
        assert_eq!(lock(&sessions.locks).len(), 2);
    }

    #[test]
    fn debug_hides_credential() {
        let session = session_for(Keypair::generate().public_identity());
        assert!(!format!("{session:?}").contains("secret-token"));
    }
}
