//! Per-identity storage handlers.
//!
//! - `PUT    /{identity}/{*path}`  store a file (owner only).
//! - `GET    /{identity}/{*path}`  read a file; a trailing `/` lists a directory.
//! - `GET    /{identity}/`         list everything the identity stores.
//! - `DELETE /{identity}/{*path}`  remove a file (owner only).
//!
//! Paths under `pub/` are world-readable. Everything else is readable only
//! with the owner's session: anonymous readers get 401 and other identities
//! get 403.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use keyhost_core::{address::SCHEME, PublicIdentity, ResourceAddress};
use tracing::debug;

use crate::error::AppError;
use crate::middleware::auth::{OptionalSession, RequireSession};
use crate::storage::{Entry, StoredSession};

use super::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A validated `/{identity}/{*path}` pair.
struct Target {
    address: ResourceAddress,
    /// Storage key: segments joined with `/`, with a trailing `/` for
    /// directories and empty for the identity's root.
    path: String,
}

impl Target {
    fn parse(identity: &str, path: &str) -> Result<Self, AppError> {
        let address = ResourceAddress::parse(&format!("{SCHEME}://{identity}/{path}"))
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let path = address.path_string();
        Ok(Self { address, path })
    }

    fn owner(&self) -> PublicIdentity {
        self.address.identity
    }

    fn is_directory(&self) -> bool {
        self.address.directory
    }

    /// Read access: public paths for everyone, the rest for the owner only.
    fn authorize_read(&self, session: Option<&StoredSession>) -> Result<(), AppError> {
        if self.address.is_public() {
            return Ok(());
        }
        match session {
            None => Err(AppError::Unauthorized(
                "a session is required to read private data".into(),
            )),
            Some(s) => self.authorize_owner(s),
        }
    }

    fn authorize_owner(&self, session: &StoredSession) -> Result<(), AppError> {
        if session.identity != self.owner() {
            return Err(AppError::Forbidden(format!(
                "session for {} cannot access data of {}",
                session.identity,
                self.owner()
            )));
        }
        Ok(())
    }
}

/// `PUT /{identity}/{*path}`
///
/// Returns 401 without a session, 403 for someone else's namespace, 400 for
/// a directory path, and 201 once stored.
pub async fn put(
    State(state): State<AppState>,
    Path((identity, path)): Path<(String, String)>,
    RequireSession(session): RequireSession,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let target = Target::parse(&identity, &path)?;
    target.authorize_owner(&session)?;
    if target.is_directory() {
        return Err(AppError::BadRequest("cannot write to a directory path".into()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    debug!(owner = %target.owner(), path = %target.path, bytes = body.len(), "storing entry");
    state
        .storage
        .put_entry(
            &target.owner(),
            &target.path,
            Entry {
                content: body,
                content_type,
                updated_at: Utc::now(),
            },
        )
        .await?;

    Ok(StatusCode::CREATED)
}

/// `GET /{identity}/{*path}`
///
/// Files come back with their stored content type. Directories come back as
/// `text/plain`, one `pk://` address per line.
pub async fn get(
    State(state): State<AppState>,
    Path((identity, path)): Path<(String, String)>,
    OptionalSession(session): OptionalSession,
) -> Result<Response, AppError> {
    read(&state, Target::parse(&identity, &path)?, session.as_ref()).await
}

/// `GET /{identity}/`
///
/// The root is private, so only the owner can list it.
pub async fn list_root(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    OptionalSession(session): OptionalSession,
) -> Result<Response, AppError> {
    read(&state, Target::parse(&identity, "")?, session.as_ref()).await
}

async fn read(
    state: &AppState,
    target: Target,
    session: Option<&StoredSession>,
) -> Result<Response, AppError> {
    target.authorize_read(session)?;

    if target.is_directory() {
        let listing: Vec<String> = state
            .storage
            .list_entries(&target.owner(), &target.path)
            .await?
            .into_iter()
            .map(|p| ResourceAddress::new(target.owner(), p.split('/')).to_string())
            .collect();
        let mut body = listing.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        return Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response());
    }

    let entry = state
        .storage
        .get_entry(&target.owner(), &target.path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no entry at {}", target.path)))?;

    let content_type = entry
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], entry.content).into_response())
}

/// `DELETE /{identity}/{*path}`
///
/// Returns 204 when removed and 404 when there was nothing to remove.
pub async fn delete(
    State(state): State<AppState>,
    Path((identity, path)): Path<(String, String)>,
    RequireSession(session): RequireSession,
) -> Result<impl IntoResponse, AppError> {
    let target = Target::parse(&identity, &path)?;
    target.authorize_owner(&session)?;
    if target.is_directory() {
        return Err(AppError::BadRequest("cannot delete a directory path".into()));
    }

    state
        .storage
        .delete_entry(&target.owner(), &target.path)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use keyhost_core::{Keypair, PublicIdentity};
    use tower::ServiceExt;

    use crate::{
        config::NodeConfig,
        router::build_router,
        storage::{memory::MemoryStorage, Storage, StoredSession},
    };

    /// An app with one account already holding the session token `"owner"`.
    async fn setup() -> (Router, PublicIdentity) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let owner = Keypair::generate().public_identity();
        storage.create_account(&owner, Utc::now()).await.unwrap();
        storage
            .put_session(&StoredSession {
                token: "owner".into(),
                identity: owner,
                created_at: Utc::now(),
                expires_at: Utc::now() + Duration::seconds(600),
            })
            .await
            .unwrap();
        storage
            .put_session(&StoredSession {
                token: "stranger".into(),
                identity: Keypair::generate().public_identity(),
                created_at: Utc::now(),
                expires_at: Utc::now() + Duration::seconds(600),
            })
            .await
            .unwrap();

        let app = build_router(
            storage,
            NodeConfig::for_url("http://localhost"),
            Keypair::generate().public_identity(),
        );
        (app, owner)
    }

    fn request(method: &str, uri: &str, bearer: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn owner_put_then_anonymous_get_public() {
        let (app, owner) = setup().await;
        let uri = format!("/{owner}/pub/example.com/demo.json");

        let resp = app
            .clone()
            .oneshot(request("PUT", &uri, Some("owner"), r#"{"foo":"bar"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app.oneshot(request("GET", &uri, None, "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_string(resp).await, r#"{"foo":"bar"}"#);
    }

    #[tokio::test]
    async fn put_without_session_returns_401() {
        let (app, owner) = setup().await;
        let resp = app
            .oneshot(request("PUT", &format!("/{owner}/pub/a"), None, "x"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn put_into_foreign_namespace_returns_403() {
        let (app, owner) = setup().await;
        let resp = app
            .oneshot(request("PUT", &format!("/{owner}/pub/a"), Some("stranger"), "x"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn private_data_is_owner_only() {
        let (app, owner) = setup().await;
        let uri = format!("/{owner}/private/notes.txt");
        app.clone()
            .oneshot(request("PUT", &uri, Some("owner"), "secret"))
            .await
            .unwrap();

        let anon = app.clone().oneshot(request("GET", &uri, None, "")).await.unwrap();
        assert_eq!(anon.status(), StatusCode::UNAUTHORIZED);

        let stranger = app
            .clone()
            .oneshot(request("GET", &uri, Some("stranger"), ""))
            .await
            .unwrap();
        assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

        let resp = app.oneshot(request("GET", &uri, Some("owner"), "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "secret");
    }

    #[tokio::test]
    async fn directory_listing() {
        let (app, owner) = setup().await;
        for path in ["pub/app/a.json", "pub/app/b.json", "pub/other/c.json"] {
            app.clone()
                .oneshot(request("PUT", &format!("/{owner}/{path}"), Some("owner"), "{}"))
                .await
                .unwrap();
        }

        let resp = app
            .oneshot(request("GET", &format!("/{owner}/pub/app/"), None, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_string(resp).await,
            format!("pk://{owner}/pub/app/a.json\npk://{owner}/pub/app/b.json\n")
        );
    }

    #[tokio::test]
    async fn root_listing_is_owner_only() {
        let (app, owner) = setup().await;
        for path in ["pub/a.txt", "private/b.txt"] {
            app.clone()
                .oneshot(request("PUT", &format!("/{owner}/{path}"), Some("owner"), "x"))
                .await
                .unwrap();
        }
        let uri = format!("/{owner}/");

        let anon = app.clone().oneshot(request("GET", &uri, None, "")).await.unwrap();
        assert_eq!(anon.status(), StatusCode::UNAUTHORIZED);

        let stranger = app
            .clone()
            .oneshot(request("GET", &uri, Some("stranger"), ""))
            .await
            .unwrap();
        assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

        let resp = app.oneshot(request("GET", &uri, Some("owner"), "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_string(resp).await,
            format!("pk://{owner}/private/b.txt\npk://{owner}/pub/a.txt\n")
        );
    }

    #[tokio::test]
    async fn delete_then_get_is_404() {
        let (app, owner) = setup().await;
        let uri = format!("/{owner}/pub/gone");
        app.clone()
            .oneshot(request("PUT", &uri, Some("owner"), "x"))
            .await
            .unwrap();

        let resp = app
            .clone()
            .oneshot(request("DELETE", &uri, Some("owner"), ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app.clone().oneshot(request("GET", &uri, None, "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .oneshot(request("DELETE", &uri, Some("owner"), ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_identity_or_path_returns_400() {
        let (app, owner) = setup().await;
        let resp = app
            .clone()
            .oneshot(request("GET", "/not-an-identity/pub/a", None, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(request("GET", &format!("/{owner}/pub//a"), None, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
