//! Record relay handlers.
//!
//! - `GET /relay/{identity}`  latest signed endpoint record, or 404.
//! - `PUT /relay/{identity}`  publish a signed endpoint record.
//!
//! The relay checks every record before storing it, so anything it serves
//! verifies against its own identity. Newer timestamps win.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use keyhost_core::{PublicIdentity, SignedRecord};
use tracing::info;

use crate::error::AppError;

use super::AppState;

fn parse_identity(identity: &str) -> Result<PublicIdentity, AppError> {
    PublicIdentity::decode(identity)
        .map_err(|e| AppError::BadRequest(format!("invalid identity: {e}")))
}

/// `GET /relay/{identity}`
pub async fn get_record(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<SignedRecord>, AppError> {
    let identity = parse_identity(&identity)?;
    state
        .storage
        .get_record(&identity)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no record for {identity}")))
}

/// `PUT /relay/{identity}`
///
/// Returns 400 if the record is for another identity or does not verify,
/// 409 if a newer record is already stored, and 204 once stored.
pub async fn put_record(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    Json(record): Json<SignedRecord>,
) -> Result<impl IntoResponse, AppError> {
    let identity = parse_identity(&identity)?;
    if record.identity != identity {
        return Err(AppError::InvalidRecord(format!(
            "record is for {}, not {identity}",
            record.identity
        )));
    }
    record
        .verify()
        .map_err(|e| AppError::InvalidRecord(format!("record rejected: {e}")))?;

    state.storage.put_record(&record).await?;
    info!(%identity, endpoints = record.endpoints.len(), "relay stored record");
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
    use http_body_util::BodyExt;
    use keyhost_core::{Endpoint, Keypair, SignedRecord};
    use tower::ServiceExt;

    use crate::{
        config::NodeConfig,
        router::build_router,
        storage::{memory::MemoryStorage, Storage},
    };

    fn build_app() -> Router {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        build_router(
            storage,
            NodeConfig::for_url("http://localhost"),
            Keypair::generate().public_identity(),
        )
    }

    fn put(path: &str, record: &SignedRecord) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(record).unwrap()))
            .unwrap()
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn publish_then_fetch() {
        let app = build_app();
        let kp = Keypair::generate();
        let record = SignedRecord::sign(&kp, vec![Endpoint::url("http://h", 0)], 60).unwrap();
        let path = format!("/relay/{}", kp.public_identity());

        let resp = app.clone().oneshot(put(&path, &record)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app.oneshot(get(&path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let fetched: SignedRecord = serde_json::from_slice(&body).unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn unknown_identity_is_404() {
        let path = format!("/relay/{}", Keypair::generate().public_identity());
        let resp = build_app().oneshot(get(&path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn forged_record_is_400() {
        let kp = Keypair::generate();
        let mut record = SignedRecord::sign(&kp, vec![Endpoint::url("http://h", 0)], 60).unwrap();
        record.endpoints = vec![Endpoint::url("http://evil", 0)];
        let path = format!("/relay/{}", kp.public_identity());

        let resp = build_app().oneshot(put(&path, &record)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn record_under_wrong_identity_is_400() {
        let kp = Keypair::generate();
        let record = SignedRecord::sign(&kp, vec![Endpoint::url("http://h", 0)], 60).unwrap();
        let path = format!("/relay/{}", Keypair::generate().public_identity());

        let resp = build_app().oneshot(put(&path, &record)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn older_record_is_409() {
        let app = build_app();
        let kp = Keypair::generate();
        let older = SignedRecord::sign(&kp, vec![Endpoint::url("http://old", 0)], 60).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let newer = SignedRecord::sign(&kp, vec![Endpoint::url("http://new", 0)], 60).unwrap();
        let path = format!("/relay/{}", kp.public_identity());

        let resp = app.clone().oneshot(put(&path, &newer)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app.oneshot(put(&path, &older)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
