//! Application-level error type returned by handlers.
//!
//! All variants serialise to the [`ErrorResponse`] JSON format and map to
//! the appropriate HTTP status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyhost_api::{codes, ErrorResponse};

use crate::storage::StorageError;

/// An error that a handler can return; converts directly to an HTTP response.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    InvalidRecord(String),
    Unauthorized(String),
    Forbidden(String),
    AlreadyRegistered(String),
    StaleRecord(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, codes::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, codes::INVALID_PARAMETER, msg),
            AppError::InvalidRecord(msg) => (StatusCode::BAD_REQUEST, codes::INVALID_RECORD, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, codes::FORBIDDEN, msg),
            AppError::AlreadyRegistered(msg) => {
                (StatusCode::CONFLICT, codes::ALREADY_REGISTERED, msg)
            }
            AppError::StaleRecord(msg) => (StatusCode::CONFLICT, codes::STALE_RECORD, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL_ERROR, msg)
            }
        };
        let body = ErrorResponse::new(code, message);
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => AppError::NotFound("not found".into()),
            StorageError::AlreadyExists(msg) => AppError::AlreadyRegistered(msg),
            StorageError::Stale(msg) => AppError::StaleRecord(msg),
            StorageError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
