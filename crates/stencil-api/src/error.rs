//! API error types

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Auth error: {0}")]
    Auth(#[from] stencil_auth::AuthError),

    #[error("Database error: {0}")]
    Database(#[from] stencil_db::DbError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Invalid JSON body: {0}")]
    JsonBody(#[from] JsonRejection),

    #[error("Invalid form body: {0}")]
    MultipartBody(#[from] MultipartRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Auth(e) => return e.into_response(),
            ApiError::Database(stencil_db::DbError::Duplicate(msg)) => {
                (StatusCode::CONFLICT, msg)
            }
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Multipart(e) => (e.status(), e.body_text()),
            ApiError::JsonBody(e) => (e.status(), e.body_text()),
            ApiError::MultipartBody(e) => (e.status(), e.body_text()),
        };

        let body = axum::Json(json!({
            "detail": message
        }));

        (status, body).into_response()
    }
}
