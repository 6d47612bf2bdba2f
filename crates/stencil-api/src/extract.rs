//! Request body extractors whose rejections render as `ApiError`

use axum::extract::{FromRequest, Multipart};

use crate::error::ApiError;

/// `axum::Json` with `{"detail": ..}` rejections
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Multipart body with `{"detail": ..}` rejections
#[derive(FromRequest)]
#[from_request(rejection(ApiError))]
pub struct MultipartForm(pub Multipart);
