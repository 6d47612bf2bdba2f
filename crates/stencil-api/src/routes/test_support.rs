//! Helpers for driving the router in tests

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use chrono::Duration;
use std::sync::Arc;
use stencil_auth::{JwtManager, hash_password};
use stencil_db::{Database, NewUser, UserRole};
use tower::ServiceExt;

use crate::routes::create_router;
use crate::state::{ApiSettings, AppState};

const BOUNDARY: &str = "stencil-test-boundary";

pub(crate) struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(ApiSettings::default()).await
    }

    pub async fn with_admin_registration() -> Self {
        Self::with_settings(ApiSettings {
            allow_admin_registration: true,
            ..Default::default()
        })
        .await
    }

    pub async fn with_settings(settings: ApiSettings) -> Self {
        let db = Database::in_memory().await.unwrap();
        let jwt = Arc::new(JwtManager::new("api-test-secret", Duration::minutes(30)));
        let state = AppState::new(db, jwt, settings);
        let router = create_router(state.clone(), None);
        Self { state, router }
    }

    /// Insert a user directly and return a bearer token for it
    pub async fn create_user(&self, email: &str, role: UserRole) -> String {
        self.state
            .db
            .insert_user(NewUser {
                email: email.to_string(),
                username: email.to_string(),
                password_hash: hash_password("pw123456").unwrap(),
                role,
            })
            .await
            .unwrap();
        self.state.jwt.generate_token(email, role).unwrap()
    }

    pub async fn raw(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and decode the JSON body (`Null` when empty or not JSON)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.raw(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if body.is_null() {
        builder.body(Body::empty()).unwrap()
    } else {
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}

/// One part of a multipart form
pub(crate) struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    content_type: Option<&'a str>,
    data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            filename: None,
            content_type: None,
            data: value.as_bytes(),
        }
    }

    pub fn file(
        name: &'a str,
        filename: &'a str,
        content_type: Option<&'a str>,
        data: &'a [u8],
    ) -> Self {
        Self {
            name,
            filename: Some(filename),
            content_type,
            data,
        }
    }
}

pub(crate) fn multipart_request(
    method: Method,
    uri: &str,
    token: &str,
    parts: &[Part<'_>],
) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", filename));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}
