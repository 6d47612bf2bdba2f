//! API routes

mod auth;
mod health;
mod images;
pub mod metrics;
mod templates;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

/// Room for form fields and multipart framing on top of the image itself
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let body_limit = state.settings.max_image_size + FORM_OVERHEAD_BYTES;

    let mut router = Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(templates::routes())
        .merge(images::routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}

#[cfg(test)]
mod tests {
    use super::test_support::{TestApp, json_request};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_health_and_root() {
        let app = TestApp::new().await;

        let (status, body) = app
            .send(json_request(Method::GET, "/api/health", None, serde_json::Value::Null))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = app
            .send(json_request(Method::GET, "/", None, serde_json::Value::Null))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
