//! Application state

use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;
use stencil_auth::{AccessGate, JwtManager};
use stencil_db::Database;
use std::sync::Arc;

/// Prometheus recorder handle used to render `/metrics`
pub type MetricsHandle = PrometheusHandle;

/// Request-independent settings the handlers need
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Externally reachable base URL, used to build image links
    pub public_url: String,
    /// Whether `/api/auth/register` may create admin accounts
    pub allow_admin_registration: bool,
    /// Maximum accepted image upload, in bytes
    pub max_image_size: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8000".to_string(),
            allow_admin_registration: false,
            max_image_size: 10 * 1024 * 1024,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub gate: AccessGate,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(db: Database, jwt: Arc<JwtManager>, settings: ApiSettings) -> Self {
        let gate = AccessGate::new(jwt.clone(), Arc::new(db.clone()));
        Self {
            db,
            jwt,
            gate,
            settings: Arc::new(settings),
        }
    }
}

impl FromRef<AppState> for AccessGate {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}
