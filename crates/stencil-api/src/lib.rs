//! Stencil REST API
//!
//! This crate provides the Axum-based HTTP API for Stencil: registration
//! and login, template management, and image serving.

pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{ApiSettings, AppState, MetricsHandle};
