//! Stencil Database Layer
//!
//! This crate provides the persistence layer for Stencil: users,
//! templates and uploaded images, stored in SQLite via sqlx.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::Database;
