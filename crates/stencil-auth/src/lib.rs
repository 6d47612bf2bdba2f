//! Stencil Authentication and Authorization
//!
//! This crate provides password hashing, JWT issuance and validation,
//! and the role-gated access control used by every protected route.

pub mod error;
pub mod extract;
pub mod gate;
pub mod jwt;
pub mod password;

pub use error::AuthError;
pub use extract::{RequireAdmin, RequireAuth};
pub use gate::{AccessGate, Principal, UserStore, extract_bearer_token, require_role};
pub use jwt::{Claims, JwtManager};
pub use password::{hash_password, verify_password, verify_password_or_dummy};
