//! Access control gate
//!
//! Turns a bearer credential into a [`Principal`] by validating the token
//! and resolving its subject against the user store, then enforces role
//! requirements on that principal.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stencil_db::{Database, DbError, User, UserRole};
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::jwt::JwtManager;

/// Read access to user records, keyed by email
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;
}

#[async_trait]
impl UserStore for Database {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        self.get_user_by_email(email).await
    }
}

/// Authenticated caller for the duration of one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub role: UserRole,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Pass `principal` through unchanged if it holds exactly `role`
pub fn require_role(principal: Principal, role: UserRole) -> Result<Principal, AuthError> {
    if principal.role != role {
        debug!(
            "User {} ({}) lacks required role {}",
            principal.email, principal.role, role
        );
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(principal)
}

/// Resolves bearer credentials to principals
#[derive(Clone)]
pub struct AccessGate {
    jwt: Arc<JwtManager>,
    users: Arc<dyn UserStore>,
}

impl AccessGate {
    pub fn new(jwt: Arc<JwtManager>, users: Arc<dyn UserStore>) -> Self {
        Self { jwt, users }
    }

    /// Authenticate the raw `Authorization` header value
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Principal, AuthError> {
        let header = authorization.ok_or(AuthError::MissingAuthHeader)?;
        let token = extract_bearer_token(header)?;
        self.authenticate_token(token).await
    }

    /// Authenticate a bare token
    ///
    /// Performs exactly one user-store read. A failed read is reported as an
    /// authentication failure, not as a server error.
    pub async fn authenticate_token(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.jwt.validate_token(token)?;

        let user = match self.users.find_user_by_email(&claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("Token subject {} no longer exists", claims.sub);
                return Err(AuthError::UnknownSubject);
            }
            Err(e) => {
                warn!("User lookup failed during authentication: {}", e);
                return Err(AuthError::InvalidToken);
            }
        };

        let principal = Principal::from(&user);
        debug!("Authenticated user: {} ({})", principal.email, principal.role);
        Ok(principal)
    }
}
