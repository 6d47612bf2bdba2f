//! Authentication error types

use axum::http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token subject does not match any user")]
    UnknownSubject,

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("User store error: {0}")]
    Store(#[from] stencil_db::DbError),
}

impl AuthError {
    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::UnknownSubject
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Store(e) if e.is_duplicate() => StatusCode::CONFLICT,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidToken | AuthError::Jwt(_) => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::UnknownSubject => "unknown_subject",
            AuthError::MissingAuthHeader => "missing_header",
            AuthError::InvalidAuthHeader => "invalid_header",
            AuthError::InsufficientPermissions => "forbidden",
            AuthError::EmailTaken => "email_taken",
            AuthError::PasswordHash(_) => "password_hash",
            AuthError::Store(_) => "store",
        }
    }

    /// Client-facing message
    ///
    /// Every token failure shares one message so callers cannot tell a
    /// forged token from one whose account has been removed.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Incorrect email or password",
            AuthError::MissingAuthHeader => "Not authenticated",
            AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::UnknownSubject
            | AuthError::InvalidAuthHeader
            | AuthError::Jwt(_) => "Could not validate credentials",
            AuthError::InsufficientPermissions => "Insufficient permissions",
            AuthError::EmailTaken => "Email already registered",
            AuthError::Store(e) if e.is_duplicate() => "Email already registered",
            AuthError::PasswordHash(_) | AuthError::Store(_) => "Internal error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Authentication failure: {}", self);
        }

        let body = axum::Json(json!({
            "detail": self.public_message()
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(AuthError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::UnknownSubject.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InsufficientPermissions.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::Store(stencil_db::DbError::Duplicate("a@x.com".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthError::PasswordHash("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unknown_subject_indistinguishable_from_bad_token() {
        assert_eq!(
            AuthError::UnknownSubject.public_message(),
            AuthError::InvalidToken.public_message()
        );
        assert_eq!(
            AuthError::TokenExpired.public_message(),
            AuthError::InvalidToken.public_message()
        );
    }

    #[test]
    fn test_unauthorized_response_has_challenge() {
        let response = AuthError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");

        let response = AuthError::InsufficientPermissions.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
