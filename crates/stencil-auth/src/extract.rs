//! Axum extractors for authenticated routes

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};
use stencil_db::UserRole;

use crate::error::AuthError;
use crate::gate::{AccessGate, Principal, require_role};

/// Extractor for authenticated user (required)
pub struct RequireAuth(pub Principal);

impl<S> FromRequestParts<S> for RequireAuth
where
    AccessGate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = AccessGate::from_ref(state);

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match gate.authenticate(auth_header).await {
            Ok(principal) => Ok(RequireAuth(principal)),
            Err(e) => {
                metrics::counter!("stencil_auth_failures_total", "reason" => e.reason())
                    .increment(1);
                Err(e)
            }
        }
    }
}

/// Extractor for admin user (required)
pub struct RequireAdmin(pub Principal);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AccessGate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(principal) = RequireAuth::from_request_parts(parts, state).await?;

        match require_role(principal, UserRole::Admin) {
            Ok(admin) => Ok(RequireAdmin(admin)),
            Err(e) => {
                metrics::counter!("stencil_auth_failures_total", "reason" => e.reason())
                    .increment(1);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::tests::{MemoryStore, jwt};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::{Router, routing::get};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn whoami(RequireAuth(principal): RequireAuth) -> String {
        principal.email
    }

    async fn admin_only(RequireAdmin(principal): RequireAdmin) -> String {
        format!("admin {}", principal.email)
    }

    fn app() -> (Router, Arc<crate::JwtManager>) {
        let store = MemoryStore::default()
            .with_user(1, "user@x.com", UserRole::User)
            .with_user(2, "admin@x.com", UserRole::Admin);
        let jwt = jwt();
        let gate = AccessGate::new(jwt.clone(), Arc::new(store));
        let router = Router::new()
            .route("/me", get(whoami))
            .route("/admin", get(admin_only))
            .with_state(gate);
        (router, jwt)
    }

    fn request(path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (app, _) = app();
        let response = app.oneshot(request("/me", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_reaches_authenticated_route() {
        let (app, jwt) = app();
        let token = jwt.generate_token("user@x.com", UserRole::User).unwrap();
        let response = app.oneshot(request("/me", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_user_forbidden_on_admin_route() {
        let (app, jwt) = app();
        let token = jwt.generate_token("user@x.com", UserRole::User).unwrap();
        let response = app.oneshot(request("/admin", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_allowed_on_admin_route() {
        let (app, jwt) = app();
        let token = jwt.generate_token("admin@x.com", UserRole::Admin).unwrap();
        let response = app.oneshot(request("/admin", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_claim_without_admin_record_is_forbidden() {
        // The store says user, whatever the token claims
        let (app, jwt) = app();
        let token = jwt.generate_token("user@x.com", UserRole::Admin).unwrap();
        let response = app.oneshot(request("/admin", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
