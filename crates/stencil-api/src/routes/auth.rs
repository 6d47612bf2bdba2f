//! Registration, login and identity routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::json;
use stencil_auth::{AuthError, RequireAuth, hash_password, verify_password_or_dummy};
use stencil_db::{NewUser, UserRole};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

use super::types::{ApiResponse, LoginRequest, LoginResponse, RegisterRequest, UserResponse};

// ==================== Input Validation ====================

/// Maximum allowed email length
const MAX_EMAIL_LENGTH: usize = 254;
/// Maximum allowed username length
const MAX_USERNAME_LENGTH: usize = 64;
/// Maximum allowed password length (prevent DoS with very large passwords)
const MAX_PASSWORD_LENGTH: usize = 256;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Normalize an email address for storage and lookup
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate email shape: `local@domain.tld`, no whitespace
fn validate_email(email: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::BadRequest("Invalid email address".to_string());

    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
        return Err(invalid());
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

/// Validate username length
fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::BadRequest("Username cannot be empty".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Username exceeds maximum length of {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    Ok(())
}

/// Validate password length
fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

// ==================== Auth Routes ====================

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse>), ApiError> {
    let email = normalize_email(&request.email);
    validate_email(&email)?;
    validate_username(&request.username)?;
    validate_password(&request.password)?;

    if request.role == UserRole::Admin && !state.settings.allow_admin_registration {
        warn!("Rejected self-registration of admin account: {}", email);
        return Err(ApiError::Forbidden(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    debug!("Registering user: {}", email);

    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(AuthError::EmailTaken.into());
    }

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Task join error: {}", e)))??;

    let user = state
        .db
        .insert_user(NewUser {
            email,
            username: request.username.trim().to_string(),
            password_hash,
            role: request.role,
        })
        .await
        .map_err(|e| match e {
            stencil_db::DbError::Duplicate(_) => ApiError::Auth(AuthError::EmailTaken),
            other => ApiError::Database(other),
        })?;

    metrics::counter!("stencil_registrations_total", "role" => user.role.as_str()).increment(1);
    info!("Registered user {} ({})", user.email, user.role);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_data(
            "User registered successfully",
            json!({ "user_id": user.id }),
        )),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&request.email);
    if email.len() > MAX_EMAIL_LENGTH || request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::InvalidCredentials.into());
    }

    debug!("Login attempt for user: {}", email);

    // Unknown accounts still pay for one Argon2 verification
    let user = state.db.get_user_by_email(&email).await?;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let password = request.password;
    let password_valid = tokio::task::spawn_blocking(move || {
        verify_password_or_dummy(&password, stored_hash.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Task join error: {}", e)))?;

    let user = match (user, password_valid) {
        (Some(u), true) => u,
        _ => {
            metrics::counter!("stencil_logins_total", "outcome" => "rejected").increment(1);
            warn!("Failed login for {}", email);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let token = state.jwt.generate_token(&user.email, user.role)?;

    metrics::counter!("stencil_logins_total", "outcome" => "success").increment(1);
    info!("User {} logged in successfully", user.email);

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        expires_in: state.jwt.ttl().num_seconds(),
        user: user.into(),
    }))
}

/// GET /api/auth/me (Authenticated)
async fn me(
    RequireAuth(principal): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_id(principal.id)
        .await?
        .ok_or(AuthError::UnknownSubject)?;

    Ok(Json(user.into()))
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}
