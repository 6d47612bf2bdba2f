//! JWT token management

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use stencil_db::UserRole;
use tracing::debug;

use crate::error::AuthError;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user email)
    pub sub: String,
    /// User role at issue time
    pub role: UserRole,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtManager {
    /// Create a new JWT manager signing with `secret` (HS256)
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Lifetime of issued tokens
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, email: &str, role: UserRole) -> Result<String, AuthError> {
        self.generate_token_at(email, role, Utc::now())
    }

    /// Generate a JWT token as if issued at `now`
    pub fn generate_token_at(
        &self,
        email: &str,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let exp = now + self.ttl;

        let claims = Claims {
            sub: email.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        debug!("Generating token for user: {}", email);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Validate a JWT token and return claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_token_at(token, Utc::now())
    }

    /// Validate a JWT token against the clock reading `now`
    pub fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the supplied clock, without leeway
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        let claims = token_data.claims;

        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        if claims.exp < now.timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}
