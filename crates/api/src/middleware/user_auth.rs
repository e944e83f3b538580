//! User JWT authentication middleware.
//!
//! Tokens are issued by the external identity provider; this service only
//! verifies them. The subject claim is the caller's user id.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::app::AppState;
use crate::config::JwtAuthConfig;
use crate::error::ApiError;
use shared::jwt::{extract_user_id, JwtConfig, JwtError};

/// Authenticated user information extracted from JWT.
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// User ID from the JWT subject claim.
    pub user_id: Uuid,
    /// JWT ID, when the issuer sets one.
    pub jti: Option<String>,
}

impl UserAuth {
    /// Validates a bearer token and returns user authentication info.
    pub fn validate(jwt: &JwtConfig, token: &str) -> Result<Self, JwtError> {
        let claims = jwt.validate_token(token)?;
        let user_id = extract_user_id(&claims)?;
        Ok(UserAuth {
            user_id,
            jti: claims.jti,
        })
    }

    /// Reads and validates the `Authorization: Bearer` header.
    pub fn from_headers(jwt: &JwtConfig, headers: &HeaderMap) -> Result<Self, ApiError> {
        let token = bearer_token(headers).ok_or_else(|| {
            ApiError::Unauthorized("Missing or invalid Authorization header".to_string())
        })?;

        Self::validate(jwt, token).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })
    }
}

/// Builds the verifier from configuration.
pub fn create_jwt_config(config: &JwtAuthConfig) -> Result<JwtConfig, JwtError> {
    if let Some(secret) = config.secret.as_deref() {
        return JwtConfig::hs256(secret, config.leeway_secs);
    }

    let jwt = JwtConfig::rs256(&config.public_key, config.leeway_secs)?;
    match config.private_key.as_deref() {
        Some(private_key) => jwt.with_private_key(private_key),
        None => Ok(jwt),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware that requires JWT user authentication.
///
/// Authenticated user information is stored in request extensions for
/// the rate limiter and the [`crate::extractors::UserAuth`] extractor.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match UserAuth::from_headers(&state.jwt, req.headers()) {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}
