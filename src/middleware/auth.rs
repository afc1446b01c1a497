use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

/// Admin tokens are valid for two hours.
pub const TOKEN_TTL_SECS: i64 = 2 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub admin: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Compares the supplied secret with the configured one in constant time.
/// Both sides are hashed first so the comparison does not leak the length.
pub fn secret_matches(supplied: &str, configured: &str) -> bool {
    let supplied = Sha256::digest(supplied.as_bytes());
    let configured = Sha256::digest(configured.as_bytes());
    supplied.as_slice().ct_eq(configured.as_slice()).into()
}

pub fn issue_token(signing_key: &str) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp();
    issue_token_at(signing_key, now, now + TOKEN_TTL_SECS)
}

pub fn issue_token_at(signing_key: &str, issued_at: i64, expires_at: i64) -> Result<String, AppError> {
    let claims = Claims {
        admin: true,
        iat: issued_at,
        exp: expires_at,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(signing_key.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Failed to sign token: {}", e)))
}

pub fn verify_token(token: &str, signing_key: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(signing_key.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!(error = %e, "Rejected admin token");
        AppError::Forbidden("Invalid or expired token".to_string())
    })?;

    if !data.claims.admin {
        return Err(AppError::Forbidden("Invalid or expired token".to_string()));
    }
    Ok(data.claims)
}

/// Gates mutating routes: a missing bearer token is 401, an invalid or
/// expired one is 403.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

    let claims = verify_token(token, &state.config.jwt_secret)?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
