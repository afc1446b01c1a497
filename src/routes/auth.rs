use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::middleware::auth::{issue_token, secret_matches, TOKEN_TTL_SECS};
use crate::state::AppState;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    secret: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    token: String,
    expires_in: i64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    error: String,
}

#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Malformed body or missing secret", body = ErrorResponse),
        (status = 401, description = "Invalid secret", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    if !secret_matches(&payload.secret, &state.config.admin_secret) {
        warn!("Admin login rejected");
        return Err(AppError::Unauthorized("Invalid secret".to_string()));
    }

    let token = issue_token(&state.config.jwt_secret)?;

    info!("Admin login succeeded");
    Ok(Json(LoginResponse {
        token,
        expires_in: TOKEN_TTL_SECS,
    }))
}
