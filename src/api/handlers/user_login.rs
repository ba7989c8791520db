use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::{
    auth::{AuthError, AuthState, Role, UserId},
    json_body, ApiError, ErrorResponse,
};

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

#[utoipa::path(
    post,
    path= "/api/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    ),
    tag= "auth"
)]
/// Exchanges a username and password for a session token.
///
/// An unknown username and a wrong password produce the same response, and both
/// pay for one `Argon2` verification.
#[instrument(skip(auth_state, payload))]
pub async fn login(
    Extension(auth_state): Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let request = json_body(payload)?;

    let stored = auth_state
        .store()
        .find_credentials(&request.username)
        .await
        .map_err(|err| AuthError::InternalFailure(format!("look up credentials: {err}")))?;

    let digest = stored.as_ref().map_or_else(
        || auth_state.decoy_digest().to_string(),
        |credentials| credentials.password_hash.clone(),
    );

    let matches = auth_state
        .hasher()
        .verify_blocking(request.password, digest)
        .await
        .map_err(|err| AuthError::InternalFailure(err.to_string()))?;

    let Some(credentials) = stored.filter(|_| matches) else {
        debug!("login refused");
        return Err(AuthError::InvalidCredentials.into());
    };

    let token = auth_state
        .keys()
        .issue(credentials.user_id, credentials.role)?;

    info!(user_id = %credentials.user_id, role = credentials.role.as_str(), "user logged in");

    Ok(Json(LoginResponse {
        token,
        user_id: credentials.user_id,
        username: request.username,
        role: credentials.role,
    }))
}
