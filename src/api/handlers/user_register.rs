use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use ulid::Ulid;
use utoipa::ToSchema;

use super::{
    auth::{storage::NewUser, AuthError, AuthState, Role, StoreError, UserId},
    json_body, valid_password, valid_username, ApiError, ErrorResponse, PASSWORD_RULE,
    USERNAME_RULE,
};

#[derive(ToSchema, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RegisterResponse {
    pub id: UserId,
    pub username: String,
    pub profile_tag: String,
}

fn generate_profile_tag() -> String {
    format!("user-{}", Ulid::new().to_string().to_lowercase())
}

#[utoipa::path(
    post,
    path= "/api/register",
    request_body = RegisterRequest,
    responses (
        (status = 201, description = "Registration successful", body = RegisterResponse),
        (status = 400, description = "Invalid username or password", body = ErrorResponse),
        (status = 409, description = "Username already exists", body = ErrorResponse),
    ),
    tag= "auth"
)]
/// Creates a `user`-role account. The password is stored only as an `Argon2id` digest.
#[instrument(skip(auth_state, payload))]
pub async fn register(
    Extension(auth_state): Extension<Arc<AuthState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let request = json_body(payload)?;

    if !valid_username(&request.username) {
        return Err(ApiError::BadRequest(USERNAME_RULE));
    }

    if !valid_password(&request.password) {
        return Err(ApiError::BadRequest(PASSWORD_RULE));
    }

    let password_hash = auth_state
        .hasher()
        .hash_blocking(request.password)
        .await
        .map_err(|err| AuthError::InternalFailure(err.to_string()))?;

    let user = NewUser {
        username: request.username,
        password_hash,
        profile_tag: generate_profile_tag(),
        role: Role::User,
    };

    let user_id = match auth_state.store().insert_user(&user).await {
        Ok(user_id) => user_id,
        Err(StoreError::UniqueViolation) => return Err(AuthError::DuplicateUsername.into()),
        Err(err) => return Err(AuthError::InternalFailure(format!("insert user: {err}")).into()),
    };

    info!(user_id = %user_id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user_id,
            username: user.username,
            profile_tag: user.profile_tag,
        }),
    ))
}
