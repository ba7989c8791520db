//! API handlers and shared utilities for Taskmart.
//!
//! Handlers receive the caller as `Extension<Principal>` (placed there by the
//! auth middleware) and the pool as `Extension<PgPool>`. Every error body is
//! `{"error": "..."}`.

pub mod auth;
pub mod cart;
pub mod groups;
pub mod health;
pub mod products;
pub mod profile;
pub mod reviews;
pub mod tasks;
pub mod user_login;
pub mod user_register;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use auth::AuthError;

pub const USERNAME_RULE: &str =
    "username must be 3-50 characters of letters, digits, '-' or '_'";
pub const PASSWORD_RULE: &str = "password must be 8-128 characters";
const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 128;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdResponse {
    pub id: i64,
}

/// Handler-level failure. Auth failures keep their own response mapping.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound(&'static str),
    Auth(AuthError),
    Database(sqlx::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
            }
            Self::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message))).into_response()
            }
            Self::Auth(err) => err.into_response(),
            Self::Database(err) => {
                error!("Database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new(auth::error::INTERNAL_MESSAGE)),
                )
                    .into_response()
            }
        }
    }
}

/// Unwrap a JSON body, mapping axum's rejection to a uniform 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!("rejected request body: {rejection}");
            Err(ApiError::BadRequest("invalid request format"))
        }
    }
}

/// Parse a numeric path segment.
pub(crate) fn parse_id(raw: &str, invalid: &'static str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::BadRequest(invalid))
}

/// Letters, digits, `-` and `_`, 3 to 50 characters.
pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_-]{3,50}$").is_ok_and(|re| re.is_match(username))
}

pub fn valid_password(password: &str) -> bool {
    let length = password.chars().count();
    (PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn valid_username_accepts_expected_shapes() {
        assert!(valid_username("alice"));
        assert!(valid_username("bob_the-2nd"));
        assert!(valid_username(&"a".repeat(50)));
    }

    #[test]
    fn valid_username_rejects_bad_shapes() {
        assert!(!valid_username(""));
        assert!(!valid_username("ab"));
        assert!(!valid_username(&"a".repeat(51)));
        assert!(!valid_username("alice smith"));
        assert!(!valid_username("alice@example.com"));
    }

    #[test]
    fn valid_password_checks_length_bounds() {
        assert!(!valid_password("short"));
        assert!(valid_password("password"));
        assert!(valid_password(&"p".repeat(128)));
        assert!(!valid_password(&"p".repeat(129)));
    }

    #[test]
    fn parse_id_rejects_non_integers() {
        assert_eq!(parse_id("42", "bad").ok(), Some(42));
        assert!(matches!(
            parse_id("abc", "invalid group id"),
            Err(ApiError::BadRequest("invalid group id"))
        ));
        assert!(parse_id("", "bad").is_err());
    }

    #[tokio::test]
    async fn api_errors_render_json_bodies() -> anyhow::Result<()> {
        let response = ApiError::NotFound("task not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(&bytes[..], br#"{"error":"task not found"}"#);

        let response = ApiError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(&bytes[..], br#"{"error":"internal server error"}"#);
        Ok(())
    }
}
