//! Authentication and authorization failure classes.
//!
//! Every variant maps to a fixed, generic client response. The variant itself
//! (which check failed) is only ever logged.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::api::handlers::ErrorResponse;

pub(crate) const UNAUTHORIZED_MESSAGE: &str = "unauthorized";
pub(crate) const FORBIDDEN_MESSAGE: &str = "admin access required";
pub(crate) const INVALID_CREDENTIALS_MESSAGE: &str = "invalid credentials";
pub(crate) const DUPLICATE_USERNAME_MESSAGE: &str = "username already exists";
pub(crate) const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed authorization header")]
    MalformedHeader,
    #[error("invalid token encoding")]
    InvalidToken,
    #[error("unexpected signing algorithm: {0}")]
    UnexpectedAlgorithm(String),
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid token claims")]
    InvalidClaims,
    #[error("insufficient role")]
    InsufficientRole,
    #[error("username already exists")]
    DuplicateUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("internal failure: {0}")]
    InternalFailure(String),
}

impl AuthError {
    /// `true` for the classes that mean "who are you?" rather than "not allowed".
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedHeader
                | Self::InvalidToken
                | Self::UnexpectedAlgorithm(_)
                | Self::InvalidSignature
                | Self::Expired
                | Self::InvalidClaims
                | Self::InvalidCredentials
        )
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InsufficientRole => StatusCode::FORBIDDEN,
            Self::DuplicateUsername => StatusCode::CONFLICT,
            Self::InternalFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// RFC 6750 challenge: bare `Bearer` when no token was presented,
    /// `error="invalid_token"` for any presented token that failed.
    fn challenge(&self) -> Option<HeaderValue> {
        match self {
            Self::MalformedHeader => Some(HeaderValue::from_static("Bearer")),
            Self::InvalidToken
            | Self::UnexpectedAlgorithm(_)
            | Self::InvalidSignature
            | Self::Expired
            | Self::InvalidClaims => Some(HeaderValue::from_static(
                "Bearer error=\"invalid_token\"",
            )),
            _ => None,
        }
    }

    const fn public_message(&self) -> &'static str {
        match self {
            Self::InsufficientRole => FORBIDDEN_MESSAGE,
            Self::DuplicateUsername => DUPLICATE_USERNAME_MESSAGE,
            Self::InvalidCredentials => INVALID_CREDENTIALS_MESSAGE,
            Self::InternalFailure(_) => INTERNAL_MESSAGE,
            _ => UNAUTHORIZED_MESSAGE,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            Self::InternalFailure(detail) => error!("auth internal failure: {detail}"),
            Self::UnexpectedAlgorithm(alg) => {
                warn!(alg = %alg, "rejected token with unexpected signing algorithm");
            }
            other => warn!(reason = %other, "request rejected by auth"),
        }

        let status = self.status();
        let body = Json(ErrorResponse::new(self.public_message()));
        match self.challenge() {
            Some(challenge) => (status, [(WWW_AUTHENTICATE, challenge)], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}
