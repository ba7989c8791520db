//! Authenticated principal and the access guard.
//!
//! Flow Overview: `require_auth` turns the bearer token into a [`Principal`] and
//! stores it in the request extensions; `require_admin` (layered inside it on
//! admin routes) only reads that principal. Handlers take
//! `Extension<Principal>` and never look at the `Authorization` header.

use axum::{
    extract::{Extension, Request},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::debug;
use utoipa::ToSchema;

use super::{error::AuthError, state::AuthState, token::bearer_token};

/// Database identity of a user. Always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    #[must_use]
    pub const fn new(id: i64) -> Option<Self> {
        if id > 0 {
            Some(Self(id))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Identity and role taken from a verified token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Role gate.
    ///
    /// # Errors
    /// `InsufficientRole` unless the principal is an admin.
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AuthError::InsufficientRole)
        }
    }
}

/// Authentication gate for every protected route.
pub async fn require_auth(
    Extension(auth_state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let principal = match bearer_token(header).and_then(|token| auth_state.keys().verify(token)) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    debug!(user_id = %principal.user_id, role = principal.role.as_str(), "authenticated");
    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Role gate for admin routes. Must sit inside [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Response {
    // A missing principal means the layers were wired in the wrong order;
    // fail closed as unauthenticated.
    let Some(principal) = request.extensions().get::<Principal>().copied() else {
        return AuthError::MalformedHeader.into_response();
    };

    if let Err(err) = principal.require_admin() {
        debug!(user_id = %principal.user_id, "admin route refused");
        return err.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::{state::test_state, token::TokenKeys};
    use anyhow::Result;
    use axum::{
        body::{to_bytes, Body},
        http::{header::WWW_AUTHENTICATE, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Json, Router,
    };
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn whoami(Extension(principal): Extension<Principal>) -> Json<Value> {
        Json(json!({ "user_id": principal.user_id, "role": principal.role }))
    }

    fn guarded_router(state: Arc<AuthState>) -> Router {
        let member = Router::new()
            .route("/member", get(whoami))
            .route_layer(middleware::from_fn(require_auth));
        let admin = Router::new()
            .route("/admin", get(whoami))
            .route_layer(middleware::from_fn(require_admin))
            .route_layer(middleware::from_fn(require_auth));
        member.merge(admin).layer(Extension(state))
    }

    async fn call(app: Router, uri: &str, auth: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        let response = app.oneshot(builder.body(Body::empty())?).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok((status, value))
    }

    #[test]
    fn user_id_must_be_positive() {
        assert!(UserId::new(0).is_none());
        assert!(UserId::new(-1).is_none());
        assert_eq!(UserId::new(9).map(UserId::get), Some(9));
    }

    #[test]
    fn role_round_trips_through_text() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), json!("admin"));
    }

    #[test]
    fn role_gate_predicate() {
        let user = Principal {
            user_id: UserId::new(1).unwrap(),
            role: Role::User,
        };
        let admin = Principal {
            role: Role::Admin,
            ..user
        };
        assert!(!user.is_admin());
        assert!(matches!(
            user.require_admin(),
            Err(AuthError::InsufficientRole)
        ));
        assert!(admin.is_admin());
        assert!(admin.require_admin().is_ok());
    }

    #[tokio::test]
    async fn member_route_exposes_principal() -> Result<()> {
        let state = test_state();
        let token = state.keys().issue(UserId::new(5).unwrap(), Role::User)?;
        let (status, body) = call(
            guarded_router(state),
            "/member",
            Some(&format!("Bearer {token}")),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "user_id": 5, "role": "user" }));
        Ok(())
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() -> Result<()> {
        let app = guarded_router(test_state());
        let response = app
            .oneshot(HttpRequest::builder().uri("/admin").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).map(|v| v.as_bytes()),
            Some(&b"Bearer"[..])
        );
        Ok(())
    }

    #[tokio::test]
    async fn user_token_on_admin_route_is_forbidden() -> Result<()> {
        let state = test_state();
        let token = state.keys().issue(UserId::new(5).unwrap(), Role::User)?;
        let (status, body) = call(
            guarded_router(state),
            "/admin",
            Some(&format!("Bearer {token}")),
        )
        .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "error": "admin access required" }));
        Ok(())
    }

    #[tokio::test]
    async fn admin_token_passes_both_gates() -> Result<()> {
        let state = test_state();
        let token = state.keys().issue(UserId::new(1).unwrap(), Role::Admin)?;
        let (status, body) = call(
            guarded_router(state),
            "/admin",
            Some(&format!("Bearer {token}")),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "user_id": 1, "role": "admin" }));
        Ok(())
    }

    #[tokio::test]
    async fn foreign_key_token_is_unauthorized_not_forbidden() -> Result<()> {
        let foreign = TokenKeys::new(SecretString::from("someone-else"))?;
        let token = foreign.issue(UserId::new(1).unwrap(), Role::Admin)?;
        let (status, body) = call(
            guarded_router(test_state()),
            "/admin",
            Some(&format!("Bearer {token}")),
        )
        .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "unauthorized" }));
        Ok(())
    }

    #[tokio::test]
    async fn admin_gate_without_auth_fails_closed() -> Result<()> {
        let app = Router::new()
            .route("/admin", get(|| async { "reached" }))
            .route_layer(middleware::from_fn(require_admin));
        let response = app
            .oneshot(HttpRequest::builder().uri("/admin").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
