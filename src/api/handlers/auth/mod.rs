//! Stateless authentication and role-based authorization.
//!
//! - [`password`]: `Argon2id` hashing with the work factor embedded in the digest.
//! - [`token`]: `HS256` session tokens, verified from the token alone.
//! - [`principal`]: the typed identity handlers receive, plus the
//!   `require_auth` / `require_admin` middleware.
//! - [`storage`]: the two statements login and registration need.
//!
//! Registration and login live in `user_register` / `user_login` next to the
//! other handlers.

pub(crate) mod error;
pub(crate) mod password;
pub(crate) mod principal;
mod state;
pub(crate) mod storage;
pub(crate) mod token;

pub use error::AuthError;
pub use password::{HashError, HasherConfig, PasswordHasher};
pub use principal::{require_admin, require_auth, Principal, Role, UserId};
pub use state::{AuthConfig, AuthState};
pub use storage::{CredentialStore, PgCredentialStore, StoreError};
pub use token::TokenKeys;

#[cfg(test)]
pub(crate) use state::{test_state, test_state_with_store};
