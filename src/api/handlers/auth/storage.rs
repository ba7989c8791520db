//! Credential storage for registration and login.
//!
//! The auth core only needs two statements: insert a user, and fetch the
//! stored digest + role by username. A duplicate username is reported as
//! [`StoreError::UniqueViolation`] from the database's constraint signal.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::{info_span, Instrument};

use super::principal::{Role, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub profile_tag: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user_id: UserId,
    pub password_hash: String,
    pub role: Role,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new user and return its id.
    async fn insert_user(&self, user: &NewUser) -> Result<UserId, StoreError>;

    /// Look up the digest and role for `username`.
    async fn find_credentials(&self, username: &str)
        -> Result<Option<StoredCredentials>, StoreError>;
}

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_user(&self, user: &NewUser) -> Result<UserId, StoreError> {
        let query = r"
            INSERT INTO users (username, password, profile_tag, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.profile_tag)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    StoreError::UniqueViolation
                }
                other => StoreError::Database(other),
            })?;

        let id: i64 = row.try_get("id")?;
        UserId::new(id).ok_or_else(|| StoreError::InvalidRow(format!("user id {id}")))
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, StoreError> {
        let query = "SELECT id, password, role FROM users WHERE username = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let Some(row) = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?
        else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id")?;
        let role: String = row.try_get("role")?;
        Ok(Some(StoredCredentials {
            user_id: UserId::new(id)
                .ok_or_else(|| StoreError::InvalidRow(format!("user id {id}")))?,
            password_hash: row.try_get("password")?,
            role: Role::parse(&role)
                .ok_or_else(|| StoreError::InvalidRow(format!("role {role}")))?,
        }))
    }
}

/// In-memory store used by handler tests.
#[cfg(test)]
pub(crate) mod memory {
    use super::{CredentialStore, NewUser, StoreError, StoredCredentials};
    use crate::api::handlers::auth::principal::{Role, UserId};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MemoryCredentialStore {
        users: Mutex<HashMap<String, StoredCredentials>>,
    }

    impl MemoryCredentialStore {
        /// Out-of-band promotion, the same way an operator would do it in SQL.
        pub(crate) fn set_role(&self, username: &str, role: Role) {
            if let Ok(mut users) = self.users.lock() {
                if let Some(user) = users.get_mut(username) {
                    user.role = role;
                }
            }
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn insert_user(&self, user: &NewUser) -> Result<UserId, StoreError> {
            let mut users = self
                .users
                .lock()
                .map_err(|_| StoreError::InvalidRow("poisoned".to_string()))?;
            if users.contains_key(&user.username) {
                return Err(StoreError::UniqueViolation);
            }
            let next = i64::try_from(users.len()).unwrap_or(i64::MAX - 1) + 1;
            let user_id = UserId::new(next)
                .ok_or_else(|| StoreError::InvalidRow("user id".to_string()))?;
            users.insert(
                user.username.clone(),
                StoredCredentials {
                    user_id,
                    password_hash: user.password_hash.clone(),
                    role: user.role,
                },
            );
            Ok(user_id)
        }

        async fn find_credentials(
            &self,
            username: &str,
        ) -> Result<Option<StoredCredentials>, StoreError> {
            let users = self
                .users
                .lock()
                .map_err(|_| StoreError::InvalidRow("poisoned".to_string()))?;
            Ok(users.get(username).cloned())
        }
    }

    /// Store whose every call fails, for the opaque-500 paths.
    pub(crate) struct FailingCredentialStore(pub(crate) &'static str);

    #[async_trait]
    impl CredentialStore for FailingCredentialStore {
        async fn insert_user(&self, _user: &NewUser) -> Result<UserId, StoreError> {
            Err(StoreError::InvalidRow(self.0.to_string()))
        }

        async fn find_credentials(
            &self,
            _username: &str,
        ) -> Result<Option<StoredCredentials>, StoreError> {
            Err(StoreError::InvalidRow(self.0.to_string()))
        }
    }
}
