use secrecy::SecretString;
use std::{fmt, sync::Arc};

use super::{
    password::{HashError, HasherConfig, PasswordHasher},
    storage::CredentialStore,
    token::TokenKeys,
};

/// Startup inputs for the auth core, collected from the CLI.
#[derive(Clone)]
pub struct AuthConfig {
    token_secret: SecretString,
    hasher: HasherConfig,
}

impl AuthConfig {
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            hasher: HasherConfig::default(),
        }
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: HasherConfig) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    #[must_use]
    pub const fn hasher(&self) -> HasherConfig {
        self.hasher
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"***")
            .field("hasher", &self.hasher)
            .finish()
    }
}

/// Immutable auth wiring shared by every request.
pub struct AuthState {
    keys: TokenKeys,
    hasher: PasswordHasher,
    store: Arc<dyn CredentialStore>,
    decoy_digest: String,
}

impl AuthState {
    /// Builds the state and computes the decoy digest used on login misses.
    ///
    /// # Errors
    /// Returns an error if the decoy digest cannot be produced.
    pub fn new(
        keys: TokenKeys,
        hasher: PasswordHasher,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, HashError> {
        let decoy_digest = hasher.hash(&ulid::Ulid::new().to_string())?;
        Ok(Self {
            keys,
            hasher,
            store,
            decoy_digest,
        })
    }

    #[must_use]
    pub const fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    #[must_use]
    pub const fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    #[must_use]
    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Digest with the server's work factor that matches no real password.
    #[must_use]
    pub fn decoy_digest(&self) -> &str {
        &self.decoy_digest
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("keys", &self.keys)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) const TEST_SECRET: &str = "test-signing-secret";

#[cfg(test)]
pub(crate) fn test_state_with_store(store: Arc<dyn CredentialStore>) -> Arc<AuthState> {
    let keys = TokenKeys::new(SecretString::from(TEST_SECRET))
        .unwrap_or_else(|err| panic!("test secret rejected: {err}"));
    let state = AuthState::new(keys, super::password::test_hasher(), store)
        .unwrap_or_else(|err| panic!("decoy digest: {err}"));
    Arc::new(state)
}

#[cfg(test)]
pub(crate) fn test_state() -> Arc<AuthState> {
    test_state_with_store(Arc::new(
        super::storage::memory::MemoryCredentialStore::default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoy_digest_is_a_real_phc_string() {
        let state = test_state();
        assert!(state.decoy_digest().starts_with("$argon2id$"));
        assert!(!state.hasher().verify("password123", state.decoy_digest()));
    }

    #[test]
    fn debug_does_not_print_secret() {
        let rendered = format!("{:?}", test_state());
        assert!(!rendered.contains(TEST_SECRET));
    }
}
