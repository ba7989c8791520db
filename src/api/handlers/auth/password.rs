//! Argon2id password hashing.
//!
//! Digests are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so the
//! salt and the work factor travel with the stored value. Hashing is slow by
//! construction; callers on the async executor go through [`PasswordHasher::hash_blocking`]
//! and [`PasswordHasher::verify_blocking`].

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("hashing task failed: {0}")]
    Task(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HasherConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// # Errors
    /// Returns an error if argon2 rejects the work factor.
    pub fn new(config: HasherConfig) -> Result<Self, HashError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|err| HashError::Params(err.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash with a fresh random salt.
    ///
    /// # Errors
    /// Only on internal argon2 failure; treat as fatal to the request.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|err| HashError::Hash(err.to_string()))
    }

    /// Constant-time check of `password` against a stored digest.
    ///
    /// The work factor is read from the digest itself. A digest that does not
    /// parse is a mismatch, not an error.
    #[must_use]
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// [`Self::hash`] on the blocking pool.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the blocking task panics.
    pub async fn hash_blocking(&self, password: String) -> Result<String, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| HashError::Task(err.to_string()))?
    }

    /// [`Self::verify`] on the blocking pool.
    ///
    /// # Errors
    /// Returns an error only if the blocking task panics or is cancelled.
    pub async fn verify_blocking(&self, password: String, digest: String) -> Result<bool, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|err| HashError::Task(err.to_string()))
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    // Minimum work factor so the suite stays fast.
    PasswordHasher {
        params: Params::new(Params::MIN_M_COST, 1, 1, None)
            .unwrap_or_else(|_| Params::default()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hasher = test_hasher();
        let digest = hasher.hash("password123").unwrap();

        assert_ne!(digest, "password123");
        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify("password123", &digest));
        assert!(!hasher.verify("password124", &digest));
    }

    #[test]
    fn salts_differ_per_hash() {
        let hasher = test_hasher();
        let first = hasher.hash("same_password").unwrap();
        let second = hasher.hash("same_password").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("same_password", &first));
        assert!(hasher.verify("same_password", &second));
    }

    #[test]
    fn garbage_digest_is_a_mismatch() {
        let hasher = test_hasher();
        assert!(!hasher.verify("password123", ""));
        assert!(!hasher.verify("password123", "not-a-phc-string"));
    }

    #[test]
    fn verify_uses_parameters_from_digest() {
        let weak = test_hasher();
        let digest = weak.hash("password123").unwrap();

        let strong = PasswordHasher::new(HasherConfig {
            memory_kib: 16 * 1024,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(strong.verify("password123", &digest));
    }

    #[test]
    fn rejects_invalid_params() {
        let result = PasswordHasher::new(HasherConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 0,
        });
        assert!(matches!(result, Err(HashError::Params(_))));
    }

    #[tokio::test]
    async fn blocking_variants_match_sync() {
        let hasher = test_hasher();
        let digest = hasher.hash_blocking("password123".to_string()).await.unwrap();
        assert!(
            hasher
                .verify_blocking("password123".to_string(), digest.clone())
                .await
                .unwrap()
        );
        assert!(
            !hasher
                .verify_blocking("wrong".to_string(), digest)
                .await
                .unwrap()
        );
    }
}
