//! HS256 session tokens.
//!
//! Wire format is a compact JWT with header `{"typ":"JWT","alg":"HS256"}` and
//! claims `{user_id, role, iat, exp}`, encoded and signed with `jsonwebtoken`.
//!
//! Verification order is fixed: structure, algorithm, signature, expiry, claims.
//! The algorithm check runs before any MAC work so a token declaring `none`
//! (or any asymmetric scheme) is refused no matter what its signature says.

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    error::AuthError,
    principal::{Principal, Role, UserId},
};

pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Fixed session lifetime.
pub const TOKEN_TTL_SECONDS: i64 = 72 * 60 * 60;

/// Claims as issued. Verification reads them back as a JSON object so that a
/// missing or mistyped field is reported as `InvalidClaims`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: i64,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Header read without the algorithm enum, so unknown names such as `none`
/// can still be reported.
#[derive(Deserialize)]
struct DeclaredHeader {
    alg: String,
}

/// Process-wide signing key. Built once at startup and shared read-only.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").field("secret", &"***").finish()
    }
}

impl TokenKeys {
    /// # Errors
    /// Returns an error if the secret is empty; there is no usable default.
    pub fn new(secret: SecretString) -> Result<Self, AuthError> {
        if secret.expose_secret().trim().is_empty() {
            return Err(AuthError::InternalFailure(
                "token signing secret is empty".to_string(),
            ));
        }
        let secret = secret.expose_secret().as_bytes();

        // Expiry is compared against the caller's clock in `verify_at`; the
        // library only checks that `exp` is present and numeric.
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Mint a token for `user_id` asserting `role`, valid for [`TOKEN_TTL_SECONDS`].
    ///
    /// # Errors
    /// Returns `InternalFailure` if the claims cannot be encoded.
    pub fn issue(&self, user_id: UserId, role: Role) -> Result<String, AuthError> {
        self.issue_at(user_id, role, now_unix_seconds())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: UserId,
        role: Role,
        now: i64,
    ) -> Result<String, AuthError> {
        let claims = SessionClaims {
            user_id: user_id.get(),
            role,
            iat: now,
            exp: now + TOKEN_TTL_SECONDS,
        };
        encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding)
            .map_err(|err| AuthError::InternalFailure(format!("encode token: {err}")))
    }

    /// Validate `token` and return the principal it asserts.
    ///
    /// # Errors
    /// `InvalidToken`, `UnexpectedAlgorithm`, `InvalidSignature`, `Expired` or
    /// `InvalidClaims`, in that order of precedence.
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        self.verify_at(token, now_unix_seconds())
    }

    pub(crate) fn verify_at(&self, token: &str, now: i64) -> Result<Principal, AuthError> {
        if token.split('.').count() != 3 {
            return Err(AuthError::InvalidToken);
        }

        match decode_header(token) {
            Ok(header) if header.alg == TOKEN_ALGORITHM => (),
            Ok(header) => {
                return Err(AuthError::UnexpectedAlgorithm(format!("{:?}", header.alg)))
            }
            Err(_) => return Err(undecodable_header(token)),
        }

        let claims = decode::<Map<String, Value>>(token, &self.decoding, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims,
                ErrorKind::InvalidAlgorithm => {
                    AuthError::UnexpectedAlgorithm("unsupported".to_string())
                }
                _ => AuthError::InvalidToken,
            })?
            .claims;

        match claims.get("exp").and_then(Value::as_i64) {
            Some(exp) if exp <= now => return Err(AuthError::Expired),
            Some(_) => (),
            None => return Err(AuthError::InvalidClaims),
        }

        let user_id = claims
            .get("user_id")
            .and_then(Value::as_i64)
            .and_then(UserId::new)
            .ok_or(AuthError::InvalidClaims)?;
        let role = claims
            .get("role")
            .and_then(Value::as_str)
            .and_then(Role::parse)
            .ok_or(AuthError::InvalidClaims)?;

        Ok(Principal { user_id, role })
    }
}

/// Classify a header `jsonwebtoken` refused. An algorithm name outside its
/// enum (`none`, `hs256`) is still an algorithm rejection, not a parse error.
fn undecodable_header(token: &str) -> AuthError {
    token
        .split('.')
        .next()
        .and_then(|segment| Base64UrlUnpadded::decode_vec(segment).ok())
        .and_then(|bytes| serde_json::from_slice::<DeclaredHeader>(&bytes).ok())
        .filter(|header| header.alg != "HS256")
        .map_or(AuthError::InvalidToken, |header| {
            AuthError::UnexpectedAlgorithm(header.alg)
        })
}

/// Pull the raw token out of an `Authorization: Bearer <token>` value. The
/// scheme name is case-insensitive.
///
/// # Errors
/// `MalformedHeader` when the header is absent, empty, or not a bearer credential.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let (scheme, token) = header
        .map(str::trim)
        .and_then(|value| value.split_once(' '))
        .ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
