//! # Taskmart
//!
//! `taskmart` is a JSON API for personal task groups, a shopping cart, a product
//! catalog and a moderated review flow, all sitting behind a small stateless
//! authentication core.
//!
//! ## Authentication
//!
//! Users register with a username and password. Passwords are stored as
//! `Argon2id` digests (salt embedded in the PHC string). Login issues an `HS256`
//! JWT carrying `{user_id, role, iat, exp}` with a fixed 72 hour lifetime. There
//! is no server-side session: every protected request is verified from the
//! token alone, and logout is the client discarding it.
//!
//! ## Authorization
//!
//! Protected routes run the authentication gate first, which places a typed
//! [`api::Principal`] in the request extensions. Admin routes additionally
//! require `role = admin`. Role changes only reach a user on their next login,
//! so an already-issued token keeps its role until it expires.
//!
//! Resource access is scoped to the principal: groups, tasks, cart items and
//! profiles are only ever read or written with the caller's `user_id` in the
//! query predicate.

pub mod api;
pub mod cli;

#[cfg(test)]
mod test_support;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
