//! # Chiave (multi-tenant credential service)
//!
//! `chiave` registers users inside an *application* (tenant), authenticates them,
//! issues signed session tokens and manages a per-user, per-application admin grant.
//!
//! ## Tenant Model
//!
//! An application is an isolated namespace of users plus the secret used to sign
//! tokens for them.
//!
//! - **Scoped logins:** a login is unique inside one application only; the same login
//!   can be registered independently in another application.
//! - **Independent keys:** each application signs with its own secret, so a token
//!   issued for one tenant never verifies with another tenant's secret.
//!
//! ## Authentication
//!
//! Passwords are stored as salted bcrypt digests. A failed login never reveals whether
//! the login exists: unknown logins and wrong passwords return the same error and
//! cost the same bcrypt verification.
//!
//! ## Admin Grants
//!
//! Granting, revoking and tenant registration are gated by a single shared admin key
//! configured at startup and compared in constant time. Holding the key is the only
//! check; there is no per-caller identity.

pub mod api;
pub mod auth;
pub mod cli;
pub mod storage;

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
