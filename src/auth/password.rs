//! Password digest policy (bcrypt).
//!
//! Hashing and verification are CPU-bound and run on the blocking pool.

use super::AuthError;
use std::fmt;
use ulid::Ulid;

/// Cost used when none is configured.
pub const DEFAULT_COST: u32 = 12;

/// Lowest cost accepted from process configuration.
pub const MIN_PRODUCTION_COST: u32 = 10;

/// Stored bcrypt digest (salt included). Never the plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Wrap a digest read back from storage.
    #[must_use]
    pub fn from_stored(digest: String) -> Self {
        Self(digest)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest(***)")
    }
}

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    // Verified against when the login is unknown, so both failure paths cost the same.
    decoy: PasswordDigest,
}

impl PasswordHasher {
    /// Build a hasher for the given bcrypt cost.
    ///
    /// # Errors
    /// Returns an error if the cost is outside bcrypt's accepted range.
    pub fn new(cost: u32) -> Result<Self, bcrypt::BcryptError> {
        let decoy = bcrypt::hash(Ulid::new().to_string(), cost)?;
        Ok(Self {
            cost,
            decoy: PasswordDigest(decoy),
        })
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Salt and hash `password`.
    ///
    /// # Errors
    /// Returns `Internal` if bcrypt fails or the blocking task is lost.
    pub async fn hash(&self, password: &str) -> Result<PasswordDigest, AuthError> {
        let cost = self.cost;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| AuthError::internal("password.hash", err))?
            .map(PasswordDigest)
            .map_err(|err| AuthError::internal("password.hash", err))
    }

    /// Check `password` against `digest`.
    ///
    /// # Errors
    /// Returns `Internal` if the stored digest is malformed or the blocking task is lost.
    pub async fn verify(&self, password: &str, digest: &PasswordDigest) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let digest = digest.0.clone();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &digest))
            .await
            .map_err(|err| AuthError::internal("password.verify", err))?
            .map_err(|err| AuthError::internal("password.verify", err))
    }

    /// Spend one verification on the decoy digest; the outcome is discarded.
    ///
    /// # Errors
    /// Returns `Internal` if the blocking task is lost.
    pub async fn verify_decoy(&self, password: &str) -> Result<(), AuthError> {
        self.verify(password, &self.decoy).await.map(|_| ())
    }
}
