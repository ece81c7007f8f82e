//! Credential store: persistence for users, applications and admin grants.
//!
//! Implementations classify every engine-specific condition (missing row,
//! uniqueness or foreign-key violation) into [`StoreError`] before returning,
//! so the auth service never sees a raw driver error it has to interpret.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::auth::{AdminGrant, AdminLevel, Application, PasswordDigest, User};
use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    UserNotFound,
    #[error("user already exists")]
    UserExists,
    #[error("application not found")]
    AppNotFound,
    #[error("application already exists")]
    AppExists,
    #[error("admin grant already exists")]
    GrantExists,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Operations the auth service needs from persistence. Each call is a single
/// short-lived statement (or a read followed by a write, for revocation).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a user and return its id. `UserExists` when `(login, app_id)` is taken,
    /// `AppNotFound` when the application does not exist.
    async fn save_user(
        &self,
        login: &str,
        pass_hash: &PasswordDigest,
        app_id: i64,
    ) -> Result<i64, StoreError>;

    async fn find_user(&self, login: &str, app_id: i64) -> Result<User, StoreError>;

    /// `UserNotFound` when no grant exists for the pair.
    async fn find_admin_grant(&self, user_id: i64, app_id: i64) -> Result<AdminGrant, StoreError>;

    async fn find_application(&self, app_id: i64) -> Result<Application, StoreError>;

    /// Grant `level` to the user with `login` in `app_id`. `UserNotFound` when that user
    /// does not exist in the application, `GrantExists` when it already holds a grant there.
    async fn create_admin_grant(
        &self,
        login: &str,
        level: AdminLevel,
        app_id: i64,
    ) -> Result<i64, StoreError>;

    /// Remove every grant held by users with `login` and return the number removed.
    /// `UserNotFound` when no user has that login.
    async fn delete_admin_grant(&self, login: &str) -> Result<u64, StoreError>;

    async fn create_application(
        &self,
        name: &str,
        secret: &SecretString,
    ) -> Result<i64, StoreError>;

    /// Round-trip to the engine, used by health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
