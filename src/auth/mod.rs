//! Auth domain service.
//!
//! Flow Overview:
//! 1) Admin-gated operations compare the presented key first and return `NotRights`
//!    without touching the store on mismatch.
//! 2) Store and hashing steps run under the caller's [`CallContext`] so deadlines and
//!    cancellation abandon in-flight work.
//! 3) Every lower-layer failure is folded into exactly one [`AuthError`] before returning.
//!
//! Login failures are uniform: an unknown login still pays one bcrypt verification
//! against a decoy digest and returns the same `InvalidCredentials` as a wrong password.

pub mod context;
pub mod error;
pub mod models;
pub mod password;
pub mod token;


pub use context::CallContext;
pub use error::AuthError;
pub use models::{AdminGrant, AdminLevel, AdminRevocation, Application, InvalidAdminLevel, User};
pub use password::{PasswordDigest, PasswordHasher};
pub use token::{Claims, TokenIssuer};

use crate::storage::{CredentialStore, StoreError};
use anyhow::{Context, Result};
use constant_time_eq::constant_time_eq;
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

/// Immutable service configuration, injected once at startup.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    admin_key: SecretString,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(admin_key: SecretString) -> Self {
        Self {
            admin_key,
            token_ttl: token::DEFAULT_TOKEN_TTL,
            bcrypt_cost: password::DEFAULT_COST,
        }
    }

    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    admin_key: SecretString,
}

impl AuthService {
    /// Build the service over `store`.
    ///
    /// # Errors
    /// Returns an error if the admin key is empty or the bcrypt cost is below
    /// [`password::MIN_PRODUCTION_COST`] or outside bcrypt's range.
    pub fn new(store: Arc<dyn CredentialStore>, config: AuthConfig) -> Result<Self> {
        if config.bcrypt_cost < password::MIN_PRODUCTION_COST {
            anyhow::bail!(
                "bcrypt cost {} is below the minimum of {}",
                config.bcrypt_cost,
                password::MIN_PRODUCTION_COST
            );
        }

        Self::build(store, config)
    }

    /// Same as [`AuthService::new`] without the cost floor, so tests can hash at cost 4.
    #[cfg(test)]
    pub(crate) fn with_fast_hashing(
        store: Arc<dyn CredentialStore>,
        config: AuthConfig,
    ) -> Result<Self> {
        Self::build(store, config)
    }

    fn build(store: Arc<dyn CredentialStore>, config: AuthConfig) -> Result<Self> {
        if config.admin_key.expose_secret().is_empty() {
            anyhow::bail!("Admin key must not be empty");
        }

        let hasher = PasswordHasher::new(config.bcrypt_cost)
            .with_context(|| format!("Invalid bcrypt cost: {}", config.bcrypt_cost))?;

        Ok(Self {
            store,
            hasher,
            issuer: TokenIssuer::new(config.token_ttl),
            admin_key: config.admin_key,
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn issuer(&self) -> TokenIssuer {
        self.issuer
    }

    fn authorize(&self, key: &str) -> Result<(), AuthError> {
        if constant_time_eq(key.as_bytes(), self.admin_key.expose_secret().as_bytes()) {
            Ok(())
        } else {
            warn!("Admin key mismatch");
            Err(AuthError::NotRights)
        }
    }

    /// Register `login` in application `app_id` and return the new user id.
    ///
    /// # Errors
    /// `UserExists` when the login is taken in that application, `AppNotFound` when the
    /// application does not exist.
    #[instrument(
        name = "auth.register_user",
        skip(self, ctx, password),
        fields(request_id = %ctx.request_id())
    )]
    pub async fn register_user(
        &self,
        ctx: CallContext,
        login: &str,
        password: &str,
        app_id: i64,
    ) -> Result<i64, AuthError> {
        let digest = ctx.bound(self.hasher.hash(password)).await??;
        let user_id = ctx
            .bound(self.store.save_user(login, &digest, app_id))
            .await??;

        info!(user_id, "User registered");
        Ok(user_id)
    }

    /// Authenticate `login` in application `app_id` and return a signed token.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown login or a wrong password, `AppNotFound` when
    /// the application is missing.
    #[instrument(
        name = "auth.login_user",
        skip(self, ctx, password),
        fields(request_id = %ctx.request_id())
    )]
    pub async fn login_user(
        &self,
        ctx: CallContext,
        login: &str,
        password: &str,
        app_id: i64,
    ) -> Result<String, AuthError> {
        let user = match ctx.bound(self.store.find_user(login, app_id)).await? {
            Ok(user) => user,
            Err(StoreError::UserNotFound) => {
                ctx.bound(self.hasher.verify_decoy(password)).await??;
                debug!("Unknown login");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => return Err(err.into()),
        };

        if !ctx
            .bound(self.hasher.verify(password, &user.pass_hash))
            .await??
        {
            debug!(user_id = user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let app = ctx.bound(self.store.find_application(app_id)).await??;

        let token = self
            .issuer
            .issue(&user, &app)
            .map_err(|err| AuthError::internal("token.issue", err))?;

        info!(user_id = user.id, "User logged in");
        Ok(token)
    }

    /// Return the admin grant `user_id` holds in `app_id`.
    ///
    /// # Errors
    /// `InvalidCredentials` when there is no grant; callers treat it as "not admin".
    #[instrument(
        name = "auth.check_is_admin",
        skip(self, ctx),
        fields(request_id = %ctx.request_id())
    )]
    pub async fn check_is_admin(
        &self,
        ctx: CallContext,
        user_id: i64,
        app_id: i64,
    ) -> Result<AdminGrant, AuthError> {
        let grant = ctx
            .bound(self.store.find_admin_grant(user_id, app_id))
            .await??;
        debug!(level = grant.level.get(), "Admin grant found");
        Ok(grant)
    }

    /// Grant `level` to `login` in `app_id` and return the grant id.
    ///
    /// # Errors
    /// `NotRights` on a key mismatch (nothing is read or written), `InvalidCredentials`
    /// when the user does not exist in that application, `AdminExists` when it already
    /// holds a grant there.
    #[instrument(
        name = "auth.create_admin",
        skip(self, ctx, key),
        fields(request_id = %ctx.request_id(), level = level.get())
    )]
    pub async fn create_admin(
        &self,
        ctx: CallContext,
        login: &str,
        level: AdminLevel,
        key: &str,
        app_id: i64,
    ) -> Result<i64, AuthError> {
        self.authorize(key)?;

        let grant_id = ctx
            .bound(self.store.create_admin_grant(login, level, app_id))
            .await??;

        info!(grant_id, "Admin grant created");
        Ok(grant_id)
    }

    /// Revoke every admin grant held by `login`.
    ///
    /// # Errors
    /// `NotRights` on a key mismatch, `InvalidCredentials` when no user has that login.
    #[instrument(
        name = "auth.delete_admin",
        skip(self, ctx, key),
        fields(request_id = %ctx.request_id())
    )]
    pub async fn delete_admin(
        &self,
        ctx: CallContext,
        login: &str,
        key: &str,
    ) -> Result<AdminRevocation, AuthError> {
        self.authorize(key)?;

        let removed = ctx.bound(self.store.delete_admin_grant(login)).await??;

        info!(removed, "Admin grants revoked");
        Ok(AdminRevocation::new(removed))
    }

    /// Register an application and return its id.
    ///
    /// # Errors
    /// `NotRights` on a key mismatch, `AppExists` when the name is taken.
    #[instrument(
        name = "auth.add_app",
        skip(self, ctx, secret, key),
        fields(request_id = %ctx.request_id())
    )]
    pub async fn add_app(
        &self,
        ctx: CallContext,
        name: &str,
        secret: &SecretString,
        key: &str,
    ) -> Result<i64, AuthError> {
        self.authorize(key)?;

        let app_id = ctx
            .bound(self.store.create_application(name, secret))
            .await??;

        info!(app_id, "Application registered");
        Ok(app_id)
    }
}
