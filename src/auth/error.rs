use crate::storage::StoreError;
use thiserror::Error;
use tracing::error;

/// Every failure the auth service can return.
///
/// Lower-layer errors (storage, bcrypt, JWT signing) are classified into exactly one
/// of these before leaving the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown login, wrong password, or missing admin grant/target.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user already exists")]
    UserExists,
    #[error("application already exists")]
    AppExists,
    #[error("application not found")]
    AppNotFound,
    #[error("admin grant already exists")]
    AdminExists,
    /// Admin key mismatch.
    #[error("not enough rights")]
    NotRights,
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// Detail is for logs only; adapters must not echo it to clients.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub(crate) fn internal(op: &'static str, err: impl std::fmt::Display) -> Self {
        error!(op, "internal failure: {err}");
        Self::Internal(format!("{op}: {err}"))
    }

    /// `true` for errors caused by the caller's input rather than by the service.
    #[must_use]
    pub const fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::UserExists
                | Self::AppExists
                | Self::AppNotFound
                | Self::AdminExists
                | Self::NotRights
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound => Self::InvalidCredentials,
            StoreError::UserExists => Self::UserExists,
            StoreError::AppExists => Self::AppExists,
            StoreError::AppNotFound => Self::AppNotFound,
            StoreError::GrantExists => Self::AdminExists,
            StoreError::Database(err) => Self::internal("store", err),
        }
    }
}
