//! Domain records shared by the auth service and the credential store.

use super::password::PasswordDigest;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub pass_hash: PasswordDigest,
    pub app_id: i64,
}

/// A tenant. The secret signs every token issued for its users.
#[derive(Debug, Clone)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub secret: SecretString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminGrant {
    pub id: i64,
    pub user_id: i64,
    pub level: AdminLevel,
    pub app_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("admin level must be a positive integer, got {0}")]
pub struct InvalidAdminLevel(pub i32);

/// Privilege level of an admin grant. Always positive; `0` means "not provided".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdminLevel(i32);

impl AdminLevel {
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for AdminLevel {
    type Error = InvalidAdminLevel;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(InvalidAdminLevel(value))
        }
    }
}

/// Result of revoking admin grants for a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminRevocation {
    removed: u64,
}

impl AdminRevocation {
    #[must_use]
    pub const fn new(removed: u64) -> Self {
        Self { removed }
    }

    /// Revocation succeeds whether or not a grant was present.
    #[must_use]
    pub const fn success(&self) -> bool {
        true
    }

    /// Number of grant rows deleted; `0` means there was nothing to revoke.
    #[must_use]
    pub const fn removed(&self) -> u64 {
        self.removed
    }
}
