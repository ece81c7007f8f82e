//! Token issuance: HS256 JWTs keyed by the application's secret.
//!
//! Each application signs with its own secret, so tokens form one namespace per
//! tenant. Expiration is the only lifecycle control; there is no refresh or revocation.

use super::models::{Application, User};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error,
    get_current_timestamp,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub uid: i64,
    pub login: String,
    pub app_id: i64,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TokenIssuer {
    ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Claim set for `user` in `app`, issued at `now` (unix seconds).
    #[must_use]
    pub fn claims(&self, user: &User, app: &Application, now: u64) -> Claims {
        Claims {
            uid: user.id,
            login: user.login.clone(),
            app_id: app.id,
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        }
    }

    /// Sign a token for `user` with `app`'s secret.
    ///
    /// # Errors
    /// Returns an error if encoding or signing fails.
    pub fn issue(&self, user: &User, app: &Application) -> Result<String, Error> {
        let claims = self.claims(user, app, get_current_timestamp());
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(app.secret.expose_secret().as_bytes()),
        )
    }

    /// Verify `token` against a tenant secret and return its claims.
    ///
    /// # Errors
    /// Returns an error on a bad signature, a malformed token, or an expired token.
    pub fn verify(token: &str, secret: &SecretString) -> Result<Claims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
    }
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordDigest;
    use jsonwebtoken::errors::ErrorKind;

    fn user() -> User {
        User {
            id: 1,
            login: "alice".to_string(),
            pass_hash: PasswordDigest::from_stored("$2b$04$digest".to_string()),
            app_id: 1,
        }
    }

    fn app(id: i64, secret: &str) -> Application {
        Application {
            id,
            name: format!("app-{id}"),
            secret: SecretString::from(secret.to_string()),
        }
    }

    #[test]
    fn issued_token_carries_user_and_tenant() {
        let issuer = TokenIssuer::new(Duration::from_secs(600));
        let tenant = app(1, "tenant-one-secret");

        let before = get_current_timestamp();
        let token = issuer.issue(&user(), &tenant).unwrap();
        let claims = TokenIssuer::verify(&token, &tenant.secret).unwrap();

        assert_eq!(claims.uid, 1);
        assert_eq!(claims.login, "alice");
        assert_eq!(claims.app_id, 1);
        assert_eq!(claims.exp - claims.iat, 600);
        assert!(claims.iat >= before && claims.iat <= before + 1);
    }

    #[test]
    fn token_does_not_verify_with_another_tenant_secret() {
        let issuer = TokenIssuer::default();
        let token = issuer.issue(&user(), &app(1, "tenant-a")).unwrap();

        let other = SecretString::from("tenant-b".to_string());
        let err = TokenIssuer::verify(&token, &other).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tenant = app(1, "tenant-a");
        let now = get_current_timestamp();
        let claims = Claims {
            uid: 1,
            login: "alice".to_string(),
            app_id: 1,
            iat: now - 120,
            exp: now - 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"tenant-a"),
        )
        .unwrap();

        let err = TokenIssuer::verify(&token, &tenant.secret).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
    }

    #[test]
    fn claims_expire_after_ttl() {
        let issuer = TokenIssuer::new(Duration::from_secs(30));
        let claims = issuer.claims(&user(), &app(7, "s"), 1_000);
        assert_eq!(claims.app_id, 7);
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_030);
    }
}
