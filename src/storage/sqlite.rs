//! SQLite-backed credential store.
//!
//! Flow Overview:
//! 1) Open the pool (`create_if_missing`, WAL, foreign keys on).
//! 2) Apply `sql/schema.sql`; every statement is idempotent.
//! 3) Serve single-statement reads and writes, classifying engine errors on the way out.

use super::{CredentialStore, StoreError};
use crate::auth::{AdminGrant, AdminLevel, Application, PasswordDigest, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use std::str::FromStr;
use tracing::{Instrument, debug, info, info_span};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

macro_rules! db_span {
    ($operation:expr, $statement:expr) => {
        info_span!(
            "db.query",
            db.system = "sqlite",
            db.operation = $operation,
            db.statement = $statement
        )
    };
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `dsn` and apply the schema.
    ///
    /// # Errors
    /// Returns an error if the DSN is invalid, the pool cannot connect, or the schema fails.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(dsn)
            .with_context(|| format!("Invalid SQLite DSN: {dsn}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!("Connected to {dsn}");

        let store = Self { pool };
        store.apply_schema().await?;
        Ok(store)
    }

    /// In-memory database on a single pinned connection (state lives in that connection).
    ///
    /// # Errors
    /// Returns an error if the connection or the schema fails.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory DSN")?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.apply_schema().await?;
        Ok(store)
    }

    /// Apply `sql/schema.sql`.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(db_span!("DDL", "sql/schema.sql"))
            .await
            .context("Failed to apply schema")?;
        debug!("Schema applied");
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        login: row.try_get("login")?,
        pass_hash: PasswordDigest::from_stored(row.try_get("pass_hash")?),
        app_id: row.try_get("app_id")?,
    })
}

fn grant_from_row(row: &SqliteRow) -> Result<AdminGrant, sqlx::Error> {
    let lvl: i32 = row.try_get("lvl")?;
    let level = AdminLevel::try_from(lvl).map_err(|err| sqlx::Error::ColumnDecode {
        index: "lvl".to_string(),
        source: Box::new(err),
    })?;
    Ok(AdminGrant {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        level,
        app_id: row.try_get("app_id")?,
    })
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn save_user(
        &self,
        login: &str,
        pass_hash: &PasswordDigest,
        app_id: i64,
    ) -> Result<i64, StoreError> {
        let query = "INSERT INTO users (login, pass_hash, app_id) VALUES (?1, ?2, ?3) RETURNING id";
        let result = sqlx::query(query)
            .bind(login)
            .bind(pass_hash.as_str())
            .bind(app_id)
            .fetch_one(&self.pool)
            .instrument(db_span!("INSERT", query))
            .await;

        match result {
            Ok(row) => Ok(row.try_get("id")?),
            Err(err) if is_unique_violation(&err) => Err(StoreError::UserExists),
            Err(err) if is_foreign_key_violation(&err) => Err(StoreError::AppNotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_user(&self, login: &str, app_id: i64) -> Result<User, StoreError> {
        let query = r"
            SELECT id, login, pass_hash, app_id
            FROM users
            WHERE login = ?1 AND app_id = ?2
        ";
        let row = sqlx::query(query)
            .bind(login)
            .bind(app_id)
            .fetch_optional(&self.pool)
            .instrument(db_span!("SELECT", query))
            .await?
            .ok_or(StoreError::UserNotFound)?;

        Ok(user_from_row(&row)?)
    }

    async fn find_admin_grant(&self, user_id: i64, app_id: i64) -> Result<AdminGrant, StoreError> {
        let query = r"
            SELECT id, user_id, lvl, app_id
            FROM admins
            WHERE user_id = ?1 AND app_id = ?2
        ";
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(app_id)
            .fetch_optional(&self.pool)
            .instrument(db_span!("SELECT", query))
            .await?
            .ok_or(StoreError::UserNotFound)?;

        Ok(grant_from_row(&row)?)
    }

    async fn find_application(&self, app_id: i64) -> Result<Application, StoreError> {
        let query = "SELECT id, name, secret FROM apps WHERE id = ?1";
        let row = sqlx::query(query)
            .bind(app_id)
            .fetch_optional(&self.pool)
            .instrument(db_span!("SELECT", query))
            .await?
            .ok_or(StoreError::AppNotFound)?;

        let secret: String = row.try_get("secret")?;
        Ok(Application {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            secret: SecretString::from(secret),
        })
    }

    async fn create_admin_grant(
        &self,
        login: &str,
        level: AdminLevel,
        app_id: i64,
    ) -> Result<i64, StoreError> {
        // Resolves the user inside the tenant and inserts in one statement.
        let query = r"
            INSERT INTO admins (user_id, lvl, app_id)
            SELECT id, ?1, app_id FROM users WHERE login = ?2 AND app_id = ?3
            RETURNING id
        ";
        let result = sqlx::query(query)
            .bind(level.get())
            .bind(login)
            .bind(app_id)
            .fetch_optional(&self.pool)
            .instrument(db_span!("INSERT", query))
            .await;

        match result {
            Ok(Some(row)) => Ok(row.try_get("id")?),
            Ok(None) => Err(StoreError::UserNotFound),
            Err(err) if is_unique_violation(&err) => Err(StoreError::GrantExists),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_admin_grant(&self, login: &str) -> Result<u64, StoreError> {
        let query = "DELETE FROM admins WHERE user_id IN (SELECT id FROM users WHERE login = ?1)";
        let removed = sqlx::query(query)
            .bind(login)
            .execute(&self.pool)
            .instrument(db_span!("DELETE", query))
            .await?
            .rows_affected();

        if removed > 0 {
            return Ok(removed);
        }

        // Nothing deleted: tell "no such login" apart from "login without grants".
        let query = "SELECT COUNT(*) AS users FROM users WHERE login = ?1";
        let row = sqlx::query(query)
            .bind(login)
            .fetch_one(&self.pool)
            .instrument(db_span!("SELECT", query))
            .await?;
        let users: i64 = row.try_get("users")?;

        if users > 0 {
            Ok(0)
        } else {
            Err(StoreError::UserNotFound)
        }
    }

    async fn create_application(
        &self,
        name: &str,
        secret: &SecretString,
    ) -> Result<i64, StoreError> {
        let query = "INSERT INTO apps (name, secret) VALUES (?1, ?2) RETURNING id";
        let result = sqlx::query(query)
            .bind(name)
            .bind(secret.expose_secret())
            .fetch_one(&self.pool)
            .instrument(db_span!("INSERT", query))
            .await;

        match result {
            Ok(row) => Ok(row.try_get("id")?),
            Err(err) if is_unique_violation(&err) => Err(StoreError::AppExists),
            Err(err) => Err(err.into()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let query = "SELECT 1";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(db_span!("SELECT", query))
            .await?;
        Ok(())
    }
}
