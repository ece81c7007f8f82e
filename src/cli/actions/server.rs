use crate::{
    api::{self, ApiState},
    auth::{AuthConfig, AuthService},
    cli::telemetry,
    storage::SqliteStore,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_max_connections: u32,
    pub admin_key: SecretString,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub request_timeout: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database cannot be opened, the service configuration is
/// rejected, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let store = SqliteStore::connect(&args.dsn, args.db_max_connections)
        .await
        .context("Failed to open credential store")?;

    let auth_config = AuthConfig::new(args.admin_key)
        .with_token_ttl(args.token_ttl)
        .with_bcrypt_cost(args.bcrypt_cost);

    let auth = AuthService::new(Arc::new(store), auth_config)
        .context("Failed to build auth service")?;

    info!(
        token_ttl_seconds = args.token_ttl.as_secs(),
        bcrypt_cost = args.bcrypt_cost,
        "Auth service ready"
    );

    let state = Arc::new(ApiState::new(Arc::new(auth), args.request_timeout));
    let result = api::new(args.port, state).await;

    telemetry::shutdown_tracer();

    result
}
