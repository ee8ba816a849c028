//! # Infrastructure Layer
//!
//! Concrete implementations behind the token core:
//! - **Cache**: Redis client with startup retry and per-command deadlines
//! - **Session**: Redis implementation of `SessionStore`
//! - **Logging**: tracing subscriber bootstrap
//!
//! [`initialize`] wires configuration, logging, Redis and the token service
//! together for an HTTP layer to hold on to.

use ig_core::{DomainError, IdentityProvider, StoreError, TokenService, TokenServiceConfig};
use ig_shared::{AppConfig, Environment};
use std::path::{Path, PathBuf};

/// Cache module - Redis client and operations
pub mod cache;

/// Logging bootstrap
pub mod logging;

/// Session module - Redis-backed session store
pub mod session;

pub use cache::{CacheConfig, RedisClient};
pub use session::RedisSessionStore;

/// Token service over the Redis session store
pub type RedisTokenService<I> = TokenService<RedisSessionStore, I>;

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Redis cache error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// A Redis command exceeded the response timeout
    #[error("Cache operation {operation} timed out after {millis}ms")]
    Timeout {
        operation: &'static str,
        millis: u64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token core rejected the configuration
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<InfrastructureError> for StoreError {
    fn from(error: InfrastructureError) -> Self {
        match error {
            InfrastructureError::Timeout { millis, .. } => StoreError::Timeout { millis },
            other => StoreError::unavailable(other),
        }
    }
}

/// Load configuration from the environment
///
/// `.env.{environment}` and then `.env` are read from the working directory
/// first, when present. A file that exists but cannot be parsed is an error.
pub fn load_config() -> Result<AppConfig, InfrastructureError> {
    load_dotenv_files(Path::new("."), Environment::from_env())?;
    Ok(AppConfig::from_env())
}

/// Load the dotenv files of `environment` found in `dir`, returning the ones read
pub fn load_dotenv_files(
    dir: &Path,
    environment: Environment,
) -> Result<Vec<PathBuf>, InfrastructureError> {
    let mut loaded = Vec::new();
    for name in environment.dotenv_files() {
        let path = dir.join(name);
        match dotenvy::from_path(&path) {
            Ok(()) => loaded.push(path),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(InfrastructureError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
    Ok(loaded)
}

/// Connect to Redis and verify the connection with a PING
pub async fn connect_store(config: &CacheConfig) -> Result<RedisSessionStore, InfrastructureError> {
    let client = RedisClient::new(config.clone()).await?;
    if !client.health_check().await? {
        return Err(InfrastructureError::Config(
            "Redis health check returned an unexpected response".to_string(),
        ));
    }
    Ok(RedisSessionStore::new(client))
}

/// Build the token service from configuration
///
/// Token settings are validated before any connection is attempted.
pub async fn build_token_service<I: IdentityProvider>(
    config: &AppConfig,
    identity: I,
) -> Result<RedisTokenService<I>, InfrastructureError> {
    let token_config =
        TokenServiceConfig::try_from(&config.jwt).map_err(DomainError::from)?;
    let store = connect_store(&config.cache).await?;
    let service = TokenService::new(store, identity, token_config).map_err(DomainError::from)?;
    Ok(service)
}

/// Initialize logging and the token service
///
/// This function sets up:
/// - the tracing subscriber
/// - the Redis connection
/// - the token service
pub async fn initialize<I: IdentityProvider>(
    config: &AppConfig,
    identity: I,
) -> Result<RedisTokenService<I>, InfrastructureError> {
    logging::init(&config.logging)?;
    tracing::info!(environment = %config.environment, "Initializing infrastructure services");

    let service = build_token_service(config, identity).await?;

    tracing::info!(
        access_ttl_secs = service.config().access_ttl.as_secs(),
        refresh_ttl_secs = service.config().refresh_ttl.as_secs(),
        "Infrastructure services initialized successfully"
    );
    Ok(service)
}
