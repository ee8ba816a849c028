//! Redis cache client implementation
//!
//! Connection setup retries with exponential backoff. Individual commands are
//! never retried: each one runs once under the configured response timeout,
//! and callers decide what a failure means.

use redis::{
    aio::MultiplexedConnection, AsyncCommands, Client, IntoConnectionInfo, RedisError, RedisResult,
    Script,
};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::cache::CacheConfig;
use crate::InfrastructureError;

/// Base delay between connection attempts
const CONNECT_RETRY_DELAY_MS: u64 = 100;

/// Upper bound for the connection backoff
const CONNECT_RETRY_MAX_DELAY_MS: u64 = 5000;

/// Writes a value with expiry, adds a member to a set and raises the set's
/// TTL to at least the same expiry, all in one step.
///
/// KEYS: value key, set key. ARGV: value, member, seconds.
/// `TTL` is -1 for a set without expiry and -2 for a fresh one, so both are
/// raised. Returns 1 when the member was new.
const SET_AND_TRACK_LUA: &str = r#"
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
local added = redis.call('SADD', KEYS[2], ARGV[2])
if redis.call('TTL', KEYS[2]) < tonumber(ARGV[3]) then
    redis.call('EXPIRE', KEYS[2], ARGV[3])
end
return added
"#;

/// Redis client over a shared multiplexed connection
#[derive(Clone)]
pub struct RedisClient {
    /// Redis multiplexed connection for async operations
    connection: MultiplexedConnection,
    /// Configuration used to create this client
    config: CacheConfig,
    /// Deadline applied to every command
    response_timeout: Duration,
    /// Loaded lazily by `EVALSHA`, falling back to `EVAL`
    set_and_track: Script,
}

impl RedisClient {
    /// Connect to Redis
    ///
    /// # Example
    /// ```no_run
    /// use ig_infra::cache::{CacheConfig, RedisClient};
    ///
    /// async fn create_client() -> Result<RedisClient, ig_infra::InfrastructureError> {
    ///     let config = CacheConfig::new("redis://localhost:6379").with_prefix("immogestion");
    ///     RedisClient::new(config).await
    /// }
    /// ```
    pub async fn new(config: CacheConfig) -> Result<Self, InfrastructureError> {
        info!(
            url = %mask_url(&config.url),
            database = config.database,
            "Creating Redis client"
        );

        let mut info = config.url.as_str().into_connection_info().map_err(|e| {
            error!(error = %e, "Failed to parse Redis URL");
            InfrastructureError::Config(format!("Invalid Redis URL: {}", e))
        })?;
        if config.database != 0 {
            info.redis.db = i64::from(config.database);
        }
        let client = Client::open(info).map_err(|e| {
            InfrastructureError::Config(format!("Invalid Redis connection settings: {}", e))
        })?;

        let connection = Self::create_connection_with_retry(
            &client,
            config.connect_attempts.max(1),
            Duration::from_secs(config.connection_timeout.max(1)),
        )
        .await?;

        info!("Redis client created successfully");

        Ok(Self {
            connection,
            response_timeout: Duration::from_secs(config.response_timeout.max(1)),
            set_and_track: Script::new(SET_AND_TRACK_LUA),
            config,
        })
    }

    /// Create multiplexed connection with retry logic
    async fn create_connection_with_retry(
        client: &Client,
        max_attempts: u32,
        connect_timeout: Duration,
    ) -> Result<MultiplexedConnection, InfrastructureError> {
        let mut attempts = 0;
        let mut delay = CONNECT_RETRY_DELAY_MS;

        loop {
            attempts += 1;
            debug!(attempt = attempts, "Connecting to Redis");

            let result = match timeout(connect_timeout, client.get_multiplexed_async_connection()).await {
                Ok(result) => result,
                Err(_) => Err(RedisError::from(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connection attempt timed out",
                ))),
            };

            match result {
                Ok(connection) => {
                    info!(attempts, "Connected to Redis");
                    return Ok(connection);
                }
                Err(e) if attempts < max_attempts && is_retriable_error(&e) => {
                    warn!(
                        attempt = attempts,
                        max_attempts,
                        retry_in_ms = delay,
                        error = %e,
                        "Failed to connect to Redis, retrying"
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(CONNECT_RETRY_MAX_DELAY_MS);
                }
                Err(e) => {
                    error!(attempts, error = %e, "Failed to connect to Redis");
                    return Err(InfrastructureError::Cache(e));
                }
            }
        }
    }

    /// Configuration this client was created with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Apply the configured key prefix
    pub fn make_key(&self, key: &str) -> String {
        self.config.make_key(key)
    }

    /// Set a value with expiration time
    pub async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        expiry_seconds: u64,
    ) -> Result<(), InfrastructureError> {
        self.execute("SET", key, |mut conn| async move {
            conn.set_ex::<_, _, ()>(key, value, expiry_seconds).await
        })
        .await
    }

    /// Set a value with expiration and list `member` in `set_key`
    ///
    /// The set's expiry is raised to `expiry_seconds` if lower and never
    /// lowered. Runs as a single script so concurrent callers cannot
    /// interleave and a failure leaves neither key half written.
    pub async fn set_and_track(
        &self,
        key: &str,
        value: &str,
        set_key: &str,
        member: &str,
        expiry_seconds: u64,
    ) -> Result<bool, InfrastructureError> {
        let script = &self.set_and_track;
        let added: u32 = self
            .execute("EVALSHA", key, |mut conn| async move {
                script
                    .key(key)
                    .key(set_key)
                    .arg(value)
                    .arg(member)
                    .arg(expiry_seconds)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok(added > 0)
    }

    /// Get a value, `None` if missing or expired
    pub async fn get(&self, key: &str) -> Result<Option<String>, InfrastructureError> {
        self.execute("GET", key, |mut conn| async move {
            conn.get::<_, Option<String>>(key).await
        })
        .await
    }

    /// Delete a key
    ///
    /// # Returns
    /// * `Ok(true)` - The key existed and was deleted
    pub async fn delete(&self, key: &str) -> Result<bool, InfrastructureError> {
        let deleted: u32 = self
            .execute("DEL", key, |mut conn| async move { conn.del(key).await })
            .await?;
        Ok(deleted > 0)
    }

    /// Check if a key exists
    pub async fn exists(&self, key: &str) -> Result<bool, InfrastructureError> {
        self.execute("EXISTS", key, |mut conn| async move {
            conn.exists::<_, bool>(key).await
        })
        .await
    }

    /// Get time-to-live for a key
    ///
    /// # Returns
    /// * `Ok(Some(ttl))` - Remaining seconds
    /// * `Ok(None)` - Key doesn't exist or has no expiry
    pub async fn ttl(&self, key: &str) -> Result<Option<i64>, InfrastructureError> {
        let ttl: i64 = self
            .execute("TTL", key, |mut conn| async move { conn.ttl(key).await })
            .await?;
        Ok((ttl >= 0).then_some(ttl))
    }

    /// Remove a member from a set
    pub async fn remove_from_set(
        &self,
        key: &str,
        member: &str,
    ) -> Result<bool, InfrastructureError> {
        let removed: u32 = self
            .execute("SREM", key, |mut conn| async move {
                conn.srem(key, member).await
            })
            .await?;
        Ok(removed > 0)
    }

    /// Members of a set, empty if the set does not exist
    pub async fn set_members(&self, key: &str) -> Result<Vec<String>, InfrastructureError> {
        self.execute("SMEMBERS", key, |mut conn| async move {
            conn.smembers::<_, Vec<String>>(key).await
        })
        .await
    }

    /// Number of members in a set
    pub async fn set_size(&self, key: &str) -> Result<usize, InfrastructureError> {
        self.execute("SCARD", key, |mut conn| async move {
            conn.scard::<_, usize>(key).await
        })
        .await
    }

    /// Check if the Redis connection is healthy
    ///
    /// Performs a PING command to verify connectivity.
    pub async fn health_check(&self) -> Result<bool, InfrastructureError> {
        let response: String = self
            .execute("PING", "", |mut conn| async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;

        if response == "PONG" {
            debug!("Redis health check passed");
            Ok(true)
        } else {
            warn!(response = %response, "Redis health check returned unexpected response");
            Ok(false)
        }
    }

    /// Run one command against a clone of the shared connection under the
    /// response deadline
    async fn execute<T, F, Fut>(
        &self,
        command: &'static str,
        key: &str,
        operation: F,
    ) -> Result<T, InfrastructureError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        match timeout(self.response_timeout, operation(self.connection.clone())).await {
            Ok(Ok(value)) => {
                debug!(command, key, "Redis command succeeded");
                Ok(value)
            }
            Ok(Err(e)) => {
                error!(command, key, error = %e, "Redis command failed");
                Err(InfrastructureError::Cache(e))
            }
            Err(_) => {
                let millis = u64::try_from(self.response_timeout.as_millis()).unwrap_or(u64::MAX);
                error!(command, key, timeout_ms = millis, "Redis command timed out");
                Err(InfrastructureError::Timeout {
                    operation: command,
                    millis,
                })
            }
        }
    }
}

/// Check if a Redis error is transient
pub(crate) fn is_retriable_error(error: &RedisError) -> bool {
    matches!(
        error.kind(),
        redis::ErrorKind::IoError
            | redis::ErrorKind::ClientError
            | redis::ErrorKind::BusyLoadingError
            | redis::ErrorKind::TryAgain
    )
}

/// Mask credentials in a Redis URL for logging
pub(crate) fn mask_url(url: &str) -> String {
    if let (Some(at_pos), Some(proto_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > proto_end {
            return format!("{}****{}", &url[..proto_end + 3], &url[at_pos..]);
        }
    }
    url.to_string()
}
