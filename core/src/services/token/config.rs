//! Configuration for the token service

use ig_shared::config::JwtConfig;
use std::fmt;
use std::time::Duration;

use crate::errors::ConfigError;

use super::codec::MIN_SECRET_BYTES;

/// What to do when the revocation set cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevocationReadPolicy {
    /// Treat the token as not revoked and log a warning
    #[default]
    FailOpen,
    /// Reject the request with the store error
    FailClosed,
}

/// Configuration for the token service
#[derive(Clone)]
pub struct TokenServiceConfig {
    /// HMAC signing secret, at least 32 bytes
    pub jwt_secret: String,
    /// Access token lifetime
    pub access_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_ttl: Duration,
    /// Behaviour of the revocation check on store failure
    pub revocation_read_policy: RevocationReadPolicy,
}

impl TokenServiceConfig {
    /// Creates a validated configuration with the default fail-open policy
    pub fn new(
        jwt_secret: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            jwt_secret: jwt_secret.into(),
            access_ttl,
            refresh_ttl,
            revocation_read_policy: RevocationReadPolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_revocation_read_policy(mut self, policy: RevocationReadPolicy) -> Self {
        self.revocation_read_policy = policy;
        self
    }

    /// Checks secret length and lifetimes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort {
                min: MIN_SECRET_BYTES,
                actual: self.jwt_secret.len(),
            });
        }
        if self.access_ttl.as_secs() == 0 || self.refresh_ttl.as_secs() == 0 {
            return Err(ConfigError::InvalidLifetime {
                message: "token lifetimes must be at least one second".to_string(),
            });
        }
        if self.access_ttl > self.refresh_ttl {
            return Err(ConfigError::InvalidLifetime {
                message: "access token lifetime exceeds refresh token lifetime".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for TokenServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenServiceConfig")
            .field("jwt_secret", &format_args!("<{} bytes>", self.jwt_secret.len()))
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("revocation_read_policy", &self.revocation_read_policy)
            .finish()
    }
}

impl TryFrom<&JwtConfig> for TokenServiceConfig {
    type Error = ConfigError;

    fn try_from(jwt: &JwtConfig) -> Result<Self, Self::Error> {
        let seconds = |value: i64, name: &str| {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidLifetime {
                    message: format!("{} must not be negative", name),
                })
        };

        let policy = if jwt.revocation_fail_open {
            RevocationReadPolicy::FailOpen
        } else {
            RevocationReadPolicy::FailClosed
        };

        Ok(Self::new(
            jwt.secret.clone(),
            seconds(jwt.access_token_expiry, "access token expiry")?,
            seconds(jwt.refresh_token_expiry, "refresh token expiry")?,
        )?
        .with_revocation_read_policy(policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_from_jwt_config() {
        let jwt = JwtConfig::new(SECRET).with_revocation_fail_open(false);
        let config = TokenServiceConfig::try_from(&jwt).unwrap();

        assert_eq!(config.access_ttl, Duration::from_secs(900));
        assert_eq!(config.refresh_ttl, Duration::from_secs(604_800));
        assert_eq!(config.revocation_read_policy, RevocationReadPolicy::FailClosed);
    }

    #[test]
    fn test_rejects_missing_and_short_secret() {
        let missing = TokenServiceConfig::try_from(&JwtConfig::default());
        assert_eq!(missing.unwrap_err(), ConfigError::MissingSecret);

        let short = TokenServiceConfig::new("short", Duration::from_secs(1), Duration::from_secs(2));
        assert_eq!(
            short.unwrap_err(),
            ConfigError::SecretTooShort { min: 32, actual: 5 }
        );
    }

    #[test]
    fn test_rejects_bad_lifetimes() {
        let zero = TokenServiceConfig::new(SECRET, Duration::ZERO, Duration::from_secs(60));
        assert!(matches!(zero, Err(ConfigError::InvalidLifetime { .. })));

        let inverted =
            TokenServiceConfig::new(SECRET, Duration::from_secs(120), Duration::from_secs(60));
        assert!(matches!(inverted, Err(ConfigError::InvalidLifetime { .. })));

        let negative = JwtConfig {
            access_token_expiry: -1,
            ..JwtConfig::new(SECRET)
        };
        assert!(TokenServiceConfig::try_from(&negative).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config =
            TokenServiceConfig::new(SECRET, Duration::from_secs(60), Duration::from_secs(120))
                .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("<32 bytes>"));
    }
}
