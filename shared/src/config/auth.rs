//! Token signing configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default access token lifetime in seconds (15 minutes)
pub const DEFAULT_ACCESS_TOKEN_EXPIRY: i64 = 900;

/// Default refresh token lifetime in seconds (7 days)
pub const DEFAULT_REFRESH_TOKEN_EXPIRY: i64 = 604_800;

/// JWT configuration consumed when the token service is constructed
#[derive(Clone, Deserialize, Serialize)]
pub struct JwtConfig {
    /// HMAC signing secret, at least 32 bytes
    pub secret: String,

    /// Access token expiry time in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiry time in seconds
    pub refresh_token_expiry: i64,

    /// Treat a revocation lookup that fails at the store as "not revoked"
    #[serde(default = "default_revocation_fail_open")]
    pub revocation_fail_open: bool,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_expiry: DEFAULT_ACCESS_TOKEN_EXPIRY,
            refresh_token_expiry: DEFAULT_REFRESH_TOKEN_EXPIRY,
            revocation_fail_open: default_revocation_fail_open(),
        }
    }
}

// Keep the secret out of logs and panic messages.
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("revocation_fail_open", &self.revocation_fail_open)
            .finish()
    }
}

impl JwtConfig {
    /// Create a new JWT configuration with secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Create from environment variables
    ///
    /// A missing `JWT_SECRET` yields an empty secret, which the token service
    /// rejects at construction time.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        let access_token_expiry = env_or("JWT_ACCESS_TOKEN_EXPIRY", DEFAULT_ACCESS_TOKEN_EXPIRY);
        let refresh_token_expiry = env_or("JWT_REFRESH_TOKEN_EXPIRY", DEFAULT_REFRESH_TOKEN_EXPIRY);
        let revocation_fail_open = env_or("JWT_REVOCATION_FAIL_OPEN", default_revocation_fail_open());

        Self {
            secret,
            access_token_expiry,
            refresh_token_expiry,
            revocation_fail_open,
        }
    }

    /// Set access token expiry in minutes
    pub fn with_access_expiry_minutes(mut self, minutes: i64) -> Self {
        self.access_token_expiry = minutes * 60;
        self
    }

    /// Set refresh token expiry in days
    pub fn with_refresh_expiry_days(mut self, days: i64) -> Self {
        self.refresh_token_expiry = days * 86_400;
        self
    }

    /// Choose how a failed revocation lookup is treated
    pub fn with_revocation_fail_open(mut self, fail_open: bool) -> Self {
        self.revocation_fail_open = fail_open;
        self
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn default_revocation_fail_open() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_config_default() {
        let config = JwtConfig::default();
        assert_eq!(config.access_token_expiry, 900);
        assert_eq!(config.refresh_token_expiry, 604800);
        assert!(config.revocation_fail_open);
        assert!(config.secret.is_empty());
    }

    #[test]
    fn test_jwt_config_builder() {
        let config = JwtConfig::new("my-secret")
            .with_access_expiry_minutes(30)
            .with_refresh_expiry_days(14)
            .with_revocation_fail_open(false);

        assert_eq!(config.access_token_expiry, 1800);
        assert_eq!(config.refresh_token_expiry, 1209600);
        assert!(!config.revocation_fail_open);
    }

    #[test]
    fn test_debug_does_not_print_secret() {
        let config = JwtConfig::new("super-secret-value-that-must-not-leak");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<37 bytes>"));
    }

    #[test]
    fn test_revocation_policy_defaults_when_missing_from_json() {
        let json = r#"{"secret":"s","access_token_expiry":60,"refresh_token_expiry":120}"#;
        let config: JwtConfig = serde_json::from_str(json).unwrap();
        assert!(config.revocation_fail_open);
    }
}
