//! Unit tests for domain error types

use ig_shared::errors::{error_codes, IntoErrorResponse};

use crate::domain::entities::TokenKind;
use crate::errors::{ConfigError, DomainError, StoreError, TokenError};

#[test]
fn test_token_error_becomes_unauthorized() {
    let error: DomainError = TokenError::InvalidSignature.into();
    assert!(error.is_unauthorized());
    assert_eq!(error.token_cause(), Some(&TokenError::InvalidSignature));
}

#[test]
fn test_generation_failure_is_internal() {
    let error: DomainError = TokenError::GenerationFailed.into();
    assert!(!error.is_unauthorized());
    assert_eq!(error.error_code(), error_codes::INTERNAL_ERROR);
}

#[test]
fn test_error_codes() {
    let expired: DomainError = TokenError::Expired.into();
    assert_eq!(expired.error_code(), error_codes::TOKEN_EXPIRED);

    let revoked: DomainError = TokenError::Revoked.into();
    assert_eq!(revoked.error_code(), error_codes::TOKEN_REVOKED);

    let rotated: DomainError = TokenError::InvalidRefreshToken.into();
    assert_eq!(rotated.error_code(), error_codes::UNAUTHORIZED);

    let wrong_kind: DomainError = TokenError::WrongTokenKind {
        expected: TokenKind::Refresh,
    }
    .into();
    assert_eq!(wrong_kind.error_code(), error_codes::TOKEN_INVALID);

    let store: DomainError = StoreError::Timeout { millis: 2000 }.into();
    assert_eq!(store.error_code(), error_codes::CACHE_ERROR);

    let config: DomainError = ConfigError::MissingSecret.into();
    assert_eq!(config.error_code(), error_codes::CONFIG_ERROR);
}

#[test]
fn test_error_response_hides_cause() {
    let error: DomainError = TokenError::InvalidIssuer {
        found: Some("evil-issuer".to_string()),
    }
    .into();
    let response = error.to_error_response();

    assert_eq!(response.error, error_codes::TOKEN_INVALID);
    assert!(!response.message.contains("issuer"));
    assert!(response.details.is_none());
}

#[test]
fn test_partial_revocation_response_details() {
    let error = DomainError::PartialRevocation {
        failed: 2,
        attempted: 5,
    };
    let response = error.to_error_response();
    let details = response.details.unwrap();

    assert_eq!(details["failed"], serde_json::json!(2));
    assert_eq!(details["attempted"], serde_json::json!(5));
    assert!(error.to_string().contains("2 of 5"));
}

#[test]
fn test_config_error_messages() {
    let error = ConfigError::SecretTooShort { min: 32, actual: 8 };
    assert_eq!(
        error.to_string(),
        "JWT secret too short: 8 bytes, at least 32 required"
    );
}
