//! Error types for token handling, session storage and configuration
//!
//! Messages are deliberately generic. The precise variant is kept for logs,
//! the HTTP layer only ever sees a stable error code.

use thiserror::Error;

use crate::domain::entities::TokenKind;

/// Token validation and generation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid algorithm: {alg}")]
    InvalidAlgorithm { alg: String },

    #[error("Invalid issuer")]
    InvalidIssuer { found: Option<String> },

    #[error("Invalid audience")]
    InvalidAudience,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("Token expired")]
    Expired,

    #[error("Missing expiry")]
    MissingExpiry,

    #[error("Token issued in the future")]
    IssuedInFuture,

    #[error("Wrong token kind, expected {expected}")]
    WrongTokenKind { expected: TokenKind },

    #[error("Missing claim: {claim}")]
    MissingClaim { claim: &'static str },

    #[error("Malformed token")]
    Malformed,

    #[error("Token revoked")]
    Revoked,

    /// Revocation status could not be read and the policy rejects on doubt
    #[error("Revocation status unavailable")]
    RevocationUnverified,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Unknown subject")]
    UnknownSubject,

    #[error("Token generation failed")]
    GenerationFailed,
}

impl TokenError {
    /// Whether the error means the token outlived its lifetime
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired)
    }
}

/// Session store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Store operation timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl StoreError {
    /// Builds an `Unavailable` error from any displayable cause
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        StoreError::Unavailable {
            message: cause.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Construction-time configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error("JWT secret too short: {actual} bytes, at least {min} required")]
    SecretTooShort { min: usize, actual: usize },

    #[error("Invalid token lifetime: {message}")]
    InvalidLifetime { message: String },
}
