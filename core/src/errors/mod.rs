//! Domain-specific error types and error handling.

mod types;

#[cfg(test)]
mod tests;

pub use types::{ConfigError, StoreError, TokenError};

use ig_shared::errors::{error_codes, ErrorResponse, IntoErrorResponse};
use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Any rejected credential; `cause` is for logs only
    #[error("Unauthorized")]
    Unauthorized { cause: TokenError },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Bulk revocation incomplete: {failed} of {attempted} sessions failed")]
    PartialRevocation { failed: usize, attempted: usize },

    #[error("Identity lookup failed: {message}")]
    Identity { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<TokenError> for DomainError {
    fn from(cause: TokenError) -> Self {
        match cause {
            TokenError::GenerationFailed => DomainError::Internal {
                message: cause.to_string(),
            },
            cause => DomainError::Unauthorized { cause },
        }
    }
}

impl DomainError {
    /// Whether this error rejects the presented credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DomainError::Unauthorized { .. })
    }

    /// Precise rejection cause, if any
    pub fn token_cause(&self) -> Option<&TokenError> {
        match self {
            DomainError::Unauthorized { cause } => Some(cause),
            _ => None,
        }
    }

    /// Stable code for the HTTP layer
    pub fn error_code(&self) -> &'static str {
        match self {
            DomainError::Unauthorized { cause } => match cause {
                TokenError::Expired => error_codes::TOKEN_EXPIRED,
                TokenError::Revoked => error_codes::TOKEN_REVOKED,
                TokenError::InvalidRefreshToken | TokenError::UnknownSubject => {
                    error_codes::UNAUTHORIZED
                }
                _ => error_codes::TOKEN_INVALID,
            },
            DomainError::Store(_) | DomainError::PartialRevocation { .. } => {
                error_codes::CACHE_ERROR
            }
            DomainError::Config(_) => error_codes::CONFIG_ERROR,
            DomainError::Identity { .. } | DomainError::Internal { .. } => {
                error_codes::INTERNAL_ERROR
            }
        }
    }
}

impl IntoErrorResponse for DomainError {
    fn to_error_response(&self) -> ErrorResponse {
        let message = match self {
            DomainError::Unauthorized { cause } if cause.is_expired() => "Token expired",
            DomainError::Unauthorized { .. } => "Authentication required",
            DomainError::Store(_) | DomainError::PartialRevocation { .. } => {
                "Session store unavailable"
            }
            DomainError::Config(_) => "Service misconfigured",
            DomainError::Identity { .. } | DomainError::Internal { .. } => {
                "Internal server error"
            }
        };

        let response = ErrorResponse::new(self.error_code(), message);
        match self {
            DomainError::PartialRevocation { failed, attempted } => response
                .add_detail("failed", failed)
                .add_detail("attempted", attempted),
            _ => response,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
