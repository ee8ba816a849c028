//! Token service module for bearer token management
//!
//! This module handles all token-related operations including:
//! - HS256 access and refresh token signing and verification
//! - Session-backed refresh token rotation
//! - Access token revocation, single and bulk session removal

mod bearer;
mod codec;
mod config;
mod service;

#[cfg(test)]
mod tests;

pub use bearer::extract_bearer;
pub use codec::{TokenCodec, MAX_ISSUED_AT_SKEW_SECS, MIN_SECRET_BYTES};
pub use config::{RevocationReadPolicy, TokenServiceConfig};
pub use service::{SessionInfo, TokenService};
