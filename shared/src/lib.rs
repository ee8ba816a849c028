//! Shared configuration and response types for the ImmoGestion auth services
//!
//! This crate provides common functionality used across all server modules:
//! - Configuration types (JWT, Redis, environment, logging)
//! - Error response structures handed to the HTTP layer

pub mod config;
pub mod errors;

// Re-export commonly used items at crate root
pub use config::{AppConfig, CacheConfig, Environment, JwtConfig, LogFormat, LoggingConfig};
pub use errors::{error_codes, ErrorResponse, IntoErrorResponse};
