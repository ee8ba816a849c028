//! # ImmoGestion Token Core
//!
//! Issuance, validation, rotation and revocation of bearer tokens.
//! This crate contains the domain entities, the token codec, the session store
//! contract and the token lifecycle service. Transport concerns (HTTP routing,
//! status codes) live outside this crate; the Redis-backed store lives in `ig_infra`.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::*;
pub use errors::*;
pub use repositories::*;
pub use services::*;
