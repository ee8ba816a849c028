//! Domain layer containing entities shared by the token services.

pub mod entities;

pub use entities::*;
