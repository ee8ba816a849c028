pub mod r#trait {
    pub use super::trait_::*;
}
#[path = "trait.rs"]
mod trait_;
pub mod keys;
pub mod memory;

pub use memory::{MemorySessionStore, StoreFootprint};
pub use r#trait::{BulkRemoval, SessionStore};
