pub mod identity;
pub mod session;

pub use identity::{IdentityProvider, InMemoryIdentityProvider};
pub use session::{BulkRemoval, MemorySessionStore, SessionStore, StoreFootprint};
