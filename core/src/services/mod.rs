//! Business services containing the token lifecycle logic.

pub mod clock;
pub mod token;

// Re-export commonly used types
pub use clock::{Clock, EntropySource, ManualClock, OsEntropy, SystemClock};
pub use token::{
    extract_bearer, RevocationReadPolicy, SessionInfo, TokenCodec, TokenService,
    TokenServiceConfig,
};
