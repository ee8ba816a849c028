//! Domain entities representing the principals and tokens of the auth core.

pub mod subject;
pub mod token;

pub use subject::{Subject, SubjectId};
pub use token::{
    AccessClaims, Audience, RefreshClaims, TokenClaims, TokenId, TokenKind, TokenPair,
    WireClaims, JWT_AUDIENCE, JWT_ISSUER, REFRESH_TOKEN_TYPE, TOKEN_ID_BYTES,
};
