//! Token entities for JWT-based authentication.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::subject::{Subject, SubjectId};

/// JWT issuer
pub const JWT_ISSUER: &str = "immogestion-auth";

/// JWT audience
pub const JWT_AUDIENCE: &str = "immogestion-gateway";

/// Value of the `typ` claim carried by refresh tokens
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Number of random bytes in a token identifier (128 bits)
pub const TOKEN_ID_BYTES: usize = 16;

/// Token identifier (`jti`) shared by an access token and its paired refresh token
///
/// Always 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Builds a token identifier from raw random bytes
    pub fn from_bytes(bytes: [u8; TOKEN_ID_BYTES]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Parses a hex token identifier, rejecting anything that is not 128 bits of hex
    pub fn parse(value: &str) -> Option<Self> {
        let well_formed = value.len() == TOKEN_ID_BYTES * 2
            && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(value.to_string()))
    }

    /// Returns the hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TokenId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TokenId::parse(&value).ok_or_else(|| format!("invalid token id: {}", value))
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.0
    }
}

/// Kind of bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// `aud` claim; RFC 7519 allows either a single string or an array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// Checks audience membership
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(value) => value == audience,
            Audience::Many(values) => values.iter().any(|v| v == audience),
        }
    }
}

/// Claim set as it appears on the wire
///
/// Every field is optional so that decoding never fails on a missing claim;
/// the codec turns a `WireClaims` into a typed [`AccessClaims`] or
/// [`RefreshClaims`] and reports exactly which claim was wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<SubjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl WireClaims {
    /// Token identifier, if present and well formed
    pub fn token_id(&self) -> Option<TokenId> {
        self.jti.as_deref().and_then(TokenId::parse)
    }

    /// Expiry instant, if present
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Whether the claim set carries the refresh discriminator
    pub fn is_refresh(&self) -> bool {
        self.typ.as_deref() == Some(REFRESH_TOKEN_TYPE)
    }

    fn registered(
        subject_id: SubjectId,
        token_id: &TokenId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uid: Some(subject_id),
            sub: Some(subject_id.to_string()),
            iss: Some(JWT_ISSUER.to_string()),
            aud: Some(Audience::Many(vec![JWT_AUDIENCE.to_string()])),
            iat: Some(issued_at.timestamp()),
            nbf: Some(issued_at.timestamp()),
            exp: Some(expires_at.timestamp()),
            jti: Some(token_id.to_string()),
            ..Default::default()
        }
    }
}

/// Validated claims of an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub subject: Subject,
    pub token_id: TokenId,
    pub issued_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessClaims {
    /// Creates access claims; `nbf` is always the issue instant
    pub fn new(
        subject: Subject,
        token_id: TokenId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject,
            token_id,
            issued_at,
            not_before: issued_at,
            expires_at,
        }
    }
}

impl From<&AccessClaims> for WireClaims {
    fn from(claims: &AccessClaims) -> Self {
        Self {
            email: Some(claims.subject.email.clone()),
            role: Some(claims.subject.role.clone()),
            ..WireClaims::registered(
                claims.subject.id,
                &claims.token_id,
                claims.issued_at,
                claims.expires_at,
            )
        }
    }
}

/// Validated claims of a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub subject_id: SubjectId,
    pub token_id: TokenId,
    pub issued_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshClaims {
    /// Creates refresh claims; `nbf` is always the issue instant
    pub fn new(
        subject_id: SubjectId,
        token_id: TokenId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id,
            token_id,
            issued_at,
            not_before: issued_at,
            expires_at,
        }
    }
}

impl From<&RefreshClaims> for WireClaims {
    fn from(claims: &RefreshClaims) -> Self {
        Self {
            typ: Some(REFRESH_TOKEN_TYPE.to_string()),
            ..WireClaims::registered(
                claims.subject_id,
                &claims.token_id,
                claims.issued_at,
                claims.expires_at,
            )
        }
    }
}

/// Validated claims of either kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenClaims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

impl TokenClaims {
    pub fn kind(&self) -> TokenKind {
        match self {
            TokenClaims::Access(_) => TokenKind::Access,
            TokenClaims::Refresh(_) => TokenKind::Refresh,
        }
    }

    pub fn token_id(&self) -> &TokenId {
        match self {
            TokenClaims::Access(claims) => &claims.token_id,
            TokenClaims::Refresh(claims) => &claims.token_id,
        }
    }

    pub fn subject_id(&self) -> SubjectId {
        match self {
            TokenClaims::Access(claims) => claims.subject.id,
            TokenClaims::Refresh(claims) => claims.subject_id,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            TokenClaims::Access(claims) => claims.expires_at,
            TokenClaims::Refresh(claims) => claims.expires_at,
        }
    }
}

/// Token pair returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// JWT access token
    pub access_token: String,

    /// JWT refresh token
    pub refresh_token: String,

    /// Identifier shared by both tokens
    pub token_id: TokenId,

    /// Access token expiry instant
    pub access_expires_at: DateTime<Utc>,

    /// Refresh token expiry instant
    pub refresh_expires_at: DateTime<Utc>,

    /// Access token lifetime in seconds
    pub access_expires_in: i64,

    /// Refresh token lifetime in seconds
    pub refresh_expires_in: i64,
}
