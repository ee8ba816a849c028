//! JWS codec for access and refresh tokens
//!
//! Tokens are HMAC-signed compact JWS. The codec checks the header algorithm
//! before any key is touched, then the signature, then the registered claims
//! in a fixed order so that every rejection has exactly one cause.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::entities::{
    AccessClaims, RefreshClaims, Subject, TokenClaims, TokenId, TokenKind, WireClaims,
    JWT_AUDIENCE, JWT_ISSUER,
};
use crate::errors::{ConfigError, TokenError};
use crate::services::clock::Clock;

/// Minimum HMAC secret length in bytes
pub const MIN_SECRET_BYTES: usize = 32;

/// Tolerated clock skew on `iat`, in seconds
pub const MAX_ISSUED_AT_SKEW_SECS: i64 = 300;

const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Deserialize)]
struct RawHeader {
    alg: Option<String>,
}

/// Signs and verifies bearer tokens with a symmetric secret
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Creates a codec for the given secret
    ///
    /// # Errors
    ///
    /// * `ConfigError::MissingSecret` - empty secret
    /// * `ConfigError::SecretTooShort` - fewer than 32 bytes
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort {
                min: MIN_SECRET_BYTES,
                actual: secret.len(),
            });
        }

        // Registered claims are checked by hand against the injected clock
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock,
        })
    }

    /// Signs a token of the given kind
    ///
    /// `nbf` is set to `issued_at`. Refresh tokens carry only the subject id.
    pub fn issue(
        &self,
        subject: &Subject,
        token_id: &TokenId,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = match kind {
            TokenKind::Access => WireClaims::from(&AccessClaims::new(
                subject.clone(),
                token_id.clone(),
                issued_at,
                expires_at,
            )),
            TokenKind::Refresh => WireClaims::from(&RefreshClaims::new(
                subject.id,
                token_id.clone(),
                issued_at,
                expires_at,
            )),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, kind = %kind, "Failed to sign token");
            TokenError::GenerationFailed
        })
    }

    /// Verifies a token and returns its typed claims
    pub fn parse(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let header: RawHeader = decode_segment(token, 0)?;
        let alg = header.alg.ok_or(TokenError::Malformed)?;
        if !matches!(alg.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(TokenError::InvalidAlgorithm { alg });
        }

        let wire = decode::<WireClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::InvalidAlgorithm { alg: alg.clone() }
                }
                _ => TokenError::Malformed,
            })?
            .claims;

        self.check_registered(&wire)?;
        check_kind(&wire, kind)?;
        typed_claims(wire, kind)
    }

    /// Verifies an access token
    pub fn parse_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        match self.parse(token, TokenKind::Access)? {
            TokenClaims::Access(claims) => Ok(claims),
            TokenClaims::Refresh(_) => Err(TokenError::WrongTokenKind {
                expected: TokenKind::Access,
            }),
        }
    }

    /// Verifies a refresh token
    pub fn parse_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        match self.parse(token, TokenKind::Refresh)? {
            TokenClaims::Refresh(claims) => Ok(claims),
            TokenClaims::Access(_) => Err(TokenError::WrongTokenKind {
                expected: TokenKind::Refresh,
            }),
        }
    }

    /// Decodes the claims without checking signature or time
    ///
    /// Only for sizing TTLs and diagnostics on tokens that already passed
    /// [`TokenCodec::parse`]. Never an admission check.
    pub fn peek(&self, token: &str) -> Result<WireClaims, TokenError> {
        decode_segment(token, 1)
    }

    fn check_registered(&self, wire: &WireClaims) -> Result<(), TokenError> {
        let now = self.clock.now().timestamp();

        if wire.iss.as_deref() != Some(JWT_ISSUER) {
            return Err(TokenError::InvalidIssuer {
                found: wire.iss.clone(),
            });
        }
        if !wire.aud.as_ref().is_some_and(|aud| aud.contains(JWT_AUDIENCE)) {
            return Err(TokenError::InvalidAudience);
        }
        if wire.nbf.is_some_and(|nbf| nbf > now) {
            return Err(TokenError::NotYetValid);
        }
        match wire.exp {
            None => return Err(TokenError::MissingExpiry),
            Some(exp) if exp <= now => return Err(TokenError::Expired),
            Some(_) => {}
        }
        if wire.iat.is_some_and(|iat| iat > now + MAX_ISSUED_AT_SKEW_SECS) {
            return Err(TokenError::IssuedInFuture);
        }

        Ok(())
    }
}

fn check_kind(wire: &WireClaims, kind: TokenKind) -> Result<(), TokenError> {
    match (kind, wire.is_refresh()) {
        (TokenKind::Refresh, true) | (TokenKind::Access, false) => Ok(()),
        (expected, _) => Err(TokenError::WrongTokenKind { expected }),
    }
}

fn typed_claims(wire: WireClaims, kind: TokenKind) -> Result<TokenClaims, TokenError> {
    let subject_id = wire.uid.ok_or(TokenError::MissingClaim { claim: "uid" })?;
    let token_id = match wire.jti.as_deref() {
        None => return Err(TokenError::MissingClaim { claim: "jti" }),
        Some(jti) => TokenId::parse(jti).ok_or(TokenError::Malformed)?,
    };
    if wire.sub.as_deref().is_some_and(|sub| sub != subject_id.to_string()) {
        return Err(TokenError::Malformed);
    }

    let issued_at = timestamp(wire.iat.ok_or(TokenError::MissingClaim { claim: "iat" })?)?;
    let not_before = match wire.nbf {
        Some(nbf) => timestamp(nbf)?,
        None => issued_at,
    };
    let expires_at = timestamp(wire.exp.ok_or(TokenError::MissingExpiry)?)?;

    let claims = match kind {
        TokenKind::Access => {
            let email = wire.email.ok_or(TokenError::MissingClaim { claim: "email" })?;
            let role = wire.role.ok_or(TokenError::MissingClaim { claim: "role" })?;
            TokenClaims::Access(AccessClaims {
                subject: Subject::new(subject_id, email, role),
                token_id,
                issued_at,
                not_before,
                expires_at,
            })
        }
        TokenKind::Refresh => TokenClaims::Refresh(RefreshClaims {
            subject_id,
            token_id,
            issued_at,
            not_before,
            expires_at,
        }),
    };

    Ok(claims)
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(secs, 0).single().ok_or(TokenError::Malformed)
}

/// Decodes one dot-separated segment of a compact JWS as JSON
fn decode_segment<T: DeserializeOwned>(token: &str, index: usize) -> Result<T, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed);
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(segments[index])
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}
