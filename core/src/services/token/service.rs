//! Token lifecycle service: issue, validate, rotate and revoke

use chrono::{DateTime, SubsecRound, Utc};
use constant_time_eq::constant_time_eq;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::{
    AccessClaims, Subject, SubjectId, TokenId, TokenKind, TokenPair,
};
use crate::errors::{ConfigError, DomainError, DomainResult, StoreError, TokenError};
use crate::repositories::{BulkRemoval, IdentityProvider, SessionStore};
use crate::services::clock::{Clock, EntropySource, OsEntropy, SystemClock};

use super::codec::TokenCodec;
use super::config::{RevocationReadPolicy, TokenServiceConfig};

/// Revocation markers never get a TTL below one second
const MIN_REVOCATION_TTL: Duration = Duration::from_secs(1);

/// State of a single refresh session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub subject_id: SubjectId,
    pub token_id: TokenId,
    pub exists: bool,
    /// Remaining lifetime, `None` when the session does not exist
    pub ttl: Option<Duration>,
}

/// Service orchestrating the token codec and the session store
///
/// Holds no mutable state of its own; all session state lives in the store,
/// so one instance can serve any number of concurrent callers.
pub struct TokenService<S: SessionStore, I: IdentityProvider> {
    codec: TokenCodec,
    store: S,
    identity: I,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
    config: TokenServiceConfig,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl<S: SessionStore, I: IdentityProvider> TokenService<S, I> {
    /// Creates a token service using the system clock and OS randomness
    pub fn new(store: S, identity: I, config: TokenServiceConfig) -> Result<Self, ConfigError> {
        Self::with_runtime(store, identity, config, Arc::new(SystemClock), Arc::new(OsEntropy))
    }

    /// Creates a token service with explicit time and randomness sources
    pub fn with_runtime(
        store: S,
        identity: I,
        config: TokenServiceConfig,
        clock: Arc<dyn Clock>,
        entropy: Arc<dyn EntropySource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let lifetime = |ttl: Duration| {
            chrono::Duration::from_std(ttl).map_err(|_| ConfigError::InvalidLifetime {
                message: format!("{:?} is out of range", ttl),
            })
        };
        let access_ttl = lifetime(config.access_ttl)?;
        let refresh_ttl = lifetime(config.refresh_ttl)?;
        let codec = TokenCodec::new(&config.jwt_secret, clock.clone())?;

        Ok(Self {
            codec,
            store,
            identity,
            clock,
            entropy,
            config,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn config(&self) -> &TokenServiceConfig {
        &self.config
    }

    /// Issues an access/refresh pair sharing a fresh token id
    ///
    /// The refresh token is recorded in the store for the refresh lifetime.
    /// A store failure fails the call even though both tokens were signed.
    pub async fn issue_pair(&self, subject: &Subject) -> DomainResult<TokenPair> {
        let token_id = self.entropy.token_id()?;
        let issued_at = self.now();
        let access_expires_at = issued_at + self.access_ttl;
        let refresh_expires_at = issued_at + self.refresh_ttl;

        let access_token = self.codec.issue(
            subject,
            &token_id,
            TokenKind::Access,
            issued_at,
            access_expires_at,
        )?;
        let refresh_token = self.codec.issue(
            subject,
            &token_id,
            TokenKind::Refresh,
            issued_at,
            refresh_expires_at,
        )?;

        self.store
            .put(subject.id, &token_id, &refresh_token, self.config.refresh_ttl)
            .await
            .map_err(|e| {
                tracing::error!(
                    subject_id = subject.id,
                    token_id = %token_id,
                    error = %e,
                    "Failed to store refresh session"
                );
                e
            })?;

        tracing::info!(subject_id = subject.id, token_id = %token_id, "Issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_id,
            access_expires_at,
            refresh_expires_at,
            access_expires_in: self.access_ttl.num_seconds(),
            refresh_expires_in: self.refresh_ttl.num_seconds(),
        })
    }

    /// Validates an access token: signature and claims first, then revocation
    pub async fn validate_access(&self, token: &str) -> DomainResult<AccessClaims> {
        let claims = self
            .codec
            .parse_access(token)
            .map_err(|cause| self.reject("validate_access", cause))?;

        match self.store.is_revoked(&claims.token_id).await {
            Ok(false) => Ok(claims),
            Ok(true) => Err(self.reject("validate_access", TokenError::Revoked)),
            Err(e) => match self.config.revocation_read_policy {
                RevocationReadPolicy::FailOpen => {
                    tracing::warn!(
                        token_id = %claims.token_id,
                        error = %e,
                        "Revocation check unavailable, treating token as not revoked"
                    );
                    Ok(claims)
                }
                RevocationReadPolicy::FailClosed => {
                    tracing::warn!(
                        token_id = %claims.token_id,
                        error = %e,
                        "Revocation check unavailable, rejecting token"
                    );
                    Err(self.reject("validate_access", TokenError::RevocationUnverified))
                }
            },
        }
    }

    /// Exchanges a refresh token for a new pair with a new token id
    ///
    /// The presented token must match the stored session byte for byte.
    /// Removing the old session is the claim on the rotation: when two
    /// callers race with the same token only the one whose removal deleted
    /// the record gets a new pair.
    pub async fn rotate(&self, refresh_token: &str) -> DomainResult<TokenPair> {
        let claims = self
            .codec
            .parse_refresh(refresh_token)
            .map_err(|cause| self.reject("rotate", cause))?;
        let subject_id = claims.subject_id;
        let token_id = &claims.token_id;

        let stored = match self.store.get(subject_id, token_id).await {
            Ok(stored) => stored,
            Err(StoreError::NotFound) => {
                return Err(self.reject("rotate", TokenError::InvalidRefreshToken))
            }
            Err(e) => return Err(e.into()),
        };
        if !constant_time_eq(stored.as_bytes(), refresh_token.as_bytes()) {
            return Err(self.reject("rotate", TokenError::InvalidRefreshToken));
        }

        let subject = self
            .identity
            .resolve(subject_id)
            .await?
            .ok_or_else(|| self.reject("rotate", TokenError::UnknownSubject))?;

        match self.store.remove(subject_id, token_id).await {
            Ok(true) => {}
            Ok(false) => return Err(self.reject("rotate", TokenError::InvalidRefreshToken)),
            Err(e) => {
                tracing::warn!(
                    subject_id,
                    token_id = %token_id,
                    error = %e,
                    "Failed to remove rotated session, continuing"
                );
            }
        }

        self.issue_pair(&subject).await
    }

    /// Revokes one session: blacklists the access token id for its residual
    /// lifetime and deletes the paired refresh session. Idempotent.
    pub async fn revoke(&self, access_token: &str) -> DomainResult<()> {
        let claims = self
            .codec
            .parse_access(access_token)
            .map_err(|cause| self.reject("revoke", cause))?;
        self.revoke_parsed(access_token, &claims).await
    }

    /// Deletes every refresh session of a subject
    ///
    /// Access tokens already handed out stay valid until they expire.
    pub async fn revoke_all(&self, subject_id: SubjectId) -> DomainResult<BulkRemoval> {
        let outcome = self.store.remove_all(subject_id).await?;

        if !outcome.is_complete() {
            tracing::error!(
                subject_id,
                removed = outcome.removed,
                already_absent = outcome.already_absent,
                failed = outcome.failed,
                "Bulk revocation incomplete"
            );
            return Err(DomainError::PartialRevocation {
                failed: outcome.failed,
                attempted: outcome.attempted(),
            });
        }

        tracing::info!(
            subject_id,
            removed = outcome.removed,
            already_absent = outcome.already_absent,
            "Revoked all sessions"
        );
        Ok(outcome)
    }

    /// Revokes the access token and drops the presented refresh session
    ///
    /// A refresh token that does not verify, or that belongs to another
    /// subject, is ignored.
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> DomainResult<()> {
        let claims = self
            .codec
            .parse_access(access_token)
            .map_err(|cause| self.reject("logout", cause))?;
        self.revoke_parsed(access_token, &claims).await?;

        let Some(refresh_token) = refresh_token else {
            return Ok(());
        };
        match self.codec.parse_refresh(refresh_token) {
            Ok(refresh) if refresh.subject_id == claims.subject.id => {
                if refresh.token_id != claims.token_id {
                    self.store.remove(refresh.subject_id, &refresh.token_id).await?;
                }
            }
            Ok(refresh) => {
                tracing::warn!(
                    subject_id = claims.subject.id,
                    other_subject_id = refresh.subject_id,
                    "Refresh token at logout belongs to another subject, ignored"
                );
            }
            Err(cause) => {
                tracing::debug!(cause = %cause, "Refresh token at logout not removed");
            }
        }

        Ok(())
    }

    /// Token ids with a live session for the subject
    pub async fn active_sessions(&self, subject_id: SubjectId) -> DomainResult<Vec<TokenId>> {
        let mut active = Vec::new();
        for token_id in self.store.live_token_ids(subject_id).await? {
            if self.store.session_ttl(subject_id, &token_id).await?.is_some() {
                active.push(token_id);
            }
        }
        Ok(active)
    }

    /// Size of the subject's live set, orphaned members included
    pub async fn session_count(&self, subject_id: SubjectId) -> DomainResult<usize> {
        Ok(self.store.count_sessions(subject_id).await?)
    }

    pub async fn session_info(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
    ) -> DomainResult<SessionInfo> {
        let ttl = self.store.session_ttl(subject_id, token_id).await?;
        Ok(SessionInfo {
            subject_id,
            token_id: token_id.clone(),
            exists: ttl.is_some(),
            ttl,
        })
    }

    /// Expiry embedded in a token, unverified; for diagnostics only
    pub fn token_expiry(&self, token: &str) -> DomainResult<DateTime<Utc>> {
        let claims = self.codec.peek(token)?;
        Ok(claims.expires_at().ok_or(TokenError::MissingExpiry)?)
    }

    /// Whether a token's embedded expiry has passed; unreadable tokens count as expired
    pub fn is_expired(&self, token: &str) -> bool {
        self.token_expiry(token)
            .map(|exp| exp <= self.clock.now())
            .unwrap_or(true)
    }

    async fn revoke_parsed(&self, access_token: &str, claims: &AccessClaims) -> DomainResult<()> {
        let peeked = self.codec.peek(access_token)?;
        let token_id = peeked.token_id().ok_or(TokenError::Malformed)?;
        let expires_at = peeked.expires_at().ok_or(TokenError::MissingExpiry)?;
        let residual = (expires_at - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .max(MIN_REVOCATION_TTL);

        self.store.revoke(&token_id, residual).await?;
        self.store.remove(claims.subject.id, &token_id).await?;

        tracing::info!(
            subject_id = claims.subject.id,
            token_id = %token_id,
            ttl_secs = residual.as_secs(),
            "Revoked session"
        );
        Ok(())
    }

    fn reject(&self, operation: &'static str, cause: TokenError) -> DomainError {
        tracing::warn!(operation, cause = %cause, "Token rejected");
        cause.into()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(0)
    }
}
