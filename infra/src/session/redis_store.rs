//! Redis-backed session store
//!
//! Key layout (before the optional configured prefix):
//! - `refresh_token:{uid}:{jti}` holds the refresh token string
//! - `user_tokens:{uid}` is the set of live token ids of a subject
//! - `blacklist:{jti}` marks a revoked access token

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use ig_core::repositories::session::keys::{blacklist_key, refresh_token_key, user_tokens_key};
use ig_core::{BulkRemoval, SessionStore, StoreError, SubjectId, TokenId};

use crate::cache::RedisClient;

/// Value stored under a revocation key; only existence matters
const REVOKED_MARKER: &str = "1";

/// Session store over a shared Redis connection
#[derive(Clone)]
pub struct RedisSessionStore {
    client: RedisClient,
}

impl RedisSessionStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    fn record_key(&self, subject_id: SubjectId, token_id: &TokenId) -> String {
        self.client.make_key(&refresh_token_key(subject_id, token_id))
    }

    fn live_set_key(&self, subject_id: SubjectId) -> String {
        self.client.make_key(&user_tokens_key(subject_id))
    }

    fn revocation_key(&self, token_id: &TokenId) -> String {
        self.client.make_key(&blacklist_key(token_id))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let seconds = ttl_seconds(ttl);
        self.client
            .set_and_track(
                &self.record_key(subject_id, token_id),
                refresh_token,
                &self.live_set_key(subject_id),
                token_id.as_str(),
                seconds,
            )
            .await?;

        debug!(subject_id, token_id = %token_id, ttl_secs = seconds, "Stored refresh session");
        Ok(())
    }

    async fn get(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<String, StoreError> {
        self.client
            .get(&self.record_key(subject_id, token_id))
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn remove(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<bool, StoreError> {
        let deleted = self
            .client
            .delete(&self.record_key(subject_id, token_id))
            .await?;
        // The record delete is what callers rely on; a stale set member is
        // reported as already absent later
        if let Err(e) = self
            .client
            .remove_from_set(&self.live_set_key(subject_id), token_id.as_str())
            .await
        {
            warn!(subject_id, token_id = %token_id, error = %e, "Failed to update live session set");
        }

        debug!(subject_id, token_id = %token_id, deleted, "Removed refresh session");
        Ok(deleted)
    }

    async fn remove_all(&self, subject_id: SubjectId) -> Result<BulkRemoval, StoreError> {
        let set_key = self.live_set_key(subject_id);
        let members = self.client.set_members(&set_key).await?;
        let mut outcome = BulkRemoval::default();
        let mut cleared = Vec::with_capacity(members.len());

        for member in members {
            let Some(token_id) = TokenId::parse(&member) else {
                outcome.already_absent += 1;
                cleared.push(member);
                continue;
            };
            match self.client.delete(&self.record_key(subject_id, &token_id)).await {
                Ok(true) => outcome.removed += 1,
                Ok(false) => outcome.already_absent += 1,
                Err(e) => {
                    warn!(subject_id, token_id = %token_id, error = %e, "Failed to remove session");
                    outcome.failed += 1;
                    continue;
                }
            }
            cleared.push(member);
        }

        if outcome.is_complete() {
            if let Err(e) = self.client.delete(&set_key).await {
                warn!(subject_id, error = %e, "Failed to delete live session set");
            }
        } else {
            // Keep the failed members listed so a later call can retry them
            for member in &cleared {
                if let Err(e) = self.client.remove_from_set(&set_key, member).await {
                    warn!(subject_id, error = %e, "Failed to update live session set");
                }
            }
        }

        info!(
            subject_id,
            removed = outcome.removed,
            already_absent = outcome.already_absent,
            failed = outcome.failed,
            "Removed all sessions"
        );
        Ok(outcome)
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        Ok(self.client.exists(&self.revocation_key(token_id)).await?)
    }

    async fn revoke(&self, token_id: &TokenId, ttl: Duration) -> Result<(), StoreError> {
        let seconds = ttl_seconds(ttl);
        self.client
            .set_with_expiry(&self.revocation_key(token_id), REVOKED_MARKER, seconds)
            .await?;

        debug!(token_id = %token_id, ttl_secs = seconds, "Revocation marker written");
        Ok(())
    }

    async fn live_token_ids(&self, subject_id: SubjectId) -> Result<Vec<TokenId>, StoreError> {
        let members = self.client.set_members(&self.live_set_key(subject_id)).await?;
        Ok(members.iter().filter_map(|m| TokenId::parse(m)).collect())
    }

    async fn session_ttl(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
    ) -> Result<Option<Duration>, StoreError> {
        let ttl = self.client.ttl(&self.record_key(subject_id, token_id)).await?;
        Ok(ttl.and_then(|secs| u64::try_from(secs).ok()).map(Duration::from_secs))
    }

    async fn count_sessions(&self, subject_id: SubjectId) -> Result<usize, StoreError> {
        Ok(self.client.set_size(&self.live_set_key(subject_id)).await?)
    }
}

/// Redis expiries are whole seconds; round up and never go below one
pub(crate) fn ttl_seconds(ttl: Duration) -> u64 {
    let seconds = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    seconds.max(1)
}
