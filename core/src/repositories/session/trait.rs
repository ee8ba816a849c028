//! Session store trait defining the persistence contract for refresh sessions
//! and access-token revocations.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::{SubjectId, TokenId};
use crate::errors::StoreError;

/// Aggregate outcome of a best-effort bulk removal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkRemoval {
    /// Records actually deleted
    pub removed: usize,
    /// Live-set members whose record had already expired or been removed
    pub already_absent: usize,
    /// Members whose deletion failed
    pub failed: usize,
}

impl BulkRemoval {
    pub fn attempted(&self) -> usize {
        self.removed + self.already_absent + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Store for refresh-token sessions and access-token revocations
///
/// Three key families with independent expiry:
/// - a session record per `(subject, token id)` holding the refresh token string
/// - a per-subject live set of token ids
/// - a revocation marker per access token id
///
/// Implementations must not retry failed commands internally. Every
/// single-key write is one command, so a cancelled call either happened or
/// did not; only [`SessionStore::remove_all`] may complete partially.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a refresh token and add its id to the subject's live set
    ///
    /// The live set's expiry is raised to cover the new member, never lowered.
    /// Writing the same inputs twice leaves the same state.
    async fn put(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Fetch the stored refresh token
    ///
    /// # Returns
    /// * `Err(StoreError::NotFound)` - No record, or the record expired
    async fn get(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<String, StoreError>;

    /// Delete a session record and drop its id from the live set
    ///
    /// # Returns
    /// * `Ok(true)` - A record was deleted by this call
    /// * `Ok(false)` - Nothing to delete
    async fn remove(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<bool, StoreError>;

    /// Delete every session of a subject, then the live set itself
    ///
    /// Fails only if the live set cannot be read; per-member failures are
    /// counted in the returned [`BulkRemoval`].
    async fn remove_all(&self, subject_id: SubjectId) -> Result<BulkRemoval, StoreError>;

    /// Whether a revocation marker exists for this access token id
    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError>;

    /// Write a revocation marker that expires after `ttl`
    async fn revoke(&self, token_id: &TokenId, ttl: Duration) -> Result<(), StoreError>;

    /// Members of the subject's live set
    ///
    /// May include ids whose record has already expired.
    async fn live_token_ids(&self, subject_id: SubjectId) -> Result<Vec<TokenId>, StoreError>;

    /// Remaining lifetime of a session record, `None` if it does not exist
    async fn session_ttl(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
    ) -> Result<Option<Duration>, StoreError>;

    /// Number of live-set members
    async fn count_sessions(&self, subject_id: SubjectId) -> Result<usize, StoreError> {
        Ok(self.live_token_ids(subject_id).await?.len())
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn put(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        (**self).put(subject_id, token_id, refresh_token, ttl).await
    }

    async fn get(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<String, StoreError> {
        (**self).get(subject_id, token_id).await
    }

    async fn remove(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<bool, StoreError> {
        (**self).remove(subject_id, token_id).await
    }

    async fn remove_all(&self, subject_id: SubjectId) -> Result<BulkRemoval, StoreError> {
        (**self).remove_all(subject_id).await
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        (**self).is_revoked(token_id).await
    }

    async fn revoke(&self, token_id: &TokenId, ttl: Duration) -> Result<(), StoreError> {
        (**self).revoke(token_id, ttl).await
    }

    async fn live_token_ids(&self, subject_id: SubjectId) -> Result<Vec<TokenId>, StoreError> {
        (**self).live_token_ids(subject_id).await
    }

    async fn session_ttl(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
    ) -> Result<Option<Duration>, StoreError> {
        (**self).session_ttl(subject_id, token_id).await
    }

    async fn count_sessions(&self, subject_id: SubjectId) -> Result<usize, StoreError> {
        (**self).count_sessions(subject_id).await
    }
}
