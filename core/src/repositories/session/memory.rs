//! In-memory session store
//!
//! Mirrors the Redis store semantics, expiry included, against an injectable
//! clock. Used by tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::entities::{SubjectId, TokenId};
use crate::errors::StoreError;
use crate::services::clock::{Clock, SystemClock};

use super::r#trait::{BulkRemoval, SessionStore};

struct Expiring<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> Expiring<T> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct State {
    records: HashMap<(SubjectId, TokenId), Expiring<String>>,
    live_sets: HashMap<SubjectId, Expiring<BTreeSet<TokenId>>>,
    revoked: HashMap<TokenId, DateTime<Utc>>,
}

impl State {
    /// Drop every entry whose expiry has passed
    fn prune(&mut self, now: DateTime<Utc>) {
        self.records.retain(|_, record| record.is_live(now));
        self.live_sets.retain(|_, set| set.is_live(now));
        self.revoked.retain(|_, expires_at| now < *expires_at);
    }

    fn footprint(&self) -> StoreFootprint {
        StoreFootprint {
            records: self.records.len(),
            live_sets: self.live_sets.len(),
            revoked: self.revoked.len(),
        }
    }
}

/// Entries physically held by a [`MemorySessionStore`], expired or not
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreFootprint {
    pub records: usize,
    pub live_sets: usize,
    pub revoked: usize,
}

/// Session store kept in process memory
pub struct MemorySessionStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    /// Create a store driven by the wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store whose expiry follows the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
        }
    }

    fn deadline(&self, ttl: Duration) -> DateTime<Utc> {
        let now = self.clock.now();
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Number of revocation markers still in force
    pub async fn revoked_count(&self) -> usize {
        let now = self.clock.now();
        let state = self.state.read().await;
        state.revoked.values().filter(|exp| now < **exp).count()
    }

    /// Entries currently held in memory
    ///
    /// Expired entries are dropped on every write, so this only counts
    /// leftovers since the last `put`, `revoke` or `remove_all`.
    pub async fn footprint(&self) -> StoreFootprint {
        self.state.read().await.footprint()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let expires_at = self.deadline(ttl);
        let mut state = self.state.write().await;
        state.prune(now);

        state.records.insert(
            (subject_id, token_id.clone()),
            Expiring {
                value: refresh_token.to_string(),
                expires_at,
            },
        );

        let set = state.live_sets.entry(subject_id).or_insert_with(|| Expiring {
            value: BTreeSet::new(),
            expires_at,
        });
        set.value.insert(token_id.clone());
        set.expires_at = set.expires_at.max(expires_at);

        Ok(())
    }

    async fn get(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<String, StoreError> {
        let now = self.clock.now();
        let state = self.state.read().await;
        state
            .records
            .get(&(subject_id, token_id.clone()))
            .filter(|record| record.is_live(now))
            .map(|record| record.value.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn remove(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let removed = state
            .records
            .remove(&(subject_id, token_id.clone()))
            .is_some_and(|record| record.is_live(now));

        let emptied = state.live_sets.get_mut(&subject_id).is_some_and(|set| {
            set.value.remove(token_id);
            set.value.is_empty()
        });
        if emptied {
            state.live_sets.remove(&subject_id);
        }

        Ok(removed)
    }

    async fn remove_all(&self, subject_id: SubjectId) -> Result<BulkRemoval, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let mut outcome = BulkRemoval::default();

        let members = match state.live_sets.remove(&subject_id) {
            Some(set) if set.is_live(now) => set.value,
            _ => BTreeSet::new(),
        };

        for token_id in members {
            match state.records.remove(&(subject_id, token_id)) {
                Some(record) if record.is_live(now) => outcome.removed += 1,
                _ => outcome.already_absent += 1,
            }
        }
        state.prune(now);

        Ok(outcome)
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let state = self.state.read().await;
        Ok(state.revoked.get(token_id).is_some_and(|exp| now < *exp))
    }

    async fn revoke(&self, token_id: &TokenId, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now();
        let expires_at = self.deadline(ttl);
        let mut state = self.state.write().await;
        state.prune(now);
        state.revoked.insert(token_id.clone(), expires_at);
        Ok(())
    }

    async fn live_token_ids(&self, subject_id: SubjectId) -> Result<Vec<TokenId>, StoreError> {
        let now = self.clock.now();
        let state = self.state.read().await;
        Ok(state
            .live_sets
            .get(&subject_id)
            .filter(|set| set.is_live(now))
            .map(|set| set.value.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn session_ttl(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
    ) -> Result<Option<Duration>, StoreError> {
        let now = self.clock.now();
        let state = self.state.read().await;
        Ok(state
            .records
            .get(&(subject_id, token_id.clone()))
            .filter(|record| record.is_live(now))
            .and_then(|record| (record.expires_at - now).to_std().ok()))
    }
}
