//! Identity lookup consumed by the token service
//!
//! The token core does not own user records. It only needs to turn a subject
//! id back into the `(id, email, role)` triple it embeds in access tokens.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::entities::{Subject, SubjectId};
use crate::errors::DomainError;

/// Resolves subjects by id
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// # Returns
    /// * `Ok(Some(Subject))` - Subject exists
    /// * `Ok(None)` - Unknown or deleted subject
    /// * `Err(DomainError)` - Lookup failed
    async fn resolve(&self, id: SubjectId) -> Result<Option<Subject>, DomainError>;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    async fn resolve(&self, id: SubjectId) -> Result<Option<Subject>, DomainError> {
        (**self).resolve(id).await
    }
}

/// Identity provider backed by a map, for tests and fixtures
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    subjects: RwLock<HashMap<SubjectId, Subject>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider pre-populated with subjects
    pub fn with_subjects(subjects: impl IntoIterator<Item = Subject>) -> Self {
        Self {
            subjects: RwLock::new(subjects.into_iter().map(|s| (s.id, s)).collect()),
        }
    }

    pub async fn insert(&self, subject: Subject) {
        self.subjects.write().await.insert(subject.id, subject);
    }

    pub async fn remove(&self, id: SubjectId) -> Option<Subject> {
        self.subjects.write().await.remove(&id)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn resolve(&self, id: SubjectId) -> Result<Option<Subject>, DomainError> {
        Ok(self.subjects.read().await.get(&id).cloned())
    }
}
