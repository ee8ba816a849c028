//! Subject entity - the principal a token is issued for.

use serde::{Deserialize, Serialize};

/// Opaque numeric identifier of a subject
pub type SubjectId = u64;

/// Principal identity supplied by the identity collaborator
///
/// The token core trusts the email and role it is handed and embeds them
/// verbatim in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    /// Subject identifier (`uid` claim)
    pub id: SubjectId,

    /// Email address (`email` claim)
    pub email: String,

    /// Role name (`role` claim, access tokens only)
    pub role: String,
}

impl Subject {
    /// Creates a new subject
    pub fn new(id: SubjectId, email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            role: role.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_creation() {
        let subject = Subject::new(42, "a@b.com", "user");
        assert_eq!(subject.id, 42);
        assert_eq!(subject.email, "a@b.com");
        assert_eq!(subject.role, "user");
    }
}
