//! Key layout shared by every session store backend

use crate::domain::entities::{SubjectId, TokenId};

/// Refresh-token session record: `refresh_token:{uid}:{jti}`
pub fn refresh_token_key(subject_id: SubjectId, token_id: &TokenId) -> String {
    format!("refresh_token:{}:{}", subject_id, token_id)
}

/// Per-subject live set of token ids: `user_tokens:{uid}`
pub fn user_tokens_key(subject_id: SubjectId) -> String {
    format!("user_tokens:{}", subject_id)
}

/// Revocation marker for an access token id: `blacklist:{jti}`
pub fn blacklist_key(token_id: &TokenId) -> String {
    format!("blacklist:{}", token_id)
}
