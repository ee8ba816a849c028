//! Unit tests for token service

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::{Subject, TokenKind};
use ig_shared::errors::error_codes;

use crate::errors::{DomainError, StoreError, TokenError};
use crate::repositories::{BulkRemoval, SessionStore};
use crate::services::token::RevocationReadPolicy;

use super::mocks::{alice, bob, config, BrokenEntropy, Harness};

fn cause(error: &DomainError) -> &TokenError {
    error
        .token_cause()
        .unwrap_or_else(|| panic!("expected Unauthorized, got {:?}", error))
}

#[tokio::test]
async fn test_issue_validate_rotate_scenario() {
    let h = Harness::new();

    let pair = h.service.issue_pair(&alice()).await.unwrap();
    assert_eq!(pair.access_expires_in, 900);
    assert_eq!(pair.refresh_expires_in, 604_800);

    let claims = h.service.validate_access(&pair.access_token).await.unwrap();
    assert_eq!(claims.subject, Subject::new(42, "a@b.com", "user"));
    assert_eq!(claims.token_id, pair.token_id);

    let rotated = h.service.rotate(&pair.refresh_token).await.unwrap();
    assert_ne!(rotated.token_id, pair.token_id);
    assert!(h.service.validate_access(&rotated.access_token).await.is_ok());

    let replay = h.service.rotate(&pair.refresh_token).await.unwrap_err();
    assert_eq!(cause(&replay), &TokenError::InvalidRefreshToken);
}

#[tokio::test]
async fn test_pair_shares_token_id_and_expiries() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();

    let access = h.service.codec().peek(&pair.access_token).unwrap();
    let refresh = h.service.codec().peek(&pair.refresh_token).unwrap();
    assert_eq!(access.token_id(), Some(pair.token_id.clone()));
    assert_eq!(refresh.token_id(), Some(pair.token_id.clone()));
    assert_eq!(access.expires_at(), Some(pair.access_expires_at));
    assert_eq!(refresh.expires_at(), Some(pair.refresh_expires_at));

    let stored = h.store().get(42, &pair.token_id).await.unwrap();
    assert_eq!(stored, pair.refresh_token);
}

#[tokio::test]
async fn test_concurrent_rotation_has_single_winner() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();

    let (first, second) = tokio::join!(
        h.service.rotate(&pair.refresh_token),
        h.service.rotate(&pair.refresh_token)
    );

    let winners = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = if first.is_err() { first } else { second };
    assert!(loser.unwrap_err().is_unauthorized());
    assert_eq!(h.service.session_count(42).await.unwrap(), 1);
}

#[tokio::test]
async fn test_rotate_rejects_access_token() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();

    let err = h.service.rotate(&pair.access_token).await.unwrap_err();
    assert_eq!(
        cause(&err),
        &TokenError::WrongTokenKind {
            expected: TokenKind::Refresh
        }
    );
}

#[tokio::test]
async fn test_rotate_requires_matching_session_record() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();

    h.store()
        .put(42, &pair.token_id, "something-else", Duration::from_secs(60))
        .await
        .unwrap();

    let err = h.service.rotate(&pair.refresh_token).await.unwrap_err();
    assert_eq!(cause(&err), &TokenError::InvalidRefreshToken);
}

#[tokio::test]
async fn test_rotate_unknown_subject() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();
    h.identity.remove(42).await;

    let err = h.service.rotate(&pair.refresh_token).await.unwrap_err();
    assert_eq!(cause(&err), &TokenError::UnknownSubject);
}

#[tokio::test]
async fn test_rotate_uses_current_identity() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();
    h.identity.insert(Subject::new(42, "a@b.com", "admin")).await;

    let rotated = h.service.rotate(&pair.refresh_token).await.unwrap();
    let claims = h.service.validate_access(&rotated.access_token).await.unwrap();
    assert_eq!(claims.subject.role, "admin");
}

#[tokio::test]
async fn test_rotate_propagates_store_outage() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();
    h.store().fail_reads.store(true, Ordering::SeqCst);

    let err = h.service.rotate(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, DomainError::Store(StoreError::Unavailable { .. })));
}

#[tokio::test]
async fn test_rotate_tolerates_failed_removal() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();
    h.store().fail_removes.store(true, Ordering::SeqCst);

    let rotated = h.service.rotate(&pair.refresh_token).await.unwrap();
    assert_ne!(rotated.token_id, pair.token_id);
}

#[tokio::test]
async fn test_expired_refresh_token() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();
    h.advance_secs(7 * 24 * 3600);

    let err = h.service.rotate(&pair.refresh_token).await.unwrap_err();
    assert_eq!(cause(&err), &TokenError::Expired);
}

#[tokio::test]
async fn test_expired_access_token() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();

    h.advance_secs(15 * 60);
    let err = h.service.validate_access(&pair.access_token).await.unwrap_err();
    assert_eq!(cause(&err), &TokenError::Expired);
    assert!(h.service.is_expired(&pair.access_token));
    assert!(!h.service.is_expired(&pair.refresh_token));
}

#[tokio::test]
async fn test_revoke_blocks_access_and_refresh() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();

    h.service.revoke(&pair.access_token).await.unwrap();

    let err = h.service.validate_access(&pair.access_token).await.unwrap_err();
    assert_eq!(cause(&err), &TokenError::Revoked);
    let err = h.service.rotate(&pair.refresh_token).await.unwrap_err();
    assert_eq!(cause(&err), &TokenError::InvalidRefreshToken);

    // Second revoke is a no-op
    h.service.revoke(&pair.access_token).await.unwrap();
}

#[tokio::test]
async fn test_revocation_marker_lasts_residual_lifetime() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();

    h.advance_secs(10 * 60);
    h.service.revoke(&pair.access_token).await.unwrap();
    assert!(h.store().inner.is_revoked(&pair.token_id).await.unwrap());

    h.advance_secs(5 * 60);
    assert!(!h.store().inner.is_revoked(&pair.token_id).await.unwrap());
}

#[tokio::test]
async fn test_revoke_rejects_invalid_token() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();

    let err = h.service.revoke(&pair.refresh_token).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(h.store().inner.revoked_count().await, 0);
}

#[tokio::test]
async fn test_revoke_all_leaves_other_subjects() {
    let h = Harness::new();
    let first = h.service.issue_pair(&alice()).await.unwrap();
    let second = h.service.issue_pair(&alice()).await.unwrap();
    let other = h.service.issue_pair(&bob()).await.unwrap();

    let outcome = h.service.revoke_all(42).await.unwrap();
    assert_eq!(
        outcome,
        BulkRemoval {
            removed: 2,
            already_absent: 0,
            failed: 0
        }
    );

    for pair in [&first, &second] {
        let err = h.service.rotate(&pair.refresh_token).await.unwrap_err();
        assert_eq!(cause(&err), &TokenError::InvalidRefreshToken);
    }
    assert!(h.service.rotate(&other.refresh_token).await.is_ok());

    // Access tokens are not blacklisted by a bulk revoke
    assert!(h.service.validate_access(&first.access_token).await.is_ok());
}

#[tokio::test]
async fn test_revoke_all_reports_partial_failure() {
    let h = Harness::new();
    let first = h.service.issue_pair(&alice()).await.unwrap();
    h.service.issue_pair(&alice()).await.unwrap();
    h.store().poison(&first.token_id);

    let err = h.service.revoke_all(42).await.unwrap_err();
    assert_eq!(
        err,
        DomainError::PartialRevocation {
            failed: 1,
            attempted: 2
        }
    );
}

#[tokio::test]
async fn test_revocation_read_fails_open_by_default() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();
    h.service.revoke(&pair.access_token).await.unwrap();
    h.store().fail_revocation_reads.store(true, Ordering::SeqCst);

    // The store cannot answer, so even a revoked token passes
    let claims = h.service.validate_access(&pair.access_token).await.unwrap();
    assert_eq!(claims.subject, alice());
}

#[tokio::test]
async fn test_revocation_read_fail_closed() {
    let h = Harness::with_config(
        config().with_revocation_read_policy(RevocationReadPolicy::FailClosed),
    );
    let pair = h.service.issue_pair(&alice()).await.unwrap();
    h.store().fail_revocation_reads.store(true, Ordering::SeqCst);

    let err = h.service.validate_access(&pair.access_token).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(cause(&err), &TokenError::RevocationUnverified);
    assert_eq!(err.error_code(), error_codes::TOKEN_INVALID);
}

#[tokio::test]
async fn test_signature_checked_before_store() {
    let h = Harness::with_config(
        config().with_revocation_read_policy(RevocationReadPolicy::FailClosed),
    );
    h.store().fail_revocation_reads.store(true, Ordering::SeqCst);

    let err = h.service.validate_access("not.a.token").await.unwrap_err();
    assert_eq!(cause(&err), &TokenError::Malformed);
}

#[tokio::test]
async fn test_issue_fails_when_store_write_fails() {
    let h = Harness::new();
    h.store().fail_writes.store(true, Ordering::SeqCst);

    let err = h.service.issue_pair(&alice()).await.unwrap_err();
    assert!(matches!(err, DomainError::Store(_)));
}

#[tokio::test]
async fn test_issue_fails_without_entropy() {
    let h = Harness::build(config(), Arc::new(BrokenEntropy));

    let err = h.service.issue_pair(&alice()).await.unwrap_err();
    assert!(matches!(err, DomainError::Internal { .. }));
}

#[tokio::test]
async fn test_logout_removes_both_sessions() {
    let h = Harness::new();
    let web = h.service.issue_pair(&alice()).await.unwrap();
    let mobile = h.service.issue_pair(&alice()).await.unwrap();
    let other = h.service.issue_pair(&bob()).await.unwrap();

    h.service
        .logout(&web.access_token, Some(&mobile.refresh_token))
        .await
        .unwrap();

    assert!(h.service.validate_access(&web.access_token).await.is_err());
    assert!(h.service.active_sessions(42).await.unwrap().is_empty());

    // Another subject's refresh token is ignored
    h.service
        .logout(&mobile.access_token, Some(&other.refresh_token))
        .await
        .unwrap();
    assert_eq!(h.service.active_sessions(43).await.unwrap(), vec![other.token_id]);
}

#[tokio::test]
async fn test_session_introspection() {
    let h = Harness::new();
    let first = h.service.issue_pair(&alice()).await.unwrap();
    h.advance_secs(60);
    let second = h.service.issue_pair(&alice()).await.unwrap();

    let mut active = h.service.active_sessions(42).await.unwrap();
    active.sort();
    let mut expected = vec![first.token_id.clone(), second.token_id.clone()];
    expected.sort();
    assert_eq!(active, expected);
    assert_eq!(h.service.session_count(42).await.unwrap(), 2);

    let info = h.service.session_info(42, &first.token_id).await.unwrap();
    assert!(info.exists);
    assert_eq!(info.ttl, Some(Duration::from_secs(604_800 - 60)));

    h.service.rotate(&first.refresh_token).await.unwrap();
    let info = h.service.session_info(42, &first.token_id).await.unwrap();
    assert!(!info.exists);
    assert_eq!(info.ttl, None);
}

#[tokio::test]
async fn test_token_expiry_helper() {
    let h = Harness::new();
    let pair = h.service.issue_pair(&alice()).await.unwrap();

    assert_eq!(
        h.service.token_expiry(&pair.access_token).unwrap(),
        pair.access_expires_at
    );
    assert!(h.service.token_expiry("garbage").is_err());
    assert!(h.service.is_expired("garbage"));
}
