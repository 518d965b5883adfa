//! Tests for registration and session token stores

use super::*;
use crate::common::test_support::{memory_pool, start_clock, ManualClock};
use crate::common::Clock;
use chrono::Duration;
use sqlx::SqlitePool;
use std::sync::Arc;

async fn registration_store() -> (SqlitePool, ManualClock, RegistrationTokenStore) {
    let pool = memory_pool().await;
    let clock = start_clock();
    let store = RegistrationTokenStore::new(
        pool.clone(),
        Arc::new(clock.clone()),
        Duration::hours(24),
        5,
    );
    (pool, clock, store)
}

async fn session_store() -> (SqlitePool, ManualClock, SessionTokenStore) {
    let pool = memory_pool().await;
    let clock = start_clock();
    let store = SessionTokenStore::new(pool.clone(), Arc::new(clock.clone()), Duration::hours(24));
    (pool, clock, store)
}

#[tokio::test]
async fn test_issue_registration_token() {
    let (_pool, clock, store) = registration_store().await;

    let token = store.issue("alice@acme.com").await.unwrap();

    assert_eq!(token.id.len(), 64, "32 random bytes, hex encoded");
    assert!(token.id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(token.expires_at, clock.now() + Duration::hours(24));
    assert_eq!(store.validate(&token.id).await.unwrap(), "alice@acme.com");
}

#[tokio::test]
async fn test_validate_unknown_token() {
    let (_pool, _clock, store) = registration_store().await;
    assert!(matches!(
        store.validate("deadbeef").await,
        Err(RegistrationTokenError::NotFound)
    ));
}

#[tokio::test]
async fn test_validate_after_mark_used_is_already_used() {
    let (_pool, clock, store) = registration_store().await;
    let token = store.issue("alice@acme.com").await.unwrap();

    store.mark_used(&token.id, "U00000001").await.unwrap();

    assert!(matches!(
        store.validate(&token.id).await,
        Err(RegistrationTokenError::AlreadyUsed)
    ));

    // Still AlreadyUsed once it would also have expired
    clock.advance(Duration::hours(30));
    assert!(matches!(
        store.validate(&token.id).await,
        Err(RegistrationTokenError::AlreadyUsed)
    ));
}

#[tokio::test]
async fn test_token_expires_at_ttl_boundary() {
    let (_pool, clock, store) = registration_store().await;
    let token = store.issue("alice@acme.com").await.unwrap();

    clock.advance(Duration::hours(24) - Duration::seconds(1));
    assert!(store.validate(&token.id).await.is_ok());

    clock.advance(Duration::seconds(1));
    assert!(matches!(
        store.validate(&token.id).await,
        Err(RegistrationTokenError::Expired)
    ));
    assert!(matches!(
        store.mark_used(&token.id, "U00000001").await,
        Err(RegistrationTokenError::Expired)
    ));
}

#[tokio::test]
async fn test_failed_attempts_lock_token() {
    let (_pool, _clock, store) = registration_store().await;
    let token = store.issue("alice@acme.com").await.unwrap();

    for _ in 0..4 {
        store.record_failed_attempt(&token.id).await.unwrap();
    }
    assert!(store.validate(&token.id).await.is_ok());

    store.record_failed_attempt(&token.id).await.unwrap();
    assert!(matches!(
        store.validate(&token.id).await,
        Err(RegistrationTokenError::TooManyAttempts)
    ));

    let stored = store.find(&token.id).await.unwrap().unwrap();
    assert_eq!(stored.attempts, 5);
    assert!(stored.last_attempt_at.is_some());
    assert!(matches!(
        store.mark_used(&token.id, "U00000001").await,
        Err(RegistrationTokenError::TooManyAttempts)
    ));
}

#[tokio::test]
async fn test_validate_checks_used_before_expiry_and_attempts() {
    let (_pool, clock, store) = registration_store().await;
    let token = store.issue("alice@acme.com").await.unwrap();
    store.mark_used(&token.id, "U00000001").await.unwrap();

    for _ in 0..6 {
        store.record_failed_attempt(&token.id).await.unwrap();
    }
    clock.advance(Duration::days(3));

    assert!(matches!(
        store.validate(&token.id).await,
        Err(RegistrationTokenError::AlreadyUsed)
    ));
}

#[tokio::test]
async fn test_record_failed_attempt_unknown_token() {
    let (_pool, _clock, store) = registration_store().await;
    assert!(matches!(
        store.record_failed_attempt("missing").await,
        Err(RegistrationTokenError::NotFound)
    ));
}

#[tokio::test]
async fn test_concurrent_mark_used_single_winner() {
    let (_pool, _clock, store) = registration_store().await;
    let token = store.issue("alice@acme.com").await.unwrap();

    let (first, second) = tokio::join!(
        store.mark_used(&token.id, "U0000000A"),
        store.mark_used(&token.id, "U0000000B"),
    );

    let outcomes = [first, second];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let already_used = outcomes
        .iter()
        .filter(|r| matches!(r, Err(RegistrationTokenError::AlreadyUsed)))
        .count();
    assert_eq!(wins, 1);
    assert_eq!(already_used, 1);

    let stored = store.find(&token.id).await.unwrap().unwrap();
    assert!(stored.used);
    assert!(matches!(stored.used_by.as_deref(), Some("U0000000A") | Some("U0000000B")));
}

#[tokio::test]
async fn test_delete_expired_unused_keeps_used_tokens() {
    let (_pool, clock, store) = registration_store().await;
    let stale = store.issue("stale@acme.com").await.unwrap();
    let consumed = store.issue("used@acme.com").await.unwrap();
    store.mark_used(&consumed.id, "U00000001").await.unwrap();

    clock.advance(Duration::hours(12));
    let fresh = store.issue("fresh@acme.com").await.unwrap();
    clock.advance(Duration::hours(13));

    assert_eq!(store.delete_expired_unused(100).await.unwrap(), 1);
    assert!(store.find(&stale.id).await.unwrap().is_none());
    assert!(store.find(&consumed.id).await.unwrap().is_some());
    assert!(store.find(&fresh.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_session_token_absolute_expiry() {
    let (_pool, clock, store) = session_store().await;
    let issued = store.issue("U00000001").await.unwrap();

    clock.advance(Duration::hours(23) + Duration::minutes(59));
    store.touch(&issued.token).await.unwrap();
    assert_eq!(store.validate(&issued.token).await.unwrap(), "U00000001");

    let row = store.find(&issued.token).await.unwrap().unwrap();
    assert_eq!(row.expires_at, issued.expires_at, "touch must not extend expiry");

    clock.advance(Duration::minutes(2));
    assert!(matches!(
        store.validate(&issued.token).await,
        Err(SessionError::Expired)
    ));
}

#[tokio::test]
async fn test_session_token_refresh_replaces_old() {
    let (_pool, clock, store) = session_store().await;
    let issued = store.issue("U00000001").await.unwrap();

    clock.advance(Duration::hours(1));
    let refreshed = store.refresh(&issued.token).await.unwrap();

    assert_ne!(refreshed.token, issued.token);
    assert_eq!(refreshed.expires_at, issued.expires_at + Duration::hours(1));
    assert!(matches!(
        store.validate(&issued.token).await,
        Err(SessionError::NotFound)
    ));
    assert_eq!(store.validate(&refreshed.token).await.unwrap(), "U00000001");
    assert!(matches!(
        store.refresh(&issued.token).await,
        Err(SessionError::NotFound)
    ));
}

#[tokio::test]
async fn test_session_token_invalidate_is_idempotent() {
    let (_pool, _clock, store) = session_store().await;
    let issued = store.issue("U00000001").await.unwrap();

    store.invalidate(&issued.token).await.unwrap();
    store.invalidate(&issued.token).await.unwrap();
    store.invalidate("never-issued").await.unwrap();

    assert!(matches!(
        store.validate(&issued.token).await,
        Err(SessionError::NotFound)
    ));
}

#[tokio::test]
async fn test_delete_expired_session_tokens() {
    let (_pool, clock, store) = session_store().await;
    let old = store.issue("U00000001").await.unwrap();
    clock.advance(Duration::hours(20));
    let recent = store.issue("U00000002").await.unwrap();
    clock.advance(Duration::hours(5));

    assert_eq!(store.delete_expired(100).await.unwrap(), 1);
    assert!(store.find(&old.token).await.unwrap().is_none());
    assert!(store.find(&recent.token).await.unwrap().is_some());
}
