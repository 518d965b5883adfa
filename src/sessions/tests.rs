//! Tests for the session lifecycle manager

use super::models::{DeviceMetadata, SweepReport};
use crate::auth::models::CustomClaims;
use crate::common::test_support::Harness;
use crate::common::Clock;
use crate::tokens::SessionError;
use axum::http::{HeaderMap, HeaderValue};
use chrono::Duration;

const USER_EMAIL: &str = "carol@acme.com";

fn device() -> DeviceMetadata {
    DeviceMetadata {
        user_agent: Some("Mozilla/5.0".into()),
        ip: Some("203.0.113.7".into()),
        location: Some("Berlin".into()),
        device: Some("laptop".into()),
    }
}

async fn session_status(h: &Harness, session_id: &str) -> String {
    let (status,): (String,) = sqlx::query_as("SELECT status FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_one(&h.pool)
        .await
        .unwrap();
    status
}

#[test]
fn test_device_metadata_from_headers() {
    let mut headers = HeaderMap::new();
    headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
    );

    let meta = DeviceMetadata::from_headers(&headers, Some("Lisbon".into()), None);
    assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
    assert_eq!(meta.ip.as_deref(), Some("198.51.100.4"));
    assert_eq!(meta.location.as_deref(), Some("Lisbon"));
    assert!(meta.device.is_none());
}

#[tokio::test]
async fn test_login_creates_active_session() {
    let h = Harness::new().await;
    let handle = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();

    assert_eq!(session_status(&h, &handle.session_id).await, "active");
    assert_eq!(handle.expires_at, h.clock.now() + Duration::hours(24));

    let listed = h.state.sessions.list_active("U_CAROL001").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].device.location.as_deref(), Some("Berlin"));
}

#[tokio::test]
async fn test_session_validate_then_sweep_exactly_once() {
    let h = Harness::new().await;
    let handle = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();

    h.clock.advance(Duration::hours(23) + Duration::minutes(59));
    assert!(h
        .state
        .session_tokens
        .validate(&handle.session_token)
        .await
        .is_ok());

    h.clock.advance(Duration::minutes(2));
    assert!(matches!(
        h.state.session_tokens.validate(&handle.session_token).await,
        Err(SessionError::Expired)
    ));

    let first = h.state.sessions.sweep_expired().await.unwrap();
    assert_eq!(first.sessions, 1);
    assert_eq!(first.session_tokens, 1);
    assert_eq!(session_status(&h, &handle.session_id).await, "expired");

    let second = h.state.sessions.sweep_expired().await.unwrap();
    assert_eq!(second, SweepReport::default());

    assert_eq!(h.mailer.count_with_subject(USER_EMAIL, "has expired"), 1);
}

#[tokio::test]
async fn test_lazy_expiry_notifies_once() {
    let h = Harness::new().await;
    let handle = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();

    h.clock.advance(Duration::hours(25));

    for _ in 0..3 {
        assert!(matches!(
            h.state.sessions.check_activity(&handle.session_token).await,
            Err(SessionError::Expired)
        ));
    }
    let swept = h.state.sessions.sweep_expired().await.unwrap();
    assert_eq!(swept.sessions, 0, "already expired lazily");

    assert_eq!(session_status(&h, &handle.session_id).await, "expired");
    assert_eq!(h.mailer.count_with_subject(USER_EMAIL, "has expired"), 1);
}

#[tokio::test]
async fn test_inactivity_warning_once_per_idle_stretch() {
    let h = Harness::new().await;
    let handle = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(30));
    let active = h
        .state
        .sessions
        .check_activity(&handle.session_token)
        .await
        .unwrap();
    assert!(!active.warning_sent);

    h.clock.advance(Duration::hours(2) + Duration::minutes(1));
    let active = h
        .state
        .sessions
        .check_activity(&handle.session_token)
        .await
        .unwrap();
    assert!(active.warning_sent);

    // Activity was just recorded, so no second warning
    let active = h
        .state
        .sessions
        .check_activity(&handle.session_token)
        .await
        .unwrap();
    assert!(!active.warning_sent);

    h.clock.advance(Duration::hours(3));
    let active = h
        .state
        .sessions
        .check_activity(&handle.session_token)
        .await
        .unwrap();
    assert!(active.warning_sent, "new idle stretch warns again");

    assert_eq!(h.mailer.count_with_subject(USER_EMAIL, "about to expire"), 2);
}

#[tokio::test]
async fn test_activity_does_not_extend_expiry() {
    let h = Harness::new().await;
    let handle = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();

    for _ in 0..4 {
        h.clock.advance(Duration::hours(5));
        h.state
            .sessions
            .check_activity(&handle.session_token)
            .await
            .unwrap();
    }

    h.clock.advance(Duration::hours(4));
    assert!(matches!(
        h.state.sessions.check_activity(&handle.session_token).await,
        Err(SessionError::Expired)
    ));
}

#[tokio::test]
async fn test_terminate_all_ends_sessions_and_tokens() {
    let h = Harness::new().await;
    let first = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();
    let second = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, DeviceMetadata::default())
        .await
        .unwrap();
    let other = h
        .state
        .sessions
        .login("U_DAVE0001", "dave@acme.com", DeviceMetadata::default())
        .await
        .unwrap();

    let count = h.state.sessions.terminate_all("U_CAROL001").await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(session_status(&h, &first.session_id).await, "terminated");
    assert_eq!(session_status(&h, &second.session_id).await, "terminated");
    assert_eq!(session_status(&h, &other.session_id).await, "active");

    assert!(matches!(
        h.state.sessions.check_activity(&first.session_token).await,
        Err(SessionError::NotFound)
    ));

    // Terminated is terminal: the sweep never turns it into expired
    h.clock.advance(Duration::days(2));
    let report = h.state.sessions.sweep_expired().await.unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(session_status(&h, &first.session_id).await, "terminated");
    assert_eq!(h.state.sessions.terminate_all("U_CAROL001").await.unwrap(), 0);
}

#[tokio::test]
async fn test_refresh_moves_session_to_new_token() {
    let h = Harness::new().await;
    let handle = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();

    h.clock.advance(Duration::hours(3));
    let refreshed = h.state.sessions.refresh(&handle.session_token).await.unwrap();

    assert_eq!(refreshed.session_id, handle.session_id);
    assert_ne!(refreshed.session_token, handle.session_token);
    assert!(matches!(
        h.state.sessions.check_activity(&handle.session_token).await,
        Err(SessionError::NotFound)
    ));
    assert!(h
        .state
        .sessions
        .check_activity(&refreshed.session_token)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let h = Harness::new().await;
    let handle = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();

    h.state.sessions.logout(&handle.session_token).await.unwrap();
    h.state.sessions.logout(&handle.session_token).await.unwrap();

    assert_eq!(session_status(&h, &handle.session_id).await, "terminated");
}

#[tokio::test]
async fn test_analytics_counts() {
    let h = Harness::new().await;
    let _ = h.create_account(USER_EMAIL, CustomClaims::default()).await;

    let old = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();
    h.clock.advance(Duration::hours(25));
    h.state.sessions.sweep_expired().await.unwrap();

    let ended = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();
    h.state.sessions.logout(&ended.session_token).await.unwrap();
    h.state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();

    let stats = h.state.sessions.analytics().await.unwrap();
    assert_eq!(stats.active_sessions, 1);
    assert_eq!(stats.expired_sessions, 1);
    assert_eq!(stats.terminated_sessions, 1);
    assert_eq!(stats.recent_logins, 2);
    assert_eq!(session_status(&h, &old.session_id).await, "expired");
}

#[tokio::test]
async fn test_session_routes_over_http() {
    use axum::body::{to_bytes, Body};
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};
    use tower::ServiceExt;

    let h = Harness::new().await;
    let account = h.create_account(USER_EMAIL, CustomClaims::default()).await;
    let bearer = format!("Bearer {}", h.id_token(&account.uid).await);
    let handle = h
        .state
        .sessions
        .login(&account.uid, USER_EMAIL, device())
        .await
        .unwrap();
    let app = crate::build_router(h.state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/sessions")
                .header(AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["sessions"].as_array().map(Vec::len), Some(1));

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/sessions/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/sessions/refresh")
                .header("x-session-token", &handle.session_token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let refreshed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(refreshed["session_id"], handle.session_id.as_str());
    assert_ne!(refreshed["session_token"], handle.session_token.as_str());

    // The replaced token no longer authenticates
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/sessions/refresh")
                .header("x-session-token", &handle.session_token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::get("/api/admin/sessions/analytics")
                .header(AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_mail_failures_do_not_break_the_lifecycle() {
    let h = Harness::with_failing_mailer().await;
    let idle = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();

    h.clock.advance(Duration::hours(2) + Duration::minutes(1));
    let active = h
        .state
        .sessions
        .check_activity(&idle.session_token)
        .await
        .unwrap();
    assert!(active.warning_sent);
    assert_eq!(session_status(&h, &idle.session_id).await, "active");

    let overdue = h
        .state
        .sessions
        .login("U_CAROL001", USER_EMAIL, device())
        .await
        .unwrap();
    h.clock.advance(Duration::hours(25));

    assert!(matches!(
        h.state.sessions.check_activity(&idle.session_token).await,
        Err(SessionError::Expired)
    ));
    let report = h.state.sessions.sweep_expired().await.unwrap();
    assert_eq!(report.sessions, 1);

    assert_eq!(session_status(&h, &idle.session_id).await, "expired");
    assert_eq!(session_status(&h, &overdue.session_id).await, "expired");
    assert!(h.mailer.sent().is_empty());
}
