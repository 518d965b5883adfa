//! Interview scheduling and access gate tests

use super::gate::{within_window, AccessGateError};
use super::models::{AccessType, CreateInterviewRequest};
use super::services::InterviewsService;
use crate::auth::models::{CustomClaims, Identity, Role};
use crate::common::test_support::Harness;
use crate::common::{ApiError, Clock};
use axum::body::Body;
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use chrono::{DateTime, Duration, Utc};
use tower::ServiceExt;

const INTERVIEWER_EMAIL: &str = "ivan@acme.com";
const CANDIDATE_EMAIL: &str = "cara@example.org";

fn identity(uid: &str, email: &str, role: Role) -> Identity {
    Identity {
        uid: uid.to_string(),
        email: email.to_string(),
        email_verified: true,
        claims: CustomClaims {
            role,
            ..CustomClaims::default()
        },
        auth_time: Utc::now(),
    }
}

fn interviewer() -> Identity {
    identity("U_IVAN0001", INTERVIEWER_EMAIL, Role::Interviewer)
}

fn candidate() -> Identity {
    identity("U_CARA0001", CANDIDATE_EMAIL, Role::User)
}

fn request_at(date: DateTime<Utc>) -> CreateInterviewRequest {
    CreateInterviewRequest {
        candidate_name: "Cara Candidate".to_string(),
        candidate_email: CANDIDATE_EMAIL.to_string(),
        date: date.to_rfc3339(),
        duration_minutes: Some(60),
        interview_type: Some("Technical".to_string()),
        level: Some("senior".to_string()),
    }
}

/// Schedule one interview two hours after the harness start
async fn schedule(h: &Harness) -> (String, DateTime<Utc>) {
    let start = h.clock.now() + Duration::hours(2);
    let created = InterviewsService::new(&h.state)
        .create_interview(&interviewer(), request_at(start))
        .await
        .unwrap();
    (created.interview_id, start)
}

async fn access_log_count(h: &Harness, interview_id: &str) -> i64 {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM interview_access_logs WHERE interview_id = ?")
            .bind(interview_id)
            .fetch_one(&h.pool)
            .await
            .unwrap();
    count
}

#[test]
fn test_within_window_inclusive_edges() {
    let start = crate::common::test_support::start_instant();
    let early = Duration::minutes(15);
    let late = Duration::minutes(60);

    assert!(within_window(start, start - Duration::minutes(15), early, late));
    assert!(within_window(start, start, early, late));
    assert!(within_window(start, start + Duration::minutes(60), early, late));
    assert!(!within_window(start, start - Duration::minutes(16), early, late));
    assert!(!within_window(start, start + Duration::minutes(61), early, late));
    assert!(!within_window(
        start,
        start - Duration::minutes(15) - Duration::seconds(1),
        early,
        late
    ));
}

#[tokio::test]
async fn test_gate_window_boundaries() {
    let h = Harness::new().await;
    let (id, start) = schedule(&h).await;

    // S-16 min
    h.clock.set(start - Duration::minutes(16));
    assert!(matches!(
        h.state.interview_gate.authorize(&candidate(), &id).await,
        Err(AccessGateError::OutOfWindow)
    ));

    // S-15 min
    h.clock.set(start - Duration::minutes(15));
    let access = h.state.interview_gate.authorize(&candidate(), &id).await.unwrap();
    assert_eq!(access.access_type, AccessType::Candidate);

    // S+60 min
    h.clock.set(start + Duration::minutes(60));
    let access = h
        .state
        .interview_gate
        .authorize(&interviewer(), &id)
        .await
        .unwrap();
    assert_eq!(access.access_type, AccessType::Interviewer);

    // S+61 min
    h.clock.set(start + Duration::minutes(61));
    assert!(matches!(
        h.state.interview_gate.authorize(&interviewer(), &id).await,
        Err(AccessGateError::OutOfWindow)
    ));

    assert_eq!(access_log_count(&h, &id).await, 2);
}

#[tokio::test]
async fn test_gate_grants_when_access_log_write_fails() {
    let h = Harness::new().await;
    let (id, start) = schedule(&h).await;
    h.clock.set(start);

    sqlx::query("DROP TABLE interview_access_logs")
        .execute(&h.pool)
        .await
        .unwrap();

    let access = h.state.interview_gate.authorize(&candidate(), &id).await.unwrap();
    assert_eq!(access.access_type, AccessType::Candidate);
    assert_eq!(access.interview.id, id);
}

#[tokio::test]
async fn test_gate_rejects_unknown_and_outsiders() {
    let h = Harness::new().await;
    let (id, start) = schedule(&h).await;
    h.clock.set(start);

    assert!(matches!(
        h.state.interview_gate.authorize(&candidate(), "I_MISSING0").await,
        Err(AccessGateError::NotFound)
    ));

    let outsider = identity("U_OTTO0001", "otto@elsewhere.io", Role::Interviewer);
    assert!(matches!(
        h.state.interview_gate.authorize(&outsider, &id).await,
        Err(AccessGateError::Forbidden)
    ));

    // Candidate match ignores case
    let shouting = identity("U_CARA0002", "CARA@example.org", Role::User);
    assert!(h.state.interview_gate.authorize(&shouting, &id).await.is_ok());

    assert_eq!(access_log_count(&h, &id).await, 1);
}

#[tokio::test]
async fn test_gate_checks_state_before_window() {
    let h = Harness::new().await;
    let (id, _start) = schedule(&h).await;

    InterviewsService::new(&h.state)
        .cancel_interview(&interviewer(), &id)
        .await
        .unwrap();

    // Far outside the window, yet the status check answers first
    h.clock.advance(Duration::days(3));
    match h.state.interview_gate.authorize(&candidate(), &id).await {
        Err(AccessGateError::InvalidState(status)) => assert_eq!(status, "cancelled"),
        other => panic!("expected InvalidState, got {:?}", other.map(|a| a.access_type)),
    }
}

#[tokio::test]
async fn test_create_interview_rules() {
    let h = Harness::new().await;
    let service = InterviewsService::new(&h.state);
    let future = h.clock.now() + Duration::days(1);

    let plain_user = identity("U_PLAIN001", "plain@acme.com", Role::User);
    assert!(matches!(
        service.create_interview(&plain_user, request_at(future)).await,
        Err(ApiError::Forbidden(_))
    ));

    assert!(matches!(
        service
            .create_interview(&interviewer(), request_at(h.clock.now()))
            .await,
        Err(ApiError::BadRequest(_))
    ));

    let mut bad = request_at(future);
    bad.candidate_email = "not-an-email".into();
    bad.date = "next tuesday".into();
    match service.create_interview(&interviewer(), bad).await {
        Err(ApiError::ValidationError(msg)) => {
            assert!(msg.contains("candidate_email"));
            assert!(msg.contains("date"));
        }
        _ => panic!("expected validation error"),
    }

    let admin = identity("U_ADMIN001", "boss@acme.com", Role::Admin);
    let created = service
        .create_interview(&admin, request_at(future))
        .await
        .unwrap();
    assert_eq!(created.session_id.len(), 9);
    assert_eq!(h.mailer.count_with_subject(CANDIDATE_EMAIL, "Interview Scheduled"), 1);

    let invite = h
        .mailer
        .sent()
        .into_iter()
        .find(|m| m.to == CANDIDATE_EMAIL)
        .unwrap();
    assert!(invite.html.contains(&format!("http://app.test/{}", created.session_id)));
}

#[tokio::test]
async fn test_defaults_and_listing() {
    let h = Harness::new().await;
    let service = InterviewsService::new(&h.state);

    let mut minimal = request_at(h.clock.now() + Duration::days(1));
    minimal.duration_minutes = None;
    minimal.interview_type = None;
    minimal.level = None;
    let first = service.create_interview(&interviewer(), minimal).await.unwrap();
    let second = service
        .create_interview(&interviewer(), request_at(h.clock.now() + Duration::days(2)))
        .await
        .unwrap();

    let listed = service
        .list_for_interviewer(&interviewer().uid, None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.interview_id, "latest date first");
    assert_eq!(listed[1].interview_type, "technical");
    assert_eq!(listed[1].level, "mid");
    assert_eq!(listed[1].duration_minutes, 45);
    assert_eq!(listed[1].id, first.interview_id);

    service
        .cancel_interview(&interviewer(), &first.interview_id)
        .await
        .unwrap();
    let cancelled = service
        .list_for_interviewer(&interviewer().uid, Some("cancelled"))
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);

    assert!(matches!(
        service
            .list_for_interviewer(&interviewer().uid, Some("paused"))
            .await,
        Err(ApiError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_cancel_rules() {
    let h = Harness::new().await;
    let service = InterviewsService::new(&h.state);
    let (id, _) = schedule(&h).await;

    assert!(matches!(
        service.cancel_interview(&candidate(), &id).await,
        Err(ApiError::Forbidden(_))
    ));
    assert!(matches!(
        service.cancel_interview(&interviewer(), "I_MISSING0").await,
        Err(ApiError::NotFound(_))
    ));

    let cancelled = service.cancel_interview(&interviewer(), &id).await.unwrap();
    assert_eq!(cancelled.status, "cancelled");
    assert_eq!(cancelled.cancelled_by.as_deref(), Some("U_IVAN0001"));

    assert!(matches!(
        service.cancel_interview(&interviewer(), &id).await,
        Err(ApiError::BadRequest(_))
    ));
    assert_eq!(h.mailer.count_with_subject(CANDIDATE_EMAIL, "Cancelled"), 1);
}

#[tokio::test]
async fn test_public_lookup_hides_interviewer() {
    let h = Harness::new().await;
    let service = InterviewsService::new(&h.state);
    let start = h.clock.now() + Duration::hours(5);
    let created = service
        .create_interview(&interviewer(), request_at(start))
        .await
        .unwrap();

    let public = service
        .find_public(&created.session_id.to_lowercase())
        .await
        .unwrap();
    let body = serde_json::to_value(&public).unwrap();
    assert_eq!(body["session_id"], created.session_id);
    assert!(body.get("interviewer_id").is_none());
    assert!(body.get("candidate_email").is_none());

    service
        .cancel_interview(&interviewer(), &created.interview_id)
        .await
        .unwrap();
    assert!(matches!(
        service.find_public(&created.session_id).await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_access_endpoint_status_codes() {
    let h = Harness::new().await;
    let owner = h
        .create_account(
            INTERVIEWER_EMAIL,
            CustomClaims {
                role: Role::Interviewer,
                ..CustomClaims::default()
            },
        )
        .await;
    let outsider = h.create_account("otto@elsewhere.io", CustomClaims::default()).await;

    let start = h.clock.now() + Duration::hours(2);
    let owner_identity = identity(&owner.uid, INTERVIEWER_EMAIL, Role::Interviewer);
    let created = InterviewsService::new(&h.state)
        .create_interview(&owner_identity, request_at(start))
        .await
        .unwrap();
    let uri = format!("/api/interviews/{}/access", created.interview_id);
    let app = crate::build_router(h.state.clone());

    let response = app
        .clone()
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Too early for everyone
    let token = h.id_token(&owner.uid).await;
    let response = app
        .clone()
        .oneshot(
            Request::get(&uri)
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    h.clock.set(start);
    let token = h.id_token(&outsider.uid).await;
    let response = app
        .clone()
        .oneshot(
            Request::get(&uri)
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = h.id_token(&owner.uid).await;
    let response = app
        .clone()
        .oneshot(
            Request::get(&uri)
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::get("/api/interviews/I_MISSING0/access")
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
