use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::models::CreateInterviewRequest;
use super::services::InterviewsService;
use crate::auth::AuthedUser;
use crate::common::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListInterviewsQuery {
    pub status: Option<String>,
}

/// POST /api/interviews - Schedule an interview
pub async fn create_interview(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
    Json(request): Json<CreateInterviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = InterviewsService::new(&state);
    let created = service.create_interview(&identity, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/interviews - Interviews owned by the caller
pub async fn list_interviews(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
    Query(query): Query<ListInterviewsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = InterviewsService::new(&state);
    let interviews = service
        .list_for_interviewer(&identity.uid, query.status.as_deref())
        .await?;
    Ok(Json(interviews))
}

/// GET /api/interviews/:id/access - Enter the interview room
pub async fn access_interview(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
    Path(interview_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let access = state.interview_gate.authorize(&identity, &interview_id).await?;
    Ok(Json(access))
}

/// POST /api/interviews/:id/cancel
pub async fn cancel_interview(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
    Path(interview_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = InterviewsService::new(&state);
    let interview = service.cancel_interview(&identity, &interview_id).await?;
    Ok(Json(json!({
        "message": "Interview cancelled successfully",
        "interview": interview,
    })))
}

/// GET /api/public/interviews/:session_id
pub async fn get_public_interview(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = InterviewsService::new(&state);
    Ok(Json(service.find_public(&session_id).await?))
}
