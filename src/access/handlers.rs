use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::models::{
    ListAccessRequestsQuery, RegisterRequest, RejectAccessRequest, SubmitAccessRequest,
    SubmitAccessResponse,
};
use super::services::AccessRequestService;
use crate::auth::AdminUser;
use crate::common::{ApiError, AppState};

/// POST /api/access/request - Public access request submission
pub async fn submit_request(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SubmitAccessRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AccessRequestService::new(&state);
    let created = service.submit(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitAccessResponse {
            message: "Access request submitted successfully".to_string(),
            request_id: created.id,
        }),
    ))
}

/// GET /api/access/requests?status=pending
pub async fn list_requests(
    Extension(state): Extension<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<ListAccessRequestsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AccessRequestService::new(&state);
    let requests = service.list(query.status.as_deref()).await?;
    Ok(Json(json!({ "requests": requests })))
}

/// POST /api/access/requests/:id/approve
pub async fn approve_request(
    Extension(state): Extension<Arc<AppState>>,
    admin: AdminUser,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AccessRequestService::new(&state);
    let request = service.approve(&request_id, &admin.identity.uid).await?;
    Ok(Json(json!({
        "message": "Access request approved successfully",
        "request": request,
    })))
}

/// POST /api/access/requests/:id/reject
pub async fn reject_request(
    Extension(state): Extension<Arc<AppState>>,
    admin: AdminUser,
    Path(request_id): Path<String>,
    body: Option<Json<RejectAccessRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let service = AccessRequestService::new(&state);
    let request = service
        .reject(&request_id, &admin.identity.uid, body.reason.as_deref())
        .await?;
    Ok(Json(json!({
        "message": "Access request rejected successfully",
        "request": request,
    })))
}

/// GET /api/access/register/:token - Check an invitation before showing the form
pub async fn preview_registration(
    Extension(state): Extension<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AccessRequestService::new(&state);
    Ok(Json(service.preview_registration(&token).await?))
}

/// POST /api/access/register - Consume an invitation and create the account
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AccessRequestService::new(&state);
    let account = service.register(request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}
