//! Session handlers

use axum::extract::{Extension, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::extractors::{SessionTokenHeader, SessionUser};
use super::models::{SessionAnalytics, SessionHandle, SweepReport};
use crate::auth::{AdminUser, AuthedUser};
use crate::common::{ApiError, AppState};

/// GET /api/sessions
/// Lists the caller's active sessions (tokens are never returned)
pub async fn list_sessions(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions = state.sessions.list_active(&identity.uid).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

/// POST /api/sessions/refresh
/// Exchanges the `X-Session-Token` for a new one
pub async fn refresh_session(
    Extension(state): Extension<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<SessionHandle>, ApiError> {
    let handle = state.sessions.refresh(&session.token).await?;
    Ok(Json(handle))
}

/// POST /api/sessions/logout
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    SessionTokenHeader(token): SessionTokenHeader,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.sessions.logout(&token).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

/// POST /api/sessions/logout-all
pub async fn logout_all(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let terminated = state.sessions.terminate_all(&identity.uid).await?;
    info!(uid = %identity.uid, terminated = terminated, "User ended all sessions");
    Ok(Json(json!({ "terminated": terminated })))
}

/// GET /api/admin/sessions/analytics
pub async fn session_analytics(
    Extension(state): Extension<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<SessionAnalytics>, ApiError> {
    Ok(Json(state.sessions.analytics().await?))
}

/// POST /api/admin/sessions/sweep
/// Runs one expiry sweep immediately
pub async fn sweep_sessions(
    Extension(state): Extension<Arc<AppState>>,
    admin: AdminUser,
) -> Result<Json<SweepReport>, ApiError> {
    let report = state.sessions.sweep_expired().await?;
    info!(admin = %admin.grant.uid, sessions = report.sessions, "Manual session sweep");
    Ok(Json(report))
}
