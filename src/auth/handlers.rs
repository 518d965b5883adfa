//! Authentication, profile and role management handlers

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::extractors::{AdminUser, AuthedUser};
use super::models::{
    Identity, LoginRequest, ProfileResponse, ProviderUser, Role, UpdateProfileRequest,
    UpdateRoleRequest, UserProfile,
};
use super::profiles;
use crate::common::{safe_email_log, ApiError, AppState};
use crate::sessions::DeviceMetadata;

const MAX_DISPLAY_NAME_LEN: usize = 100;

fn profile_response(identity: &Identity, profile: Option<UserProfile>, is_admin: bool) -> ProfileResponse {
    match profile {
        Some(profile) => ProfileResponse {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            email_verified: identity.email_verified,
            display_name: profile.display_name.clone(),
            role: identity.role(),
            is_admin,
            capabilities: profile.capability_list(),
            last_login_at: profile.last_login_at,
            created_at: Some(profile.created_at),
        },
        None => ProfileResponse {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            email_verified: identity.email_verified,
            display_name: None,
            role: identity.role(),
            is_admin,
            capabilities: Vec::new(),
            last_login_at: None,
            created_at: None,
        },
    }
}

/// POST /api/auth/login
/// Password sign-in. Returns an ID token and opens a tracked session.
///
/// # Response
/// ```json
/// {
///   "id_token": "...",
///   "expires_at": "...",
///   "session": { "session_id": "...", "session_token": "...", "expires_at": "..." },
///   "user": { ... }
/// }
/// ```
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let sign_in = state
        .provider
        .sign_in_with_password(&email, &request.password)
        .await?;

    let device = DeviceMetadata::from_headers(&headers, request.location, request.device);
    let session = state
        .sessions
        .login(&sign_in.user.uid, &sign_in.user.email, device)
        .await?;

    info!(
        uid = %sign_in.user.uid,
        email = %safe_email_log(&email),
        session_id = %session.session_id,
        "User signed in"
    );

    Ok(Json(json!({
        "id_token": sign_in.id_token,
        "expires_at": sign_in.expires_at,
        "session": session,
        "user": sign_in.user,
    })))
}

/// GET /api/auth/me
pub async fn me(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = profiles::find_profile(&state.db, &identity.uid).await?;
    let is_admin = state.resolver.is_admin(&identity.uid).await;
    Ok(Json(profile_response(&identity, profile, is_admin)))
}

/// PUT /api/auth/me
/// Profile edits require a verified email address
pub async fn update_me(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    if !identity.email_verified {
        return Err(ApiError::Forbidden(
            "Email verification required".to_string(),
        ));
    }

    let display_name = request
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if display_name.map(|n| n.chars().count() > MAX_DISPLAY_NAME_LEN).unwrap_or(false) {
        return Err(ApiError::ValidationError(
            "display_name: Display name must not exceed 100 characters".to_string(),
        ));
    }

    let now = state.clock.now();
    let updated = profiles::update_display_name(&state.db, &identity.uid, display_name, now).await?;
    if updated == 0 {
        profiles::create_profile(
            &state.db,
            &identity.uid,
            &identity.email,
            display_name,
            identity.role(),
            now,
        )
        .await?;
    }

    let profile = profiles::find_profile(&state.db, &identity.uid).await?;
    let is_admin = state.resolver.is_admin(&identity.uid).await;
    Ok(Json(profile_response(&identity, profile, is_admin)))
}

/// GET /api/auth/users/:id
pub async fn get_user(
    Extension(state): Extension<Arc<AppState>>,
    _admin: AdminUser,
    Path(uid): Path<String>,
) -> Result<Json<ProviderUser>, ApiError> {
    let user = state.provider.get_user(&uid).await?;
    Ok(Json(user))
}

/// PUT /api/auth/users/:id/role
/// Needs the `manage_users` capability and a sign-in within the recency window
pub async fn set_role(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(identity): AuthedUser,
    Path(uid): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let grant = state
        .resolver
        .require_admin_capabilities(&identity, &["manage_users"])
        .await?;
    state
        .verifier
        .require_recent_login(&identity, state.config.recent_login_max_age())?;

    let role: Role = request
        .role
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid role specified".to_string()))?;

    let user = state.resolver.set_role(&uid, role).await?;

    info!(admin = %grant.uid, target = %uid, role = %role, "Role changed by admin");

    Ok(Json(json!({
        "message": "Role updated successfully",
        "user": user,
    })))
}

/// GET /api/admin/check
pub async fn admin_check(admin: AdminUser) -> Json<serde_json::Value> {
    Json(json!({
        "is_admin": true,
        "grant": admin.grant,
    }))
}
