//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tracing::debug;

use super::admin::AdminGrant;
use super::models::Identity;
use crate::common::{safe_email_log, ApiError, AppState};

pub(crate) async fn app_state<S: Send + Sync>(
    parts: &mut Parts,
    state: &S,
) -> Result<Arc<AppState>, ApiError> {
    let Extension(app_state): Extension<Arc<AppState>> =
        Extension::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;
    Ok(app_state)
}

/// Caller with a verified bearer token
///
/// Rejects with 401 on a missing header, a header without the `Bearer `
/// prefix, or a token the provider refuses.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = app_state(parts, state).await?;

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let identity = app_state.verifier.verify_header(header).await?;

        debug!(
            uid = %identity.uid,
            email = %safe_email_log(&identity.email),
            role = %identity.role(),
            "Caller authenticated"
        );

        Ok(AuthedUser(identity))
    }
}

/// Caller that passed the three-tier admin gate
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub identity: Identity,
    pub grant: AdminGrant,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthedUser(identity) = AuthedUser::from_request_parts(parts, state).await?;
        let app_state = app_state(parts, state).await?;

        let grant = app_state.resolver.require_admin(&identity).await?;

        Ok(AdminUser { identity, grant })
    }
}
