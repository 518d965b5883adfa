use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use super::models::ActiveSession;
use crate::auth::extractors::app_state;
use crate::common::ApiError;

pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

fn header_token(parts: &Parts) -> Result<String, ApiError> {
    parts
        .headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("missing session token".into()))
}

/// Raw `X-Session-Token` value, not validated
#[derive(Debug, Clone)]
pub struct SessionTokenHeader(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SessionTokenHeader
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionTokenHeader(header_token(parts)?))
    }
}

/// Caller holding a live session. Runs the activity check, which may send
/// an inactivity warning and lazily expires overdue sessions.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub token: String,
    pub session: ActiveSession,
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = header_token(parts)?;
        let app_state = app_state(parts, state).await?;

        let session = app_state.sessions.check_activity(&token).await?;

        Ok(SessionUser { token, session })
    }
}
