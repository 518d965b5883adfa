//! Authentication and authorization error types

use thiserror::Error;

use crate::common::ApiError;

/// Errors raised by the identity provider collaborator
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("user not found")]
    UserNotFound,

    #[error("email already registered")]
    EmailExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("account disabled")]
    Disabled,

    #[error("provider backend error: {0}")]
    Backend(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome taxonomy of the request gates
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed, forged or expired credential. Deliberately carries no detail.
    #[error("authentication required")]
    Unauthenticated,

    #[error("recent login required")]
    RecentLoginRequired,

    #[error("{0}")]
    Forbidden(String),

    #[error("user not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ProviderError> for AuthError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::UserNotFound => AuthError::NotFound,
            ProviderError::InvalidToken(_)
            | ProviderError::InvalidCredentials
            | ProviderError::Disabled => AuthError::Unauthenticated,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated => ApiError::Unauthorized("authentication required".into()),
            AuthError::RecentLoginRequired => {
                ApiError::Unauthorized("recent login required, please sign in again".into())
            }
            AuthError::Forbidden(msg) => ApiError::Forbidden(msg),
            AuthError::NotFound => ApiError::NotFound("User not found".into()),
            AuthError::Internal(detail) => {
                tracing::error!(error = %detail, "Authorization check failed");
                ApiError::InternalServer("Failed to verify privileges".into())
            }
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::EmailExists => {
                ApiError::BadRequest("An account with this email already exists".into())
            }
            ProviderError::InvalidCredentials | ProviderError::Disabled => {
                ApiError::Unauthorized("invalid email or password".into())
            }
            other => AuthError::from(other).into(),
        }
    }
}
