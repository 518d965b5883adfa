use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::models::{
    AccessRequest, AccessRequestStatus, RegisterRequest, RegisteredAccount, RegistrationPreview,
    SubmitAccessRequest,
};
use super::validators::MIN_PASSWORD_LENGTH;
use crate::auth::errors::ProviderError;
use crate::auth::models::{CustomClaims, NewAccount, Role};
use crate::auth::{profiles, IdentityProvider};
use crate::common::helpers::safe_token_log;
use crate::common::{
    generate_access_request_id, generate_user_id, safe_email_log, ApiError, AppState, Clock,
    ValidationResult, Validator,
};
use crate::services::email::AccessRequestSummary;
use crate::services::Notifier;
use crate::tokens::{RegistrationToken, RegistrationTokenError, RegistrationTokenStore};

pub const DEFAULT_REJECTION_REASON: &str = "No specific reason provided";

#[derive(Debug, Error)]
pub enum AccessRequestError {
    #[error("{0}")]
    Invalid(String),

    #[error("Access request not found")]
    NotFound,

    #[error("Request has already been processed")]
    AlreadyProcessed,

    #[error("A request from this email is already pending")]
    DuplicatePending,

    #[error("Email does not match the invitation")]
    EmailMismatch,

    #[error("Password must be at least 8 characters")]
    WeakPassword,

    #[error("An account with this email already exists")]
    AccountExists,

    #[error(transparent)]
    Token(#[from] RegistrationTokenError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ValidationResult> for AccessRequestError {
    fn from(result: ValidationResult) -> Self {
        AccessRequestError::Invalid(result.error_message())
    }
}

impl From<AccessRequestError> for ApiError {
    fn from(e: AccessRequestError) -> Self {
        match e {
            AccessRequestError::Invalid(msg) => ApiError::ValidationError(msg),
            AccessRequestError::NotFound => ApiError::NotFound(e.to_string()),
            AccessRequestError::AlreadyProcessed
            | AccessRequestError::DuplicatePending
            | AccessRequestError::EmailMismatch
            | AccessRequestError::WeakPassword
            | AccessRequestError::AccountExists => ApiError::BadRequest(e.to_string()),
            AccessRequestError::Token(inner) => inner.into(),
            AccessRequestError::Provider(inner) => inner.into(),
            AccessRequestError::Database(db) => ApiError::DatabaseError(db),
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

/// Access request workflow: submit, review, and the registration that consumes the token
pub struct AccessRequestService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    provider: Arc<dyn IdentityProvider>,
    registration_tokens: RegistrationTokenStore,
    notifier: Notifier,
}

impl AccessRequestService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            clock: state.clock.clone(),
            provider: state.provider.clone(),
            registration_tokens: state.registration_tokens.clone(),
            notifier: state.notifier.clone(),
        }
    }

    pub async fn get_request(&self, request_id: &str) -> Result<AccessRequest, AccessRequestError> {
        sqlx::query_as::<_, AccessRequest>("SELECT * FROM access_requests WHERE id = ?")
            .bind(request_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AccessRequestError::NotFound)
    }

    /// Record a pending request and let the admin know
    pub async fn submit(&self, request: SubmitAccessRequest) -> Result<AccessRequest, AccessRequestError> {
        let validation_result = request.validate(&request);
        if !validation_result.is_valid {
            return Err(validation_result.into());
        }

        let email = request.email.trim().to_lowercase();
        let work_domain = request.work_domain.as_deref().unwrap_or_default().trim();
        let now = self.clock.now();
        let request_id = generate_access_request_id();

        sqlx::query(
            r#"
            INSERT INTO access_requests (
                id, email, work_domain, team_size, message, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(&request_id)
        .bind(&email)
        .bind(work_domain)
        .bind(request.team_size.as_deref())
        .bind(request.message.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AccessRequestError::DuplicatePending
            } else {
                AccessRequestError::Database(e)
            }
        })?;

        info!(request_id = %request_id, email = %safe_email_log(&email), "Access request submitted");

        self.notifier
            .send_access_request(&AccessRequestSummary {
                id: &request_id,
                email: &email,
                work_domain,
                team_size: request.team_size.as_deref(),
            })
            .await;

        self.get_request(&request_id).await
    }

    /// Requests with `status` (pending when omitted), newest first
    pub async fn list(&self, status: Option<&str>) -> Result<Vec<AccessRequest>, AccessRequestError> {
        let status = match status {
            None => AccessRequestStatus::Pending,
            Some(raw) => AccessRequestStatus::parse(raw).ok_or_else(|| {
                AccessRequestError::Invalid(format!("status: unknown status '{}'", raw))
            })?,
        };

        let requests = sqlx::query_as::<_, AccessRequest>(
            "SELECT * FROM access_requests WHERE status = ? ORDER BY created_at DESC",
        )
        .bind(status.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(requests)
    }

    /// Approve a pending request and send the requester a registration link
    pub async fn approve(&self, request_id: &str, reviewer: &str) -> Result<AccessRequest, AccessRequestError> {
        let pending = self.get_request(request_id).await?;
        if pending.status() != Some(AccessRequestStatus::Pending) {
            return Err(AccessRequestError::AlreadyProcessed);
        }

        // A token issued here but never bound just expires and is swept
        let token = self.registration_tokens.issue(&pending.email).await?;
        let now = self.clock.now();

        let result = sqlx::query(
            r#"
            UPDATE access_requests
            SET status = 'approved', registration_token = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(&token.id)
        .bind(reviewer)
        .bind(now)
        .bind(now)
        .bind(request_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            warn!(request_id = %request_id, "Access request changed state during approval");
            return Err(AccessRequestError::AlreadyProcessed);
        }

        info!(
            request_id = %request_id,
            reviewer = %reviewer,
            email = %safe_email_log(&pending.email),
            "Access request approved"
        );

        // The link carries whatever token the row ended up bound to
        let approved = self.get_request(request_id).await?;
        if let Some(bound) = approved.registration_token.as_deref() {
            self.notifier
                .send_access_approved(&approved.email, &approved.work_domain, bound, &token.expires_at)
                .await;
        }

        Ok(approved)
    }

    pub async fn reject(
        &self,
        request_id: &str,
        reviewer: &str,
        reason: Option<&str>,
    ) -> Result<AccessRequest, AccessRequestError> {
        let pending = self.get_request(request_id).await?;
        if pending.status() != Some(AccessRequestStatus::Pending) {
            return Err(AccessRequestError::AlreadyProcessed);
        }

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REJECTION_REASON);
        let now = self.clock.now();

        let result = sqlx::query(
            r#"
            UPDATE access_requests
            SET status = 'rejected', rejection_reason = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(reason)
        .bind(reviewer)
        .bind(now)
        .bind(now)
        .bind(request_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccessRequestError::AlreadyProcessed);
        }

        info!(request_id = %request_id, reviewer = %reviewer, "Access request rejected");

        self.notifier
            .send_access_rejected(&pending.email, &pending.work_domain, reason)
            .await;

        self.get_request(request_id).await
    }

    /// Usable token or the reason it is not. Every rejection of a token that
    /// exists counts as a failed attempt against it.
    async fn usable_token(&self, token: &str) -> Result<RegistrationToken, AccessRequestError> {
        match self.registration_tokens.check_usable(token).await {
            Ok(found) => Ok(found),
            Err(e @ (RegistrationTokenError::NotFound | RegistrationTokenError::Database(_))) => {
                Err(e.into())
            }
            Err(e) => {
                self.record_attempt(token).await;
                Err(e.into())
            }
        }
    }

    async fn record_attempt(&self, token: &str) {
        if let Err(e) = self.registration_tokens.record_failed_attempt(token).await {
            error!(token = %safe_token_log(token), error = %e, "Failed to record registration attempt");
        }
    }

    /// Check a registration token without consuming it
    pub async fn preview_registration(&self, token: &str) -> Result<RegistrationPreview, AccessRequestError> {
        let token = self.usable_token(token).await?;
        Ok(RegistrationPreview {
            email: token.email,
            expires_at: token.expires_at,
        })
    }

    /// Consume a registration token and create the interviewer account it invites
    pub async fn register(&self, request: RegisterRequest) -> Result<RegisteredAccount, AccessRequestError> {
        let token = self.usable_token(&request.token).await?;

        let email = request.email.trim().to_lowercase();
        if email != token.email {
            warn!(
                token = %safe_token_log(&request.token),
                email = %safe_email_log(&email),
                "Registration email does not match token"
            );
            self.record_attempt(&token.id).await;
            return Err(AccessRequestError::EmailMismatch);
        }

        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AccessRequestError::WeakPassword);
        }

        match self.provider.get_user_by_email(&email).await {
            Ok(_) => return Err(AccessRequestError::AccountExists),
            Err(ProviderError::UserNotFound) => {}
            Err(e) => return Err(e.into()),
        }

        // Consumed before the account exists; a losing racer stops here
        let uid = generate_user_id();
        self.registration_tokens.mark_used(&token.id, &uid).await?;

        let display_name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let now = self.clock.now();
        let account = self
            .provider
            .create_user(NewAccount {
                uid: Some(uid.clone()),
                email: email.clone(),
                password: request.password,
                display_name: display_name.map(String::from),
                email_verified: true,
                claims: CustomClaims::default().with_role(Role::Interviewer, now),
            })
            .await
            .map_err(|e| {
                error!(uid = %uid, email = %safe_email_log(&email), error = %e, "Account creation failed after token was consumed");
                e
            })?;

        if let Err(e) =
            profiles::create_profile(&self.db, &account.uid, &email, display_name, Role::Interviewer, now).await
        {
            error!(uid = %account.uid, error = %e, "Failed to create profile for new account");
        }

        info!(uid = %account.uid, email = %safe_email_log(&email), "Interviewer account registered");

        Ok(RegisteredAccount {
            uid: account.uid,
            email: account.email,
            role: Role::Interviewer.as_str().to_string(),
        })
    }
}
