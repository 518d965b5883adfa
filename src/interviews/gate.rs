//! Interview access gate
//!
//! Decides whether a verified identity may enter an interview right now and
//! in which capacity. Checks run in a fixed order: existence, status, time
//! window, participant.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::models::{AccessType, Interview, InterviewAccess};
use crate::auth::models::Identity;
use crate::common::{generate_access_log_id, ApiError, Clock};

#[derive(Debug, Error)]
pub enum AccessGateError {
    #[error("Interview not found")]
    NotFound,

    #[error("Interview is not active (status: {0})")]
    InvalidState(String),

    #[error("Interview is not currently accessible")]
    OutOfWindow,

    #[error("You are not authorized to access this interview")]
    Forbidden,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AccessGateError> for ApiError {
    fn from(e: AccessGateError) -> Self {
        match e {
            AccessGateError::NotFound => ApiError::NotFound(e.to_string()),
            AccessGateError::InvalidState(_) => ApiError::BadRequest(e.to_string()),
            AccessGateError::OutOfWindow | AccessGateError::Forbidden => {
                ApiError::Forbidden(e.to_string())
            }
            AccessGateError::Database(db) => ApiError::DatabaseError(db),
        }
    }
}

/// True when `now` lies in `[scheduled - early, scheduled + late]`, both ends inclusive
pub fn within_window(scheduled: DateTime<Utc>, now: DateTime<Utc>, early: Duration, late: Duration) -> bool {
    let delta = scheduled - now;
    delta >= -late && delta <= early
}

#[derive(Clone)]
pub struct InterviewAccessGate {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    early: Duration,
    late: Duration,
}

impl InterviewAccessGate {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>, early_minutes: i64, late_minutes: i64) -> Self {
        Self {
            db,
            clock,
            early: Duration::minutes(early_minutes),
            late: Duration::minutes(late_minutes),
        }
    }

    pub async fn authorize(
        &self,
        identity: &Identity,
        interview_id: &str,
    ) -> Result<InterviewAccess, AccessGateError> {
        let interview = sqlx::query_as::<_, Interview>("SELECT * FROM interviews WHERE id = ?")
            .bind(interview_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| {
                warn!(interview_id = %interview_id, "Interview not found");
                AccessGateError::NotFound
            })?;

        if !interview.status().map(|s| s.is_open()).unwrap_or(false) {
            warn!(interview_id = %interview_id, status = %interview.status, "Invalid interview status");
            return Err(AccessGateError::InvalidState(interview.status.clone()));
        }

        let now = self.clock.now();
        if !within_window(interview.date, now, self.early, self.late) {
            warn!(
                interview_id = %interview_id,
                scheduled = %interview.date,
                "Interview time window closed"
            );
            return Err(AccessGateError::OutOfWindow);
        }

        let access_type = if interview.interviewer_id == identity.uid {
            AccessType::Interviewer
        } else if interview.candidate_email.eq_ignore_ascii_case(&identity.email) {
            AccessType::Candidate
        } else {
            warn!(interview_id = %interview_id, uid = %identity.uid, "Unauthorized interview access attempt");
            return Err(AccessGateError::Forbidden);
        };

        self.log_access(&interview.id, identity, access_type, now).await;

        debug!(interview_id = %interview_id, uid = %identity.uid, access = access_type.as_str(), "Interview access granted");
        Ok(InterviewAccess {
            access_type,
            interview,
        })
    }

    /// Append the audit record; failures are logged only
    async fn log_access(&self, interview_id: &str, identity: &Identity, access_type: AccessType, now: DateTime<Utc>) {
        let result = sqlx::query(
            r#"
            INSERT INTO interview_access_logs (id, interview_id, user_id, user_email, access_type, accessed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(generate_access_log_id())
        .bind(interview_id)
        .bind(&identity.uid)
        .bind(&identity.email)
        .bind(access_type.as_str())
        .bind(now)
        .execute(&self.db)
        .await;

        if let Err(e) = result {
            error!(interview_id = %interview_id, error = %e, "Failed to write interview access log");
        }
    }
}
