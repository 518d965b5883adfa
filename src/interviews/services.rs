use chrono::{DateTime, Duration, DurationRound, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{
    CreateInterviewRequest, CreateInterviewResponse, Interview, InterviewStatus, PublicInterview,
};
use super::validators::{DEFAULT_DURATION_MINUTES, DEFAULT_INTERVIEW_TYPE, DEFAULT_LEVEL};
use crate::auth::models::Identity;
use crate::common::helpers::parse_timestamp;
use crate::common::{
    generate_interview_id, generate_session_code, safe_email_log, ApiError, AppState, Clock,
    Validator,
};
use crate::services::email::InterviewSummary;
use crate::services::Notifier;

/// Session code collisions are retried this many times before giving up
const SESSION_CODE_ATTEMPTS: usize = 3;

pub struct InterviewsService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
}

fn summary(interview: &Interview) -> InterviewSummary<'_> {
    InterviewSummary {
        candidate_name: &interview.candidate_name,
        interview_type: &interview.interview_type,
        level: &interview.level,
        date: &interview.date,
        duration_minutes: interview.duration_minutes,
    }
}

impl InterviewsService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            clock: state.clock.clone(),
            notifier: state.notifier.clone(),
        }
    }

    pub async fn get_interview(&self, interview_id: &str) -> Result<Interview, ApiError> {
        sqlx::query_as::<_, Interview>("SELECT * FROM interviews WHERE id = ?")
            .bind(interview_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Interview not found".to_string()))
    }

    /// Schedule an interview owned by the caller and invite the candidate
    pub async fn create_interview(
        &self,
        identity: &Identity,
        request: CreateInterviewRequest,
    ) -> Result<CreateInterviewResponse, ApiError> {
        if !identity.role().can_schedule_interviews() {
            return Err(ApiError::Forbidden(
                "Only interviewers can schedule interviews".to_string(),
            ));
        }

        let validation_result = request.validate(&request);
        if !validation_result.is_valid {
            return Err(ApiError::from(validation_result));
        }

        let date = parse_timestamp(&request.date)
            .ok_or_else(|| ApiError::ValidationError("date: Valid date is required".to_string()))?;
        let date = date.duration_trunc(Duration::seconds(1)).unwrap_or(date);
        let now = self.clock.now();
        if date <= now {
            return Err(ApiError::BadRequest(
                "Interview must be scheduled in the future".to_string(),
            ));
        }

        let interview = self.insert(identity, &request, date, now).await?;

        info!(
            interview_id = %interview.id,
            interviewer = %identity.uid,
            candidate = %safe_email_log(&interview.candidate_email),
            "Interview scheduled"
        );

        self.notifier
            .send_interview_invite(
                &interview.candidate_email,
                &summary(&interview),
                &interview.session_code,
            )
            .await;

        Ok(CreateInterviewResponse {
            interview_id: interview.id,
            session_id: interview.session_code,
            status: InterviewStatus::Scheduled,
        })
    }

    async fn insert(
        &self,
        identity: &Identity,
        request: &CreateInterviewRequest,
        date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Interview, ApiError> {
        let candidate_email = request.candidate_email.trim().to_lowercase();
        let interview_type = request
            .interview_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_INTERVIEW_TYPE);
        let level = request
            .level
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(DEFAULT_LEVEL);
        let duration = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);

        for _ in 0..SESSION_CODE_ATTEMPTS {
            let interview_id = generate_interview_id();
            let session_code = generate_session_code();

            let result = sqlx::query(
                r#"
                INSERT INTO interviews (
                    id, session_code, candidate_name, candidate_email, interviewer_id,
                    interviewer_email, interview_type, level, date, duration_minutes,
                    status, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&interview_id)
            .bind(&session_code)
            .bind(request.candidate_name.trim())
            .bind(&candidate_email)
            .bind(&identity.uid)
            .bind(&identity.email)
            .bind(interview_type)
            .bind(level)
            .bind(date)
            .bind(duration)
            .bind(InterviewStatus::Scheduled.as_str())
            .bind(now)
            .bind(now)
            .execute(&self.db)
            .await;

            match result {
                Ok(_) => return self.get_interview(&interview_id).await,
                Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
                    warn!(session_code = %session_code, "Session code collision, regenerating");
                }
                Err(e) => return Err(ApiError::DatabaseError(e)),
            }
        }

        Err(ApiError::InternalServer(
            "Failed to allocate a session id".to_string(),
        ))
    }

    /// Interviews owned by `interviewer_id`, latest date first
    pub async fn list_for_interviewer(
        &self,
        interviewer_id: &str,
        status: Option<&str>,
    ) -> Result<Vec<Interview>, ApiError> {
        let filter = match status {
            None | Some("all") | Some("") => None,
            Some(raw) => Some(InterviewStatus::parse(raw).ok_or_else(|| {
                ApiError::BadRequest(format!("Unknown interview status '{}'", raw))
            })?),
        };

        let interviews = match filter {
            Some(status) => {
                sqlx::query_as::<_, Interview>(
                    "SELECT * FROM interviews WHERE interviewer_id = ? AND status = ? ORDER BY date DESC",
                )
                .bind(interviewer_id)
                .bind(status.as_str())
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Interview>(
                    "SELECT * FROM interviews WHERE interviewer_id = ? ORDER BY date DESC",
                )
                .bind(interviewer_id)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(interviews)
    }

    /// Cancel an interview that has not started yet. Owner only.
    pub async fn cancel_interview(
        &self,
        identity: &Identity,
        interview_id: &str,
    ) -> Result<Interview, ApiError> {
        let interview = self.get_interview(interview_id).await?;

        if interview.interviewer_id != identity.uid {
            warn!(interview_id = %interview_id, uid = %identity.uid, "Cancel attempt by non-owner");
            return Err(ApiError::Forbidden(
                "Not authorized to cancel this interview".to_string(),
            ));
        }

        let now = self.clock.now();
        let result = sqlx::query(
            r#"
            UPDATE interviews
            SET status = 'cancelled', cancelled_at = ?, cancelled_by = ?, updated_at = ?
            WHERE id = ? AND status IN ('scheduled', 'invited')
            "#,
        )
        .bind(now)
        .bind(&identity.uid)
        .bind(now)
        .bind(interview_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::BadRequest(format!(
                "Interview cannot be cancelled (status: {})",
                interview.status
            )));
        }

        info!(interview_id = %interview_id, cancelled_by = %identity.uid, "Interview cancelled");

        let cancelled = self.get_interview(interview_id).await?;
        self.notifier
            .send_interview_cancelled(&cancelled.candidate_email, &summary(&cancelled))
            .await;

        Ok(cancelled)
    }

    /// Lookup by the shareable session id; only interviews that have not started are visible
    pub async fn find_public(&self, session_code: &str) -> Result<PublicInterview, ApiError> {
        let interview = sqlx::query_as::<_, Interview>(
            "SELECT * FROM interviews WHERE session_code = ? AND status IN ('scheduled', 'invited')",
        )
        .bind(session_code.trim().to_uppercase())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Interview not found".to_string()))?;

        Ok(PublicInterview::from(interview))
    }
}
