use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Scheduled,
    Invited,
    InProgress,
    Completed,
    Cancelled,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::Invited => "invited",
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "scheduled" => Some(InterviewStatus::Scheduled),
            "invited" => Some(InterviewStatus::Invited),
            "in_progress" => Some(InterviewStatus::InProgress),
            "completed" => Some(InterviewStatus::Completed),
            "cancelled" => Some(InterviewStatus::Cancelled),
            _ => None,
        }
    }

    /// Participants may enter (and the owner may cancel) only before it starts
    pub fn is_open(&self) -> bool {
        matches!(self, InterviewStatus::Scheduled | InterviewStatus::Invited)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Interviewer,
    Candidate,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Interviewer => "interviewer",
            AccessType::Candidate => "candidate",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Interview {
    pub id: String,
    pub session_code: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub candidate_id: Option<String>,
    pub interviewer_id: String,
    pub interviewer_email: String,
    pub interview_type: String,
    pub level: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: String,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interview {
    pub fn status(&self) -> Option<InterviewStatus> {
        InterviewStatus::parse(&self.status)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInterviewRequest {
    pub candidate_name: String,
    pub candidate_email: String,
    /// RFC 3339
    pub date: String,
    pub duration_minutes: Option<i64>,
    pub interview_type: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateInterviewResponse {
    pub interview_id: String,
    pub session_id: String,
    pub status: InterviewStatus,
}

/// Interview as shown to anyone holding the session id
#[derive(Debug, Serialize)]
pub struct PublicInterview {
    pub session_id: String,
    pub candidate_name: String,
    pub interview_type: String,
    pub level: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: String,
}

impl From<Interview> for PublicInterview {
    fn from(i: Interview) -> Self {
        Self {
            session_id: i.session_code,
            candidate_name: i.candidate_name,
            interview_type: i.interview_type,
            level: i.level,
            date: i.date,
            duration_minutes: i.duration_minutes,
            status: i.status,
        }
    }
}

/// Successful access decision
#[derive(Debug, Clone, Serialize)]
pub struct InterviewAccess {
    pub access_type: AccessType,
    pub interview: Interview,
}
