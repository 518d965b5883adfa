use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccessRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRequestStatus::Pending => "pending",
            AccessRequestStatus::Approved => "approved",
            AccessRequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Some(AccessRequestStatus::Pending),
            "approved" => Some(AccessRequestStatus::Approved),
            "rejected" => Some(AccessRequestStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessRequest {
    pub id: String,
    pub email: String,
    pub work_domain: String,
    pub team_size: Option<String>,
    pub message: Option<String>,
    pub status: String,
    /// Bound once on approval; never sent back over HTTP
    #[serde(skip_serializing)]
    pub registration_token: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessRequest {
    pub fn status(&self) -> Option<AccessRequestStatus> {
        AccessRequestStatus::parse(&self.status)
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitAccessRequest {
    pub email: String,
    pub work_domain: Option<String>,
    pub team_size: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAccessResponse {
    pub message: String,
    pub request_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAccessRequestsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectAccessRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub token: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// What the registration page needs to render before the form is sent
#[derive(Debug, Serialize)]
pub struct RegistrationPreview {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RegisteredAccount {
    pub uid: String,
    pub email: String,
    pub role: String,
}
