use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Session lifecycle. `Expired` and `Terminated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
    Terminated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Expired => "expired",
            SessionStatus::Terminated => "terminated",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(SessionStatus::Active),
            "expired" => Some(SessionStatus::Expired),
            "terminated" => Some(SessionStatus::Terminated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub user_email: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub expired_at: Option<DateTime<Utc>>,
    pub terminated_at: Option<DateTime<Utc>>,
    pub termination_reason: Option<String>,
    pub warning_sent_at: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub device: Option<String>,
}

impl SessionRecord {
    pub fn status(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }
}

/// Where a login came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceMetadata {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub location: Option<String>,
    pub device: Option<String>,
}

impl DeviceMetadata {
    /// User agent and client IP from headers; location and device come from the client
    pub fn from_headers(headers: &HeaderMap, location: Option<String>, device: Option<String>) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let ip = header("x-forwarded-for")
            .and_then(|forwarded| forwarded.split(',').next().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .or_else(|| header("x-real-ip"));

        Self {
            user_agent: header("user-agent"),
            ip,
            location,
            device,
        }
    }
}

/// Returned to the client at login and refresh
#[derive(Debug, Clone, Serialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

/// A session that passed `check_activity`
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    pub session_id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub warning_sent: bool,
}

/// Session as listed back to its owner (token withheld)
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub device: DeviceMetadata,
}

impl From<SessionRecord> for SessionSummary {
    fn from(r: SessionRecord) -> Self {
        Self {
            id: r.id,
            status: r.status,
            created_at: r.created_at,
            last_activity_at: r.last_activity_at,
            expires_at: r.expires_at,
            device: DeviceMetadata {
                user_agent: r.user_agent,
                ip: r.ip_address,
                location: r.location,
                device: r.device,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionAnalytics {
    pub active_sessions: i64,
    pub expired_sessions: i64,
    pub terminated_sessions: i64,
    pub recent_logins: i64,
    pub timestamp: DateTime<Utc>,
}

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sessions: u64,
    pub session_tokens: u64,
    pub registration_tokens: u64,
}
