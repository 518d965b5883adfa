//! Identity, claims and profile models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Role carried in provider claims and mirrored on the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Interviewer,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Interviewer => "interviewer",
            Role::Admin => "admin",
            Role::Moderator => "moderator",
        }
    }

    /// Roles allowed to schedule interviews
    pub fn can_schedule_interviews(&self) -> bool {
        matches!(self, Role::Interviewer | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "interviewer" => Ok(Role::Interviewer),
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Custom claims stored with the provider account.
///
/// Unknown keys are kept in `extra` so a round trip through the resolver
/// never drops claims written by someone else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomClaims {
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CustomClaims {
    /// Tier-one admin check: both flags must agree
    pub fn asserts_admin(&self) -> bool {
        self.is_admin == Some(true) && self.role == Role::Admin
    }

    /// Same claims with the admin pair set
    pub fn with_admin(&self, now: DateTime<Utc>) -> Self {
        self.with_role(Role::Admin, now)
    }

    /// Same claims with `role` replaced and `isAdmin` derived from it
    pub fn with_role(&self, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            role,
            is_admin: Some(role == Role::Admin),
            updated_at: Some(now),
            ..self.clone()
        }
    }

    /// Parse the stored JSON blob, falling back to defaults on bad data
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }
}

/// A caller whose bearer token has been verified
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
    pub claims: CustomClaims,
    /// When the caller last presented credentials (not when the token was refreshed)
    pub auth_time: DateTime<Utc>,
}

impl Identity {
    pub fn role(&self) -> Role {
        self.claims.role
    }
}

/// Account record as the identity provider holds it
#[derive(Debug, Clone, Serialize)]
pub struct ProviderUser {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub custom_claims: CustomClaims,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

/// Input for provider account creation
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub uid: Option<String>,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub claims: CustomClaims,
}

/// Result of a password sign-in
#[derive(Debug, Clone, Serialize)]
pub struct SignIn {
    pub id_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: ProviderUser,
}

/// ID token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub email: String,
    pub email_verified: bool,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
    #[serde(default)]
    pub claims: CustomClaims,
}

/// Profile mirror row (`users` table)
#[derive(Debug, Clone, FromRow)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub is_admin: bool,
    pub capabilities: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn capability_list(&self) -> Vec<String> {
        serde_json::from_str(&self.capabilities).unwrap_or_default()
    }

    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or_default()
    }
}

/// Profile as returned over HTTP
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub role: Role,
    pub is_admin: bool,
    pub capabilities: Vec<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub location: Option<String>,
    pub device: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}
