// src/common/config.rs
//! Access, session and token configuration
//!
//! Defaults match the production values; each one can be overridden from
//! the environment.

use chrono::Duration;
use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub id_token_ttl_minutes: i64,
    /// Single configured admin email (tier two of admin resolution)
    pub admin_email: Option<String>,
    pub registration_token_ttl_hours: i64,
    pub registration_max_attempts: i64,
    pub session_ttl_hours: i64,
    pub session_inactivity_warning_minutes: i64,
    pub interview_early_access_minutes: i64,
    pub interview_late_access_minutes: i64,
    pub recent_login_max_age_minutes: i64,
    pub sweep_interval_seconds: u64,
    pub sweep_batch_limit: i64,
    pub frontend_url: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "replace_with_strong_secret".to_string(),
            jwt_issuer: "hiq-api".to_string(),
            id_token_ttl_minutes: 60,
            admin_email: None,
            registration_token_ttl_hours: 24,
            registration_max_attempts: 5,
            session_ttl_hours: 24,
            session_inactivity_warning_minutes: 120,
            interview_early_access_minutes: 15,
            interview_late_access_minutes: 60,
            recent_login_max_age_minutes: 5,
            sweep_interval_seconds: 900,
            sweep_batch_limit: 500,
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = env::var(key) {
        match raw.trim().parse::<T>() {
            Ok(val) => *target = val,
            Err(_) => warn!(key = %key, value = %raw, "Ignoring unparseable config value"),
        }
    }
}

impl AccessConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secret) = env::var("JWT_SECRET") {
            if !secret.is_empty() {
                config.jwt_secret = secret;
            }
        }
        if let Ok(issuer) = env::var("JWT_ISSUER") {
            if !issuer.is_empty() {
                config.jwt_issuer = issuer;
            }
        }

        config.admin_email = env::var("ADMIN_EMAIL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        env_parse("ID_TOKEN_TTL_MINUTES", &mut config.id_token_ttl_minutes);
        env_parse(
            "REGISTRATION_TOKEN_TTL_HOURS",
            &mut config.registration_token_ttl_hours,
        );
        env_parse(
            "REGISTRATION_MAX_ATTEMPTS",
            &mut config.registration_max_attempts,
        );
        env_parse("SESSION_TTL_HOURS", &mut config.session_ttl_hours);
        env_parse(
            "SESSION_INACTIVITY_WARNING_MINUTES",
            &mut config.session_inactivity_warning_minutes,
        );
        env_parse(
            "INTERVIEW_EARLY_ACCESS_MINUTES",
            &mut config.interview_early_access_minutes,
        );
        env_parse(
            "INTERVIEW_LATE_ACCESS_MINUTES",
            &mut config.interview_late_access_minutes,
        );
        env_parse(
            "RECENT_LOGIN_MAX_AGE_MINUTES",
            &mut config.recent_login_max_age_minutes,
        );
        env_parse("SWEEP_INTERVAL_SECONDS", &mut config.sweep_interval_seconds);
        env_parse("SWEEP_BATCH_LIMIT", &mut config.sweep_batch_limit);

        if let Ok(url) = env::var("FRONTEND_URL") {
            if !url.is_empty() {
                config.frontend_url = url.trim_end_matches('/').to_string();
            }
        }

        config
    }

    pub fn registration_token_ttl(&self) -> Duration {
        Duration::hours(self.registration_token_ttl_hours)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours)
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::minutes(self.session_inactivity_warning_minutes)
    }

    pub fn id_token_ttl(&self) -> Duration {
        Duration::minutes(self.id_token_ttl_minutes)
    }

    pub fn recent_login_max_age(&self) -> Duration {
        Duration::minutes(self.recent_login_max_age_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AccessConfig::default();
        assert_eq!(config.registration_token_ttl(), Duration::hours(24));
        assert_eq!(config.registration_max_attempts, 5);
        assert_eq!(config.session_ttl(), Duration::hours(24));
        assert_eq!(config.inactivity_threshold(), Duration::hours(2));
        assert_eq!(config.interview_early_access_minutes, 15);
        assert_eq!(config.interview_late_access_minutes, 60);
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn test_env_parse_keeps_default_on_garbage() {
        let mut value: i64 = 7;
        env::set_var("HIQ_TEST_CONFIG_GARBAGE", "seven");
        env_parse("HIQ_TEST_CONFIG_GARBAGE", &mut value);
        assert_eq!(value, 7);

        env::set_var("HIQ_TEST_CONFIG_GARBAGE", " 9 ");
        env_parse("HIQ_TEST_CONFIG_GARBAGE", &mut value);
        assert_eq!(value, 9);
        env::remove_var("HIQ_TEST_CONFIG_GARBAGE");
    }
}
