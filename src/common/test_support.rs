//! Shared fixtures for unit and router tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};

use crate::auth::models::{CustomClaims, NewAccount, ProviderUser};
use crate::auth::{IdentityProvider, LocalIdentityProvider};
use crate::common::migrations::create_schema;
use crate::common::{AccessConfig, AppState, Clock};
use crate::services::mailer::{EmailMessage, MailError, Mailer};
use crate::services::rate_limit::{RateLimitConfig, RateLimitService};

pub const ADMIN_EMAIL: &str = "admin@hiq.dev";
pub const PASSWORD: &str = "correct horse battery";

/// Single-connection in-memory database with the full schema
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    create_schema(&pool).await.expect("schema");
    pool
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    instant: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.instant.lock().unwrap() = to;
    }

    pub fn advance(&self, by: Duration) {
        *self.instant.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap()
    }
}

pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn start_clock() -> ManualClock {
    ManualClock::new(start_instant())
}

/// Mailer that keeps every message it is asked to send
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count_with_subject(&self, to: &str, fragment: &str) -> usize {
        self.sent()
            .iter()
            .filter(|m| m.to == to && m.subject.contains(fragment))
            .count()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email(&self, message: EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Mailer whose every delivery fails
#[derive(Debug, Clone, Default)]
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_email(&self, _message: EmailMessage) -> Result<(), MailError> {
        Err(MailError::Ses("connection reset".into()))
    }
}

pub fn test_config() -> AccessConfig {
    AccessConfig {
        jwt_secret: "test-secret".to_string(),
        admin_email: Some(ADMIN_EMAIL.to_string()),
        frontend_url: "http://app.test".to_string(),
        ..AccessConfig::default()
    }
}

pub fn test_provider(pool: &SqlitePool, clock: Arc<dyn Clock>, config: &AccessConfig) -> LocalIdentityProvider {
    LocalIdentityProvider::new(
        pool.clone(),
        config.jwt_secret.clone(),
        config.jwt_issuer.clone(),
        config.id_token_ttl(),
        clock,
    )
    .with_hash_cost(8, 1, 1)
}

pub struct Harness {
    pub pool: SqlitePool,
    pub clock: ManualClock,
    pub mailer: RecordingMailer,
    pub provider: Arc<LocalIdentityProvider>,
    pub state: Arc<AppState>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AccessConfig) -> Self {
        Self::with_provider(config, |pool, clock, config| {
            Arc::new(test_provider(pool, clock, config))
        })
        .await
    }

    /// Build with a custom provider wrapped around the local one
    pub async fn with_provider<F>(config: AccessConfig, wrap: F) -> Self
    where
        F: FnOnce(&SqlitePool, Arc<dyn Clock>, &AccessConfig) -> Arc<dyn IdentityProvider>,
    {
        Self::assemble(config, wrap, None).await
    }

    /// Every outgoing email fails; `mailer` stays empty
    pub async fn with_failing_mailer() -> Self {
        Self::assemble(
            test_config(),
            |pool, clock, config| Arc::new(test_provider(pool, clock, config)),
            Some(Arc::new(FailingMailer)),
        )
        .await
    }

    async fn assemble<F>(config: AccessConfig, wrap: F, outbox: Option<Arc<dyn Mailer>>) -> Self
    where
        F: FnOnce(&SqlitePool, Arc<dyn Clock>, &AccessConfig) -> Arc<dyn IdentityProvider>,
    {
        let pool = memory_pool().await;
        let clock = start_clock();
        let mailer = RecordingMailer::default();
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

        let provider = Arc::new(test_provider(&pool, shared_clock.clone(), &config));
        let exposed = wrap(&pool, shared_clock.clone(), &config);

        let state = Arc::new(AppState::build(
            pool.clone(),
            config,
            shared_clock,
            exposed,
            outbox.unwrap_or_else(|| Arc::new(mailer.clone())),
            Arc::new(RateLimitService::new(RateLimitConfig::disabled())),
        ));

        Self {
            pool,
            clock,
            mailer,
            provider,
            state,
        }
    }

    pub async fn create_account(&self, email: &str, claims: CustomClaims) -> ProviderUser {
        self.provider
            .create_user(NewAccount {
                uid: None,
                email: email.to_string(),
                password: PASSWORD.to_string(),
                display_name: None,
                email_verified: true,
                claims,
            })
            .await
            .expect("create account")
    }

    /// ID token for `uid`, minted now with the account's current claims
    pub async fn id_token(&self, uid: &str) -> String {
        let user = self.provider.get_user(uid).await.expect("account");
        self.provider
            .mint_id_token(&user, self.clock.now())
            .expect("mint")
            .0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_clones_share_instant() {
        let clock = start_clock();
        let other = clock.clone();

        clock.advance(Duration::minutes(90));
        assert_eq!(other.now(), start_instant() + Duration::minutes(90));

        other.set(start_instant());
        assert_eq!(clock.now(), start_instant());
    }
}
