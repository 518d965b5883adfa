// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::{CredentialVerifier, IdentityProvider, RoleResolver};
use crate::common::{AccessConfig, Clock};
use crate::interviews::InterviewAccessGate;
use crate::services::{Mailer, Notifier, RateLimitService};
use crate::sessions::SessionManager;
use crate::tokens::{RegistrationTokenStore, SessionTokenStore};

/// Database pool, collaborators and the access/session components built on them
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: AccessConfig,
    pub clock: Arc<dyn Clock>,
    pub provider: Arc<dyn IdentityProvider>,
    pub verifier: CredentialVerifier,
    pub resolver: RoleResolver,
    pub registration_tokens: RegistrationTokenStore,
    pub session_tokens: SessionTokenStore,
    pub sessions: SessionManager,
    pub interview_gate: InterviewAccessGate,
    pub notifier: Notifier,
    pub rate_limit_service: Arc<RateLimitService>,
}

impl AppState {
    /// Wire every component from its collaborators
    pub fn build(
        db: SqlitePool,
        config: AccessConfig,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn IdentityProvider>,
        mailer: Arc<dyn Mailer>,
        rate_limit_service: Arc<RateLimitService>,
    ) -> Self {
        let notifier = Notifier::new(
            mailer,
            config.frontend_url.clone(),
            config.admin_email.clone(),
        );

        let verifier = CredentialVerifier::new(provider.clone(), clock.clone());
        let resolver = RoleResolver::new(
            db.clone(),
            provider.clone(),
            clock.clone(),
            config.admin_email.clone(),
        );

        let registration_tokens = RegistrationTokenStore::new(
            db.clone(),
            clock.clone(),
            config.registration_token_ttl(),
            config.registration_max_attempts,
        );
        let session_tokens = SessionTokenStore::new(db.clone(), clock.clone(), config.session_ttl());

        let sessions = SessionManager::new(
            db.clone(),
            clock.clone(),
            session_tokens.clone(),
            registration_tokens.clone(),
            notifier.clone(),
            config.inactivity_threshold(),
            config.sweep_batch_limit,
        );

        let interview_gate = InterviewAccessGate::new(
            db.clone(),
            clock.clone(),
            config.interview_early_access_minutes,
            config.interview_late_access_minutes,
        );

        Self {
            db,
            config,
            clock,
            provider,
            verifier,
            resolver,
            registration_tokens,
            session_tokens,
            sessions,
            interview_gate,
            notifier,
            rate_limit_service,
        }
    }
}
