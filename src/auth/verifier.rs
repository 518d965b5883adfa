//! Credential verification: bearer header → verified identity

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, warn};

use super::errors::AuthError;
use super::models::Identity;
use super::provider::IdentityProvider;
use crate::common::Clock;

/// Extract the token from an `Authorization` header value.
///
/// The `Bearer ` prefix is mandatory; a raw token is treated as malformed.
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[derive(Clone)]
pub struct CredentialVerifier {
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
}

impl CredentialVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { provider, clock }
    }

    /// Verify the raw `Authorization` header. Every failure is `Unauthenticated`.
    pub async fn verify_header(&self, header: Option<&str>) -> Result<Identity, AuthError> {
        let header = header.ok_or_else(|| {
            debug!("Authentication failed: missing Authorization header");
            AuthError::Unauthenticated
        })?;

        let token = bearer_token(header).ok_or_else(|| {
            debug!("Authentication failed: malformed Authorization header");
            AuthError::Unauthenticated
        })?;

        self.verify(token).await
    }

    pub async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.provider.verify_token(token).await.map_err(|e| {
            warn!(error = %e, "Token verification failed");
            AuthError::Unauthenticated
        })
    }

    /// Reject identities whose credentials were presented more than `max_age` ago
    pub fn require_recent_login(
        &self,
        identity: &Identity,
        max_age: Duration,
    ) -> Result<(), AuthError> {
        let age = self.clock.now() - identity.auth_time;
        if age > max_age {
            debug!(uid = %identity.uid, age_secs = age.num_seconds(), "Stale login");
            return Err(AuthError::RecentLoginRequired);
        }
        Ok(())
    }
}
