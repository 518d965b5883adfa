// src/auth/bootstrap.rs
//! One-shot admin bootstrap, run with `hiq-api --setup-admin`

use std::env;
use thiserror::Error;
use tracing::info;

use super::errors::ProviderError;
use super::models::{CustomClaims, NewAccount, ProviderUser, Role};
use super::profiles;
use crate::common::{safe_email_log, AppState};

/// Capabilities the bootstrapped admin starts with
pub const BOOTSTRAP_CAPABILITIES: &[&str] = &["manage_users", "approve_requests"];

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("ADMIN_EMAIL must be set to bootstrap an admin")]
    MissingAdminEmail,

    #[error("ADMIN_INITIAL_PASSWORD must be set to create the admin account")]
    MissingPassword,

    #[error("identity provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Whether the process was started with `--setup-admin`
pub fn setup_admin_requested() -> bool {
    env::args().skip(1).any(|arg| arg == "--setup-admin")
}

/// Create or find the configured admin account and grant it admin everywhere:
/// provider claims, profile mirror with bootstrap capabilities, allow-list.
/// Safe to run repeatedly.
pub async fn setup_admin(
    state: &AppState,
    initial_password: Option<&str>,
) -> Result<ProviderUser, BootstrapError> {
    let email = state
        .config
        .admin_email
        .clone()
        .ok_or(BootstrapError::MissingAdminEmail)?;
    let now = state.clock.now();

    let account = match state.provider.get_user_by_email(&email).await {
        Ok(account) => {
            info!(uid = %account.uid, "Admin account already exists");
            account
        }
        Err(ProviderError::UserNotFound) => {
            let password = initial_password
                .filter(|p| !p.is_empty())
                .ok_or(BootstrapError::MissingPassword)?;
            let account = state
                .provider
                .create_user(NewAccount {
                    uid: None,
                    email: email.clone(),
                    password: password.to_string(),
                    display_name: Some("Administrator".to_string()),
                    email_verified: true,
                    claims: CustomClaims::default().with_admin(now),
                })
                .await?;
            info!(uid = %account.uid, email = %safe_email_log(&email), "Admin account created");
            account
        }
        Err(e) => return Err(e.into()),
    };

    let claims = account.custom_claims.with_admin(now);
    state
        .provider
        .set_custom_claims(&account.uid, &claims)
        .await?;

    profiles::upsert_role(&state.db, &account.uid, &account.email, Role::Admin, now).await?;
    profiles::grant_capabilities(&state.db, &account.uid, BOOTSTRAP_CAPABILITIES, now).await?;
    profiles::add_to_allow_list(&state.db, &account.email, now).await?;

    info!(uid = %account.uid, capabilities = ?BOOTSTRAP_CAPABILITIES, "Admin bootstrap complete");

    Ok(ProviderUser {
        custom_claims: claims,
        ..account
    })
}
