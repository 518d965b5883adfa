//! Role/claim resolution
//!
//! Admin privileges are resolved in three tiers, checked in order:
//!
//! 1. provider claims assert `isAdmin=true` and `role="admin"`
//! 2. the email equals the configured admin email
//! 3. the email is on the persisted admin allow-list
//!
//! Deciding is kept apart from reconciling. [`RoleResolver::decide`] only
//! reads; [`RoleResolver::reconcile`] writes the corrected claims back for the
//! lower tiers and never fails the request it accompanies.

use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::errors::{AuthError, ProviderError};
use super::models::{Identity, ProviderUser, Role};
use super::profiles;
use super::provider::IdentityProvider;
use crate::common::{safe_email_log, Clock};

/// Which tier granted admin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminDecision {
    ClaimsAsserted,
    ConfiguredAdminEmail,
    AllowListed,
}

impl AdminDecision {
    /// Whether accepting through this tier should write claims back
    pub fn needs_reconcile(&self) -> bool {
        !matches!(self, AdminDecision::ClaimsAsserted)
    }
}

/// Output of the read-only decision step
#[derive(Debug, Clone)]
pub struct AdminCheck {
    pub decision: AdminDecision,
    pub account: ProviderUser,
}

/// Proof that the caller passed the admin gate
#[derive(Debug, Clone, Serialize)]
pub struct AdminGrant {
    pub uid: String,
    pub email: String,
    pub decision: AdminDecision,
}

#[derive(Clone)]
pub struct RoleResolver {
    db: SqlitePool,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    admin_email: Option<String>,
}

impl RoleResolver {
    pub fn new(
        db: SqlitePool,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            db,
            provider,
            clock,
            admin_email,
        }
    }

    fn is_configured_admin(&self, email: &str) -> bool {
        self.admin_email.as_deref() == Some(email)
    }

    async fn decide_account(
        &self,
        account: &ProviderUser,
    ) -> Result<Option<AdminDecision>, AuthError> {
        if account.custom_claims.asserts_admin() {
            return Ok(Some(AdminDecision::ClaimsAsserted));
        }
        if self.is_configured_admin(&account.email) {
            return Ok(Some(AdminDecision::ConfiguredAdminEmail));
        }
        if profiles::is_allow_listed(&self.db, &account.email).await? {
            return Ok(Some(AdminDecision::AllowListed));
        }
        Ok(None)
    }

    /// Read-only admin decision. Claims are read fresh from the provider so a
    /// reconciled account passes tier one without signing in again.
    pub async fn decide(&self, identity: &Identity) -> Result<AdminCheck, AuthError> {
        let account = self.provider.get_user(&identity.uid).await?;

        match self.decide_account(&account).await? {
            Some(decision) => Ok(AdminCheck { decision, account }),
            None => {
                warn!(
                    uid = %identity.uid,
                    email = %safe_email_log(&identity.email),
                    "Admin access denied"
                );
                Err(AuthError::Forbidden("Admin access required".into()))
            }
        }
    }

    /// Write corrected claims back after a lower-tier accept.
    ///
    /// Failures are logged and swallowed; the caller has already been accepted.
    pub async fn reconcile(&self, check: &AdminCheck) {
        let now = self.clock.now();
        let account = &check.account;

        match check.decision {
            AdminDecision::ClaimsAsserted => {}
            AdminDecision::ConfiguredAdminEmail => {
                let claims = account.custom_claims.with_admin(now);
                if let Err(e) = self.provider.set_custom_claims(&account.uid, &claims).await {
                    error!(uid = %account.uid, error = %e, "Admin claims write failed, needs reconciliation");
                }
                if let Err(e) =
                    profiles::upsert_role(&self.db, &account.uid, &account.email, Role::Admin, now).await
                {
                    error!(uid = %account.uid, error = %e, "Admin profile write failed, needs reconciliation");
                }
                if let Err(e) = profiles::add_to_allow_list(&self.db, &account.email, now).await {
                    error!(uid = %account.uid, error = %e, "Allow-list update failed, needs reconciliation");
                }
                info!(uid = %account.uid, "Reconciled admin claims from configured admin email");
            }
            AdminDecision::AllowListed => {
                let claims = account.custom_claims.with_admin(now);
                if let Err(e) = self.provider.set_custom_claims(&account.uid, &claims).await {
                    error!(uid = %account.uid, error = %e, "Admin claims write failed, needs reconciliation");
                } else {
                    info!(uid = %account.uid, "Reconciled admin claims from allow-list");
                }
            }
        }
    }

    /// Admin gate: decide, then reconcile if a lower tier accepted
    pub async fn require_admin(&self, identity: &Identity) -> Result<AdminGrant, AuthError> {
        let check = self.decide(identity).await?;
        if check.decision.needs_reconcile() {
            self.reconcile(&check).await;
        }
        debug!(uid = %identity.uid, decision = ?check.decision, "Admin access granted");

        Ok(AdminGrant {
            uid: check.account.uid,
            email: check.account.email,
            decision: check.decision,
        })
    }

    /// Admin gate that also requires every named capability on the profile
    pub async fn require_admin_capabilities(
        &self,
        identity: &Identity,
        required: &[&str],
    ) -> Result<AdminGrant, AuthError> {
        let grant = self.require_admin(identity).await?;

        let held = profiles::find_profile(&self.db, &grant.uid)
            .await?
            .map(|p| p.capability_list())
            .unwrap_or_default();

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|cap| !held.iter().any(|h| h == cap))
            .collect();

        if !missing.is_empty() {
            warn!(uid = %grant.uid, missing = ?missing, "Admin lacks required capabilities");
            return Err(AuthError::Forbidden("Insufficient capabilities".into()));
        }

        Ok(grant)
    }

    /// Non-blocking admin check. Any lookup failure reads as "not admin".
    pub async fn is_admin(&self, uid: &str) -> bool {
        let account = match self.provider.get_user(uid).await {
            Ok(account) => account,
            Err(e) => {
                debug!(uid = %uid, error = %e, "Admin lookup failed");
                return false;
            }
        };
        matches!(self.decide_account(&account).await, Ok(Some(_)))
    }

    /// Set a user's role in the provider claims and the profile mirror.
    ///
    /// Promotion to admin adds the email to the allow-list; demotion from
    /// admin removes it so tier three cannot grant it back.
    pub async fn set_role(&self, uid: &str, role: Role) -> Result<ProviderUser, AuthError> {
        let account = self.provider.get_user(uid).await?;
        let now = self.clock.now();
        let was_admin = account.custom_claims.asserts_admin();

        let claims = account.custom_claims.with_role(role, now);
        self.provider
            .set_custom_claims(uid, &claims)
            .await
            .map_err(|e| match e {
                ProviderError::UserNotFound => AuthError::NotFound,
                other => AuthError::Internal(other.to_string()),
            })?;

        profiles::upsert_role(&self.db, uid, &account.email, role, now).await?;

        if role == Role::Admin {
            profiles::add_to_allow_list(&self.db, &account.email, now).await?;
        } else if was_admin || profiles::is_allow_listed(&self.db, &account.email).await? {
            profiles::remove_from_allow_list(&self.db, &account.email).await?;
        }

        info!(uid = %uid, role = %role, "Role updated");

        Ok(ProviderUser {
            custom_claims: claims,
            ..account
        })
    }
}
