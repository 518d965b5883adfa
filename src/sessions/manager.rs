//! Session lifecycle: login, activity checks, expiry, termination and sweeping
//!
//! A session row moves `active -> expired` (lazily on access, or by the sweep)
//! or `active -> terminated` (logout). Every transition is a guarded UPDATE on
//! `status = 'active'`, so the expiry email goes out once per session no
//! matter how many callers notice the expiry.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::models::{
    ActiveSession, DeviceMetadata, SessionAnalytics, SessionHandle, SessionRecord, SessionStatus,
    SessionSummary, SweepReport,
};
use crate::auth::profiles;
use crate::common::{generate_session_id, helpers::safe_token_log, Clock};
use crate::services::Notifier;
use crate::tokens::{RegistrationTokenStore, SessionError, SessionTokenStore};

#[derive(Clone)]
pub struct SessionManager {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    tokens: SessionTokenStore,
    registration_tokens: RegistrationTokenStore,
    notifier: Notifier,
    inactivity_threshold: Duration,
    batch_limit: i64,
}

impl SessionManager {
    pub fn new(
        db: SqlitePool,
        clock: Arc<dyn Clock>,
        tokens: SessionTokenStore,
        registration_tokens: RegistrationTokenStore,
        notifier: Notifier,
        inactivity_threshold: Duration,
        batch_limit: i64,
    ) -> Self {
        Self {
            db,
            clock,
            tokens,
            registration_tokens,
            notifier,
            inactivity_threshold,
            batch_limit,
        }
    }

    /// Display name for notification emails: profile name, else the email
    async fn recipient_name(&self, user_id: &str, email: &str) -> String {
        match profiles::find_profile(&self.db, user_id).await {
            Ok(Some(profile)) => profile.display_name.unwrap_or_else(|| email.to_string()),
            _ => email.to_string(),
        }
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<SessionRecord>, SessionError> {
        let record = sqlx::query_as::<_, SessionRecord>("SELECT * FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.db)
            .await?;
        Ok(record)
    }

    /// Open a session: issue a token and record the session with its device
    pub async fn login(
        &self,
        user_id: &str,
        email: &str,
        device: DeviceMetadata,
    ) -> Result<SessionHandle, SessionError> {
        let now = self.clock.now();
        let session_id = generate_session_id();

        let mut tx = self.db.begin().await?;
        let issued = self.tokens.issue_tx(&mut tx, user_id).await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, token, user_id, user_email, status, created_at, last_activity_at, expires_at,
                user_agent, ip_address, location, device
            ) VALUES (?, ?, ?, ?, 'active', ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session_id)
        .bind(&issued.token)
        .bind(user_id)
        .bind(email)
        .bind(now)
        .bind(now)
        .bind(issued.expires_at)
        .bind(&device.user_agent)
        .bind(&device.ip)
        .bind(&device.location)
        .bind(&device.device)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if let Err(e) = profiles::record_login(&self.db, user_id, now).await {
            warn!(user_id = %user_id, error = %e, "Failed to record login on profile");
        }

        info!(
            user_id = %user_id,
            session_id = %session_id,
            ip = ?device.ip,
            "Session created"
        );

        Ok(SessionHandle {
            session_id,
            session_token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    /// Validate a session token, warn on inactivity and record activity.
    ///
    /// An expired token is transitioned to `expired` here. The inactivity
    /// warning is best-effort and never fails the check.
    pub async fn check_activity(&self, token: &str) -> Result<ActiveSession, SessionError> {
        match self.tokens.validate(token).await {
            Ok(_) => {}
            Err(SessionError::Expired) => {
                self.expire(token).await?;
                return Err(SessionError::Expired);
            }
            Err(e) => return Err(e),
        }

        let record = self.find_by_token(token).await?.ok_or(SessionError::NotFound)?;
        match record.status() {
            Some(SessionStatus::Active) => {}
            Some(SessionStatus::Expired) => return Err(SessionError::Expired),
            _ => return Err(SessionError::NotFound),
        }

        let now = self.clock.now();
        let warning_sent = if now - record.last_activity_at > self.inactivity_threshold {
            self.warn_inactive(&record, now).await
        } else {
            false
        };

        if let Err(e) = self.record_activity(&record, now).await {
            warn!(session_id = %record.id, error = %e, "Failed to record session activity");
        }

        Ok(ActiveSession {
            session_id: record.id,
            user_id: record.user_id,
            expires_at: record.expires_at,
            warning_sent,
        })
    }

    /// Send the inactivity warning once per idle stretch
    async fn warn_inactive(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        let claimed = sqlx::query(
            r#"
            UPDATE sessions SET warning_sent_at = ?
            WHERE id = ? AND status = 'active'
              AND (warning_sent_at IS NULL OR warning_sent_at <= last_activity_at)
            "#,
        )
        .bind(now)
        .bind(&record.id)
        .execute(&self.db)
        .await;

        match claimed {
            Ok(result) if result.rows_affected() == 1 => {
                let name = self.recipient_name(&record.user_id, &record.user_email).await;
                self.notifier
                    .send_expiry_warning(&record.user_email, &name)
                    .await;
                debug!(session_id = %record.id, "Inactivity warning sent");
                true
            }
            Ok(_) => false,
            Err(e) => {
                error!(session_id = %record.id, error = %e, "Failed to claim inactivity warning");
                false
            }
        }
    }

    async fn record_activity(&self, record: &SessionRecord, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.tokens.touch(&record.token).await?;

        sqlx::query("UPDATE sessions SET last_activity_at = ? WHERE id = ?")
            .bind(now)
            .bind(&record.id)
            .execute(&self.db)
            .await?;

        sqlx::query("UPDATE users SET last_activity_at = ? WHERE id = ?")
            .bind(now)
            .bind(&record.user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Transition an active session to `expired`. Returns whether this call
    /// made the transition; only that caller sends the expiry email.
    pub async fn expire(&self, token: &str) -> Result<bool, SessionError> {
        let now = self.clock.now();
        let transitioned: Option<(String, String, String)> = sqlx::query_as(
            r#"
            UPDATE sessions SET status = 'expired', expired_at = ?
            WHERE token = ? AND status = 'active'
            RETURNING id, user_id, user_email
            "#,
        )
        .bind(now)
        .bind(token)
        .fetch_optional(&self.db)
        .await?;

        match transitioned {
            Some((session_id, user_id, email)) => {
                info!(session_id = %session_id, user_id = %user_id, "Session expired");
                let name = self.recipient_name(&user_id, &email).await;
                self.notifier.send_expired(&email, &name).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Swap the session's token for a fresh one
    pub async fn refresh(&self, old_token: &str) -> Result<SessionHandle, SessionError> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let issued = self.tokens.refresh_tx(&mut tx, old_token).await?;

        let session: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE sessions SET token = ?, expires_at = ?, last_activity_at = ?
            WHERE token = ? AND status = 'active'
            RETURNING id
            "#,
        )
        .bind(&issued.token)
        .bind(issued.expires_at)
        .bind(now)
        .bind(old_token)
        .fetch_optional(&mut *tx)
        .await?;

        let (session_id,) = match session {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                return Err(SessionError::NotFound);
            }
        };

        tx.commit().await?;
        info!(session_id = %session_id, "Session refreshed");

        Ok(SessionHandle {
            session_id,
            session_token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    /// End one session. Unknown or already-ended tokens are not an error.
    pub async fn logout(&self, token: &str) -> Result<(), SessionError> {
        let now = self.clock.now();
        self.tokens.invalidate(token).await?;

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'terminated', terminated_at = ?, termination_reason = 'user_logout'
            WHERE token = ? AND status = 'active'
            "#,
        )
        .bind(now)
        .bind(token)
        .execute(&self.db)
        .await?;

        debug!(token = %safe_token_log(token), ended = result.rows_affected(), "Session logout");
        Ok(())
    }

    /// Terminate every active session of a user and drop their tokens
    pub async fn terminate_all(&self, user_id: &str) -> Result<u64, SessionError> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let terminated = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'terminated', terminated_at = ?, termination_reason = 'user_logout_all'
            WHERE user_id = ? AND status = 'active'
            "#,
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM session_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(user_id = %user_id, terminated = terminated, "All sessions terminated");
        Ok(terminated)
    }

    /// Active, unexpired sessions of a user, newest first
    pub async fn list_active(&self, user_id: &str) -> Result<Vec<SessionSummary>, SessionError> {
        let records = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = ? AND status = 'active' AND expires_at > ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(self.clock.now())
        .fetch_all(&self.db)
        .await?;

        Ok(records.into_iter().map(SessionSummary::from).collect())
    }

    pub async fn analytics(&self) -> Result<SessionAnalytics, SessionError> {
        let now = self.clock.now();
        let since = now - Duration::hours(24);

        let (active, expired, terminated, recent): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'expired' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'terminated' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN created_at > ? THEN 1 ELSE 0 END), 0)
            FROM sessions
            "#,
        )
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        Ok(SessionAnalytics {
            active_sessions: active,
            expired_sessions: expired,
            terminated_sessions: terminated,
            recent_logins: recent,
            timestamp: now,
        })
    }

    /// Expire overdue sessions in one batched UPDATE, then purge expired
    /// session tokens and expired unused registration tokens.
    ///
    /// Already-expired sessions are not touched, so re-running is harmless.
    pub async fn sweep_expired(&self) -> Result<SweepReport, SessionError> {
        let now = self.clock.now();

        let expired: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            UPDATE sessions SET status = 'expired', expired_at = ?
            WHERE id IN (
                SELECT id FROM sessions
                WHERE status = 'active' AND expires_at <= ?
                LIMIT ?
            )
            RETURNING id, user_id, user_email
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(self.batch_limit)
        .fetch_all(&self.db)
        .await?;

        for (session_id, user_id, email) in &expired {
            debug!(session_id = %session_id, "Session expired by sweep");
            let name = self.recipient_name(user_id, email).await;
            self.notifier.send_expired(email, &name).await;
        }

        let session_tokens = self.tokens.delete_expired(self.batch_limit).await?;

        let registration_tokens = match self
            .registration_tokens
            .delete_expired_unused(self.batch_limit)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "Registration token cleanup failed");
                0
            }
        };

        let report = SweepReport {
            sessions: expired.len() as u64,
            session_tokens,
            registration_tokens,
        };

        if report != SweepReport::default() {
            info!(
                sessions = report.sessions,
                session_tokens = report.session_tokens,
                registration_tokens = report.registration_tokens,
                "Expired session sweep completed"
            );
        }

        Ok(report)
    }

    /// Run `sweep_expired` on a fixed period for the life of the process
    pub fn start_sweep_task(self, period: std::time::Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = self.sweep_expired().await {
                    error!(error = %e, "Expired session sweep failed");
                }
            }
        });
    }
}
