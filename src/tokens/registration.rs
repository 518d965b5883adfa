//! One-time registration tokens
//!
//! A token binds an email to a registration window. It can be consumed once;
//! failed attempts accumulate and lock it at the configured threshold.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::common::{generate_secret_token, helpers::safe_token_log, safe_email_log, ApiError, Clock};

#[derive(Debug, Error)]
pub enum RegistrationTokenError {
    #[error("invalid registration token")]
    NotFound,

    #[error("registration token has already been used")]
    AlreadyUsed,

    #[error("registration token has expired")]
    Expired,

    #[error("too many invalid attempts, token has been locked")]
    TooManyAttempts,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RegistrationTokenError> for ApiError {
    fn from(e: RegistrationTokenError) -> Self {
        match e {
            RegistrationTokenError::NotFound => ApiError::NotFound(e.to_string()),
            RegistrationTokenError::AlreadyUsed
            | RegistrationTokenError::Expired
            | RegistrationTokenError::TooManyAttempts => ApiError::BadRequest(e.to_string()),
            RegistrationTokenError::Database(db) => ApiError::DatabaseError(db),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegistrationToken {
    pub id: String,
    pub email: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by: Option<String>,
}

impl RegistrationToken {
    /// Checks in order: used flag, expiry, attempt count
    pub fn check(&self, now: DateTime<Utc>, max_attempts: i64) -> Result<(), RegistrationTokenError> {
        if self.used {
            return Err(RegistrationTokenError::AlreadyUsed);
        }
        if now >= self.expires_at {
            return Err(RegistrationTokenError::Expired);
        }
        if self.attempts >= max_attempts {
            return Err(RegistrationTokenError::TooManyAttempts);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct RegistrationTokenStore {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_attempts: i64,
}

impl RegistrationTokenStore {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>, ttl: Duration, max_attempts: i64) -> Self {
        Self {
            db,
            clock,
            ttl,
            max_attempts,
        }
    }

    /// Issue a token for `email`, valid for the configured TTL
    pub async fn issue(&self, email: &str) -> Result<RegistrationToken, RegistrationTokenError> {
        let now = self.clock.now();
        let token = RegistrationToken {
            id: generate_secret_token(),
            email: email.to_string(),
            used: false,
            created_at: now,
            expires_at: now + self.ttl,
            attempts: 0,
            last_attempt_at: None,
            used_at: None,
            used_by: None,
        };

        sqlx::query(
            r#"
            INSERT INTO registration_tokens (id, email, used, created_at, expires_at, attempts)
            VALUES (?, ?, 0, ?, ?, 0)
            "#,
        )
        .bind(&token.id)
        .bind(&token.email)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&self.db)
        .await?;

        info!(
            token = %safe_token_log(&token.id),
            email = %safe_email_log(email),
            expires_at = %token.expires_at,
            "Registration token issued"
        );

        Ok(token)
    }

    pub async fn find(&self, id: &str) -> Result<Option<RegistrationToken>, RegistrationTokenError> {
        let token = sqlx::query_as::<_, RegistrationToken>("SELECT * FROM registration_tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(token)
    }

    /// The token itself, if it exists and is unused, unexpired and unlocked
    pub async fn check_usable(&self, id: &str) -> Result<RegistrationToken, RegistrationTokenError> {
        let token = self.find(id).await?.ok_or(RegistrationTokenError::NotFound)?;

        if let Err(e) = token.check(self.clock.now(), self.max_attempts) {
            debug!(token = %safe_token_log(id), reason = %e, "Registration token rejected");
            return Err(e);
        }

        Ok(token)
    }

    /// Return the bound email if the token is usable
    pub async fn validate(&self, id: &str) -> Result<String, RegistrationTokenError> {
        Ok(self.check_usable(id).await?.email)
    }

    /// Increment the attempt counter and stamp the attempt time
    pub async fn record_failed_attempt(&self, id: &str) -> Result<(), RegistrationTokenError> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let current: Option<(i64,)> =
            sqlx::query_as("SELECT attempts FROM registration_tokens WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let (attempts,) = match current {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                return Err(RegistrationTokenError::NotFound);
            }
        };

        sqlx::query("UPDATE registration_tokens SET attempts = ?, last_attempt_at = ? WHERE id = ?")
            .bind(attempts + 1)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        warn!(
            token = %safe_token_log(id),
            attempts = attempts + 1,
            "Registration token failed attempt recorded"
        );
        Ok(())
    }

    /// One-way consume. Compare-and-set on `used`, so of two concurrent
    /// callers exactly one wins and the other sees `AlreadyUsed`.
    pub async fn mark_used(&self, id: &str, consumer_id: &str) -> Result<(), RegistrationTokenError> {
        let now = self.clock.now();

        let result = sqlx::query(
            r#"
            UPDATE registration_tokens
            SET used = 1, used_at = ?, used_by = ?
            WHERE id = ? AND used = 0 AND expires_at > ? AND attempts < ?
            "#,
        )
        .bind(now)
        .bind(consumer_id)
        .bind(id)
        .bind(now)
        .bind(self.max_attempts)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 1 {
            info!(token = %safe_token_log(id), consumer = %consumer_id, "Registration token consumed");
            return Ok(());
        }

        // Lost the race or the token is unusable; report why
        let token = self.find(id).await?.ok_or(RegistrationTokenError::NotFound)?;
        match token.check(now, self.max_attempts) {
            Err(e) => Err(e),
            Ok(()) => Err(RegistrationTokenError::AlreadyUsed),
        }
    }

    /// Delete up to `limit` expired tokens that were never used
    pub async fn delete_expired_unused(&self, limit: i64) -> Result<u64, RegistrationTokenError> {
        let result = sqlx::query(
            r#"
            DELETE FROM registration_tokens
            WHERE id IN (
                SELECT id FROM registration_tokens
                WHERE used = 0 AND expires_at <= ?
                LIMIT ?
            )
            "#,
        )
        .bind(self.clock.now())
        .bind(limit)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
