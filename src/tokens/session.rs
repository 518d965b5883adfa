//! Session tokens
//!
//! Expiry is absolute. `touch` records activity but never moves `expires_at`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::common::{generate_secret_token, helpers::safe_token_log, ApiError, Clock};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound | SessionError::Expired => ApiError::Unauthorized(e.to_string()),
            SessionError::Database(db) => ApiError::DatabaseError(db),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionToken {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Freshly issued token
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionTokenStore {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionTokenStore {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { db, clock, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn issue(&self, user_id: &str) -> Result<IssuedSessionToken, SessionError> {
        let mut tx = self.db.begin().await?;
        let issued = self.issue_tx(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(issued)
    }

    pub(crate) async fn issue_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        user_id: &str,
    ) -> Result<IssuedSessionToken, SessionError> {
        let now = self.clock.now();
        let issued = IssuedSessionToken {
            token: generate_secret_token(),
            expires_at: now + self.ttl,
        };

        sqlx::query(
            r#"
            INSERT INTO session_tokens (token, user_id, created_at, expires_at, last_activity_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&issued.token)
        .bind(user_id)
        .bind(now)
        .bind(issued.expires_at)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        debug!(user_id = %user_id, token = %safe_token_log(&issued.token), "Session token issued");
        Ok(issued)
    }

    pub async fn find(&self, token: &str) -> Result<Option<SessionToken>, SessionError> {
        let row = sqlx::query_as::<_, SessionToken>("SELECT * FROM session_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    /// Resolve the bound user id. Expired once `now >= expires_at`.
    pub async fn validate(&self, token: &str) -> Result<String, SessionError> {
        let row = self.find(token).await?.ok_or(SessionError::NotFound)?;
        if self.clock.now() >= row.expires_at {
            debug!(token = %safe_token_log(token), "Session token expired");
            return Err(SessionError::Expired);
        }
        Ok(row.user_id)
    }

    /// Replace `old_token` with a new token for the same user, atomically
    pub async fn refresh(&self, old_token: &str) -> Result<IssuedSessionToken, SessionError> {
        let mut tx = self.db.begin().await?;
        let issued = self.refresh_tx(&mut tx, old_token).await?;
        tx.commit().await?;
        Ok(issued)
    }

    pub(crate) async fn refresh_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        old_token: &str,
    ) -> Result<IssuedSessionToken, SessionError> {
        let row: Option<(String, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, expires_at FROM session_tokens WHERE token = ?")
                .bind(old_token)
                .fetch_optional(&mut **tx)
                .await?;

        let (user_id, expires_at) = row.ok_or(SessionError::NotFound)?;
        if self.clock.now() >= expires_at {
            return Err(SessionError::Expired);
        }

        let issued = self.issue_tx(tx, &user_id).await?;

        sqlx::query("DELETE FROM session_tokens WHERE token = ?")
            .bind(old_token)
            .execute(&mut **tx)
            .await?;

        info!(
            user_id = %user_id,
            old = %safe_token_log(old_token),
            new = %safe_token_log(&issued.token),
            "Session token refreshed"
        );
        Ok(issued)
    }

    /// Delete the token. Unknown tokens are not an error.
    pub async fn invalidate(&self, token: &str) -> Result<(), SessionError> {
        let result = sqlx::query("DELETE FROM session_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.db)
            .await?;
        debug!(token = %safe_token_log(token), removed = result.rows_affected(), "Session token invalidated");
        Ok(())
    }

    /// Record activity without extending expiry
    pub async fn touch(&self, token: &str) -> Result<(), SessionError> {
        sqlx::query("UPDATE session_tokens SET last_activity_at = ? WHERE token = ?")
            .bind(self.clock.now())
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn delete_expired(&self, limit: i64) -> Result<u64, SessionError> {
        let result = sqlx::query(
            r#"
            DELETE FROM session_tokens
            WHERE token IN (
                SELECT token FROM session_tokens WHERE expires_at <= ? LIMIT ?
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
