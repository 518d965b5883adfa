// src/common/migrations.rs
//! Database migration and schema management

use sqlx::SqlitePool;
use std::env;
use tracing::{info, warn};

/// Run all database migrations
///
/// Tables are created if missing. Setting `RESET_DB=true` drops everything
/// first, which is only meant for local development.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let should_reset_db = env::var("RESET_DB").unwrap_or_else(|_| "false".to_string()) == "true";

    if should_reset_db {
        warn!("⚠️  RESET_DB=true - Dropping all tables and recreating schema...");
        drop_all_tables(pool).await?;
        info!("✅ Dropped old tables");
    }

    create_schema(pool).await?;

    info!("✅ Database migration completed successfully!");
    Ok(())
}

/// Create every table and index. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_identity_tables(pool).await?;
    create_token_tables(pool).await?;
    create_access_request_tables(pool).await?;
    create_interview_tables(pool).await?;
    create_indexes(pool).await?;
    Ok(())
}

async fn drop_all_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let tables = [
        "interview_access_logs",
        "interviews",
        "access_requests",
        "sessions",
        "session_tokens",
        "registration_tokens",
        "admin_allow_list",
        "users",
        "auth_accounts",
    ];

    for table in tables {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Identity provider accounts, mirrored profiles and the admin allow-list
async fn create_identity_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Provider side: credentials and custom claims (JSON)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_accounts (
            uid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            email_verified INTEGER NOT NULL DEFAULT 0,
            password_hash TEXT NOT NULL,
            display_name TEXT,
            custom_claims TEXT NOT NULL DEFAULT '{}',
            disabled INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            last_sign_in_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Profile mirror, denormalized for queries
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            display_name TEXT,
            role TEXT NOT NULL DEFAULT 'user',
            is_admin INTEGER NOT NULL DEFAULT 0,
            capabilities TEXT NOT NULL DEFAULT '[]',
            last_login_at TEXT,
            last_activity_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS admin_allow_list (
            email TEXT PRIMARY KEY,
            added_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Registration tokens, session tokens and session lifecycle records
async fn create_token_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS registration_tokens (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            used INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt_at TEXT,
            used_at TEXT,
            used_by TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_tokens (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            last_activity_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            token TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            user_email TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            last_activity_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            expired_at TEXT,
            terminated_at TEXT,
            termination_reason TEXT,
            warning_sent_at TEXT,
            user_agent TEXT,
            ip_address TEXT,
            location TEXT,
            device TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_access_request_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS access_requests (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            work_domain TEXT NOT NULL,
            team_size TEXT,
            message TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            registration_token TEXT,
            rejection_reason TEXT,
            reviewed_by TEXT,
            reviewed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_interview_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interviews (
            id TEXT PRIMARY KEY,
            session_code TEXT NOT NULL UNIQUE,
            candidate_name TEXT NOT NULL,
            candidate_email TEXT NOT NULL,
            candidate_id TEXT,
            interviewer_id TEXT NOT NULL,
            interviewer_email TEXT NOT NULL,
            interview_type TEXT NOT NULL,
            level TEXT NOT NULL,
            date TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            cancelled_at TEXT,
            cancelled_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only audit trail written by the access gate
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_access_logs (
            id TEXT PRIMARY KEY,
            interview_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            user_email TEXT NOT NULL,
            access_type TEXT NOT NULL,
            accessed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_registration_tokens_expiry ON registration_tokens(used, expires_at)",
        "CREATE INDEX IF NOT EXISTS idx_session_tokens_user ON session_tokens(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_session_tokens_expiry ON session_tokens(expires_at)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_user_status ON sessions(user_id, status)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_status_expiry ON sessions(status, expires_at)",
        "CREATE INDEX IF NOT EXISTS idx_access_requests_status ON access_requests(status, created_at)",
        // At most one pending request per email
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_access_requests_pending_email ON access_requests(email) WHERE status = 'pending'",
        "CREATE INDEX IF NOT EXISTS idx_interviews_interviewer ON interviews(interviewer_id, date)",
        "CREATE INDEX IF NOT EXISTS idx_interview_access_logs_interview ON interview_access_logs(interview_id)",
    ];

    for statement in indexes {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
