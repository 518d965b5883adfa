//! Profile mirror (`users` table) and the admin allow-list

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{Role, UserProfile};

pub async fn find_profile(db: &SqlitePool, uid: &str) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE id = ?")
        .bind(uid)
        .fetch_optional(db)
        .await
}

/// Create the profile row, or merge the role fields into an existing one
pub async fn upsert_role(
    db: &SqlitePool,
    uid: &str,
    email: &str,
    role: Role,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, role, is_admin, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            role = excluded.role,
            is_admin = excluded.is_admin,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(uid)
    .bind(email)
    .bind(role.as_str())
    .bind(role == Role::Admin)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn create_profile(
    db: &SqlitePool,
    uid: &str,
    email: &str,
    display_name: Option<&str>,
    role: Role,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, display_name, role, is_admin, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(uid)
    .bind(email)
    .bind(display_name)
    .bind(role.as_str())
    .bind(role == Role::Admin)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

/// Union `capabilities` into the profile's capability list
pub async fn grant_capabilities(
    db: &SqlitePool,
    uid: &str,
    capabilities: &[&str],
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let mut current = find_profile(db, uid)
        .await?
        .map(|p| p.capability_list())
        .unwrap_or_default();
    for cap in capabilities {
        if !current.iter().any(|c| c == cap) {
            current.push(cap.to_string());
        }
    }
    let blob = serde_json::to_string(&current).unwrap_or_else(|_| "[]".to_string());

    sqlx::query("UPDATE users SET capabilities = ?, updated_at = ? WHERE id = ?")
        .bind(blob)
        .bind(now)
        .bind(uid)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn record_login(db: &SqlitePool, uid: &str, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = ?, last_activity_at = ? WHERE id = ?")
        .bind(now)
        .bind(now)
        .bind(uid)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn update_display_name(
    db: &SqlitePool,
    uid: &str,
    display_name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET display_name = ?, updated_at = ? WHERE id = ?")
        .bind(display_name)
        .bind(now)
        .bind(uid)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

pub async fn is_allow_listed(db: &SqlitePool, email: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT email FROM admin_allow_list WHERE email = ?")
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(row.is_some())
}

/// Idempotent union into the allow-list
pub async fn add_to_allow_list(
    db: &SqlitePool,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO admin_allow_list (email, added_at) VALUES (?, ?) ON CONFLICT(email) DO NOTHING")
        .bind(email)
        .bind(now)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn remove_from_allow_list(db: &SqlitePool, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM admin_allow_list WHERE email = ?")
        .bind(email)
        .execute(db)
        .await?;
    Ok(())
}
