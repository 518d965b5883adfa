// src/main.rs
use axum::{extract::Extension, middleware, routing::get, Json, Router};
use dotenv::dotenv;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod access;
mod auth;
mod common;
mod interviews;
mod logging_middleware;
mod rate_limit_middleware;
mod services;
mod sessions;
mod tokens;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use auth::bootstrap::{setup_admin, setup_admin_requested};
use auth::LocalIdentityProvider;
use common::{AccessConfig, AppState, Clock, SystemClock};
use rate_limit_middleware::rate_limit_middleware;
use services::{LogMailer, Mailer, MailerConfig, RateLimitConfig, RateLimitService, SesMailer};

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Every route with the request-scoped layers. CORS and tracing are added by `main`.
pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // ====================================================================
        // AUTHENTICATION ROUTES (Login, Profile, Roles)
        // ====================================================================
        .merge(auth::auth_routes())
        // ====================================================================
        // SESSION ROUTES
        // ====================================================================
        .merge(sessions::sessions_routes())
        // ====================================================================
        // ACCESS REQUEST AND REGISTRATION ROUTES
        // ====================================================================
        .merge(access::access_routes())
        // ====================================================================
        // INTERVIEW ROUTES
        // ====================================================================
        .merge(interviews::interviews_routes())
        // ====================================================================
        // MIDDLEWARE AND LAYERS
        // ====================================================================
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(middleware::from_fn(rate_limit_middleware))
        .layer(Extension(state.rate_limit_service.clone()))
        .layer(Extension(state))
}

fn cors_layer() -> CorsLayer {
    let cors_origins = env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

    let origins: Vec<axum::http::HeaderValue> = cors_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderName::from_static("x-session-token"),
            axum::http::HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://hiq.db".to_string());
    let config = AccessConfig::from_env();
    if config.admin_email.is_none() {
        warn!("ADMIN_EMAIL is not set; only claims and the allow-list can grant admin");
    }

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let provider = Arc::new(LocalIdentityProvider::new(
        pool.clone(),
        config.jwt_secret.clone(),
        config.jwt_issuer.clone(),
        config.id_token_ttl(),
        clock.clone(),
    ));
    info!("LocalIdentityProvider initialized");

    let mailer_config = MailerConfig::from_env();
    let mailer: Arc<dyn Mailer> = if mailer_config.from_email.is_some() {
        match SesMailer::from_config(&mailer_config).await {
            Ok(ses) => {
                info!(region = %mailer_config.region, "SesMailer initialized");
                Arc::new(ses)
            }
            Err(e) => {
                warn!(error = %e, "SES unavailable, falling back to LogMailer");
                Arc::new(LogMailer)
            }
        }
    } else {
        info!("AWS_SES_FROM_EMAIL not set, using LogMailer");
        Arc::new(LogMailer)
    };

    let rate_limit_service = Arc::new(RateLimitService::new(RateLimitConfig::from_env()));

    let sweep_interval = std::time::Duration::from_secs(config.sweep_interval_seconds.max(1));

    let state = Arc::new(AppState::build(
        pool,
        config,
        clock,
        provider,
        mailer,
        rate_limit_service.clone(),
    ));

    // ========================================================================
    // ADMIN BOOTSTRAP (--setup-admin)
    // ========================================================================

    if setup_admin_requested() {
        let password = env::var("ADMIN_INITIAL_PASSWORD").ok();
        let admin = setup_admin(&state, password.as_deref()).await?;
        info!(uid = %admin.uid, "Admin setup finished, exiting");
        return Ok(());
    }

    // ========================================================================
    // BACKGROUND TASKS
    // ========================================================================

    state.sessions.clone().start_sweep_task(sweep_interval);
    info!(period_secs = sweep_interval.as_secs(), "Expired session sweep task started");

    {
        let limiter = rate_limit_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup_expired().await;
            }
        });
    }

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = build_router(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let h = common::test_support::Harness::new().await;
        let response = build_router(h.state.clone())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }
}
