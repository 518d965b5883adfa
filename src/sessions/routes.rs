use super::handlers;
use axum::{
    routing::{get, post},
    Router,
};

/// Creates the sessions router
pub fn sessions_routes() -> Router {
    Router::new()
        .route("/api/sessions", get(handlers::list_sessions))
        .route("/api/sessions/refresh", post(handlers::refresh_session))
        .route("/api/sessions/logout", post(handlers::logout))
        .route("/api/sessions/logout-all", post(handlers::logout_all))
        // Admin
        .route(
            "/api/admin/sessions/analytics",
            get(handlers::session_analytics),
        )
        .route("/api/admin/sessions/sweep", post(handlers::sweep_sessions))
}
