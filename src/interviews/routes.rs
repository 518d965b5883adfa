use super::handlers;
use axum::{
    routing::{get, post},
    Router,
};

/// Creates the interviews router
pub fn interviews_routes() -> Router {
    Router::new()
        .route(
            "/api/interviews",
            get(handlers::list_interviews).post(handlers::create_interview),
        )
        .route("/api/interviews/:id/access", get(handlers::access_interview))
        .route("/api/interviews/:id/cancel", post(handlers::cancel_interview))
        // Public
        .route(
            "/api/public/interviews/:session_id",
            get(handlers::get_public_interview),
        )
}
