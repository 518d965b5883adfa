use super::handlers;
use axum::{
    routing::{get, post},
    Router,
};

/// Creates the access request and registration router
pub fn access_routes() -> Router {
    Router::new()
        // Public
        .route("/api/access/request", post(handlers::submit_request))
        .route(
            "/api/access/register/:token",
            get(handlers::preview_registration),
        )
        .route("/api/access/register", post(handlers::register))
        // Admin review
        .route("/api/access/requests", get(handlers::list_requests))
        .route(
            "/api/access/requests/:id/approve",
            post(handlers::approve_request),
        )
        .route(
            "/api/access/requests/:id/reject",
            post(handlers::reject_request),
        )
}
