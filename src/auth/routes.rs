//! Authentication routes

use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/login` - Password sign-in, opens a session
/// - `GET /api/auth/me` / `PUT /api/auth/me` - Caller's profile
/// - `GET /api/auth/users/:id` - Account lookup (admin)
/// - `PUT /api/auth/users/:id/role` - Role change (admin, recent login)
/// - `GET /api/admin/check` - Admin gate probe
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/me", get(handlers::me).put(handlers::update_me))
        .route("/api/auth/users/:id", get(handlers::get_user))
        .route("/api/auth/users/:id/role", put(handlers::set_role))
        .route("/api/admin/check", get(handlers::admin_check))
}
