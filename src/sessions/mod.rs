//! # Sessions Module
//!
//! Session lifecycle on top of the session token store:
//! - login with device metadata
//! - activity checks with inactivity warnings
//! - lazy and swept expiry, each notified exactly once
//! - logout, logout-all and admin analytics

pub mod extractors;
pub mod handlers;
pub mod manager;
pub mod models;
pub mod routes;

#[cfg(test)]
mod tests;

pub use manager::SessionManager;
pub use models::DeviceMetadata;
pub use routes::sessions_routes;
