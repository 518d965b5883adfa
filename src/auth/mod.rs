//! # Auth Module
//!
//! This module handles identity and authorization:
//! - the identity provider seam and its local SQLite/JWT implementation
//! - bearer credential verification
//! - three-tier admin resolution with claim write-back
//! - AuthedUser / AdminUser extractors for protected routes
//! - the `--setup-admin` bootstrap

pub mod admin;
pub mod bootstrap;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod profiles;
pub mod provider;
pub mod routes;
pub mod verifier;


pub use admin::RoleResolver;
pub use extractors::{AdminUser, AuthedUser};
pub use provider::{IdentityProvider, LocalIdentityProvider};
pub use routes::auth_routes;
pub use verifier::CredentialVerifier;
