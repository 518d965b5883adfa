//! # Access Module
//!
//! Invitation-only onboarding. A work email submits an access request, an
//! admin approves or rejects it, and approval mails a one-time registration
//! link that creates an interviewer account when consumed.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod validators;


pub use routes::access_routes;
