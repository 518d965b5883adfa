//! # Tokens Module
//!
//! Opaque single-use registration tokens and absolute-expiry session tokens,
//! both persisted in SQLite.

pub mod registration;
pub mod session;

#[cfg(test)]
mod tests;

pub use registration::{RegistrationToken, RegistrationTokenError, RegistrationTokenStore};
pub use session::{SessionError, SessionTokenStore};
