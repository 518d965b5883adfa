// src/services/mod.rs
//
// Shared services used across the domain modules: outbound email and
// request throttling

pub mod email;
pub mod mailer;
pub mod rate_limit;

pub use email::Notifier;
pub use mailer::{LogMailer, Mailer, MailerConfig, SesMailer};
pub use rate_limit::{RateLimitConfig, RateLimitService};
