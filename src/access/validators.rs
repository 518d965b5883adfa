use super::models::SubmitAccessRequest;
use crate::common::helpers::email_domain;
use crate::common::{is_valid_email, ValidationResult, Validator};

/// Free mail providers that do not identify an organization
pub const GENERIC_EMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "hotmail.com",
    "hotmail.co.uk",
    "outlook.com",
    "yahoo.com",
    "yahoo.co.uk",
    "icloud.com",
    "live.com",
    "msn.com",
];

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// `None` when `email` looks like a work address, otherwise the reason it does not
pub fn work_email_error(email: &str) -> Option<&'static str> {
    let email = email.trim();
    if !is_valid_email(email) {
        return Some("Invalid email format");
    }
    match email_domain(email) {
        Some(domain) if GENERIC_EMAIL_DOMAINS.contains(&domain.as_str()) => {
            Some("Please use a work email address")
        }
        Some(_) => None,
        None => Some("Invalid email format"),
    }
}

impl Validator<SubmitAccessRequest> for SubmitAccessRequest {
    fn validate(&self, data: &SubmitAccessRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(reason) = work_email_error(&data.email) {
            result.add_error("email", reason);
        }

        let domain_missing = data
            .work_domain
            .as_deref()
            .map(|d| d.trim().is_empty())
            .unwrap_or(true);
        if domain_missing {
            result.add_error("work_domain", "Work domain is required");
        }

        if let Some(message) = &data.message {
            if message.len() > 2000 {
                result.add_error("message", "Message must not exceed 2000 characters");
            }
        }

        result
    }
}
