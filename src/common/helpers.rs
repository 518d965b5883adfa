// Helper functions for safe logging and time handling

use chrono::{DateTime, Utc};

/// Masks email addresses for safe logging
/// Prevents sensitive data exposure while preserving debugging utility
///
/// # Example
/// ```ignore
/// let masked = safe_email_log("user@example.com");
/// // Returns: "u***@example.com"
/// ```
pub fn safe_email_log(email: &str) -> String {
    if email.len() > 3 {
        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() == 2 && !parts[0].is_empty() {
            let first = parts[0].chars().next().unwrap_or('*');
            format!("{}***@{}", first, parts[1])
        } else {
            "***@***.***".to_string()
        }
    } else {
        "***@***.***".to_string()
    }
}

/// Masks tokens for safe logging
/// Shows only first and last 4 characters
///
/// # Example
/// ```ignore
/// let masked = safe_token_log("3f9a0c1d2e4b5a6978c0d1e2f3a4b5c6");
/// // Returns: "3f9a...b5c6"
/// ```
pub fn safe_token_log(token: &str) -> String {
    if token.len() > 12 && token.is_ascii() {
        format!("{}...{}", &token[..4], &token[token.len() - 4..])
    } else {
        "***".to_string()
    }
}

/// Extract the domain part of an email address, lower-cased
pub fn email_domain(email: &str) -> Option<String> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
        .filter(|d| !d.is_empty())
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_email_log_masks_local_part() {
        assert_eq!(safe_email_log("alice@acme.com"), "a***@acme.com");
        assert_eq!(safe_email_log("a@b"), "***@***.***");
        assert_eq!(safe_email_log("not-an-email"), "***@***.***");
    }

    #[test]
    fn test_safe_token_log_hides_middle() {
        let token = "0123456789abcdef0123456789abcdef";
        assert_eq!(safe_token_log(token), "0123...cdef");
        assert_eq!(safe_token_log("short"), "***");
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("alice@ACME.com"), Some("acme.com".to_string()));
        assert_eq!(email_domain("nobody"), None);
        assert_eq!(email_domain("trailing@"), None);
    }

    #[test]
    fn test_parse_timestamp_normalizes_offset() {
        let parsed = parse_timestamp("2026-01-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-01-01T08:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }
}
