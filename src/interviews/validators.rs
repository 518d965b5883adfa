use super::models::CreateInterviewRequest;
use crate::common::helpers::parse_timestamp;
use crate::common::{is_valid_email, ValidationResult, Validator};

pub const DEFAULT_INTERVIEW_TYPE: &str = "technical";
pub const DEFAULT_LEVEL: &str = "mid";
pub const DEFAULT_DURATION_MINUTES: i64 = 45;

const MAX_DURATION_MINUTES: i64 = 480;

impl Validator<CreateInterviewRequest> for CreateInterviewRequest {
    fn validate(&self, data: &CreateInterviewRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.candidate_name.trim().is_empty() {
            result.add_error("candidate_name", "Candidate name is required");
        } else if data.candidate_name.len() > 255 {
            result.add_error(
                "candidate_name",
                "Candidate name must not exceed 255 characters",
            );
        }

        if !is_valid_email(data.candidate_email.trim()) {
            result.add_error("candidate_email", "Valid email is required");
        }

        if parse_timestamp(&data.date).is_none() {
            result.add_error("date", "Valid date is required");
        }

        if let Some(duration) = data.duration_minutes {
            if duration <= 0 || duration > MAX_DURATION_MINUTES {
                result.add_error(
                    "duration_minutes",
                    "Duration must be between 1 and 480 minutes",
                );
            }
        }

        result
    }
}
