// src/services/email.rs
//! Notification templates and the best-effort `Notifier`

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::common::safe_email_log;
use crate::services::mailer::{EmailMessage, Mailer};

/// Wrap body HTML in the shared layout
fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .header {{ color: #4F46E5; text-align: center; }}
        .content {{ padding: 20px; background-color: #f9f9f9; border-radius: 8px; }}
        .footer {{ padding: 20px; text-align: center; font-size: 12px; color: #666; }}
        .button {{ display: inline-block; padding: 12px 24px; background-color: #4F46E5; color: white; text-decoration: none; border-radius: 5px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header"><h1>HiQ AI</h1></div>
        <div class="content">
            <h2>{title}</h2>
            {body}
        </div>
        <div class="footer">
            <p>This is an automated message. Please do not reply directly to this email.</p>
        </div>
    </div>
</body>
</html>"#
    )
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%A, %B %-d, %Y %H:%M UTC").to_string()
}

pub fn session_expiry_warning_email(to: &str, name: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Your HiQ session is about to expire".to_string(),
        html: layout(
            "Session Expiry Warning",
            &format!(
                "<p>Hi {},</p>\
                 <p>We haven't seen any activity on your session for a while. \
                 It will expire soon; sign in again to keep working.</p>",
                name
            ),
        ),
    }
}

pub fn session_expired_email(to: &str, name: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Your HiQ session has expired".to_string(),
        html: layout(
            "Session Expired",
            &format!(
                "<p>Hi {},</p><p>Your session has expired. Please sign in again to continue.</p>",
                name
            ),
        ),
    }
}

pub struct AccessRequestSummary<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub work_domain: &'a str,
    pub team_size: Option<&'a str>,
}

pub fn access_request_notification_email(to: &str, request: &AccessRequestSummary<'_>) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("New access request from {}", request.work_domain),
        html: layout(
            "New Access Request",
            &format!(
                "<p><strong>Request ID:</strong> {}</p>\
                 <p><strong>Email:</strong> {}</p>\
                 <p><strong>Work domain:</strong> {}</p>\
                 <p><strong>Team size:</strong> {}</p>",
                request.id,
                request.email,
                request.work_domain,
                request.team_size.unwrap_or("Not specified")
            ),
        ),
    }
}

pub fn access_approved_email(
    to: &str,
    name: &str,
    registration_link: &str,
    expires_at: &DateTime<Utc>,
) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Your HiQ access request has been approved".to_string(),
        html: layout(
            "Access Approved",
            &format!(
                "<p>Hi {},</p>\
                 <p>Your request for access has been approved. Complete your registration here:</p>\
                 <p><a class=\"button\" href=\"{link}\">Create your account</a></p>\
                 <p>This link can be used once and expires on {}.</p>",
                name,
                format_date(expires_at),
                link = registration_link
            ),
        ),
    }
}

pub fn access_rejected_email(to: &str, name: &str, reason: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Update on your HiQ access request".to_string(),
        html: layout(
            "Access Request Update",
            &format!(
                "<p>Hi {},</p>\
                 <p>Unfortunately we are unable to approve your access request at this time.</p>\
                 <p><strong>Reason:</strong> {}</p>",
                name, reason
            ),
        ),
    }
}

pub struct InterviewSummary<'a> {
    pub candidate_name: &'a str,
    pub interview_type: &'a str,
    pub level: &'a str,
    pub date: &'a DateTime<Utc>,
    pub duration_minutes: i64,
}

pub fn interview_invite_email(to: &str, interview: &InterviewSummary<'_>, link: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!(
            "Interview Scheduled: {} Interview for {} Position",
            interview.interview_type, interview.level
        ),
        html: layout(
            "Interview Confirmation",
            &format!(
                "<p>Dear {},</p>\
                 <p>Your {} interview has been scheduled.</p>\
                 <p><strong>When:</strong> {}<br><strong>Duration:</strong> {} minutes</p>\
                 <p>The interview room opens 15 minutes before the start time.</p>\
                 <p><a class=\"button\" href=\"{}\">Join interview</a></p>",
                interview.candidate_name,
                interview.interview_type.to_lowercase(),
                format_date(interview.date),
                interview.duration_minutes,
                link
            ),
        ),
    }
}

pub fn interview_cancelled_email(to: &str, interview: &InterviewSummary<'_>) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("{} Interview Cancelled", interview.interview_type),
        html: layout(
            "Interview Cancelled",
            &format!(
                "<p>Dear {},</p>\
                 <p>Your {} interview scheduled for {} has been cancelled.</p>\
                 <p>If you would like to reschedule, please contact the hiring team.</p>",
                interview.candidate_name,
                interview.interview_type.to_lowercase(),
                format_date(interview.date)
            ),
        ),
    }
}

/// Sends notifications without ever failing the caller.
///
/// Delivery errors are logged and dropped; nothing is retried here.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
    admin_email: Option<String>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, frontend_url: String, admin_email: Option<String>) -> Self {
        Self {
            mailer,
            frontend_url,
            admin_email,
        }
    }

    async fn deliver(&self, kind: &'static str, message: EmailMessage) {
        let to = safe_email_log(&message.to);
        match self.mailer.send_email(message).await {
            Ok(()) => debug!(kind = kind, to = %to, "Notification sent"),
            Err(e) => warn!(kind = kind, to = %to, error = %e, "Notification failed"),
        }
    }

    pub fn registration_link(&self, token: &str) -> String {
        format!("{}/register?token={}", self.frontend_url, token)
    }

    pub fn interview_link(&self, session_code: &str) -> String {
        format!("{}/{}", self.frontend_url, session_code)
    }

    pub async fn send_expiry_warning(&self, to: &str, name: &str) {
        self.deliver("session_expiry_warning", session_expiry_warning_email(to, name))
            .await;
    }

    pub async fn send_expired(&self, to: &str, name: &str) {
        self.deliver("session_expired", session_expired_email(to, name))
            .await;
    }

    pub async fn send_access_request(&self, request: &AccessRequestSummary<'_>) {
        match &self.admin_email {
            Some(admin) => {
                self.deliver(
                    "access_request",
                    access_request_notification_email(admin, request),
                )
                .await
            }
            None => warn!(request_id = %request.id, "No admin email configured, access request notification skipped"),
        }
    }

    pub async fn send_access_approved(&self, to: &str, name: &str, token: &str, expires_at: &DateTime<Utc>) {
        let link = self.registration_link(token);
        self.deliver("access_approved", access_approved_email(to, name, &link, expires_at))
            .await;
    }

    pub async fn send_access_rejected(&self, to: &str, name: &str, reason: &str) {
        self.deliver("access_rejected", access_rejected_email(to, name, reason))
            .await;
    }

    pub async fn send_interview_invite(&self, to: &str, interview: &InterviewSummary<'_>, session_code: &str) {
        let link = self.interview_link(session_code);
        self.deliver("interview_invite", interview_invite_email(to, interview, &link))
            .await;
    }

    pub async fn send_interview_cancelled(&self, to: &str, interview: &InterviewSummary<'_>) {
        self.deliver("interview_cancelled", interview_cancelled_email(to, interview))
            .await;
    }
}
