// src/services/mailer.rs
//! Outbound email delivery
//!
//! `SesMailer` sends through Amazon SES v2. When no sender address is
//! configured the process falls back to `LogMailer`, which only logs.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::config::{Credentials, Region};
use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use std::env;
use thiserror::Error;
use tracing::{error, info};

use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mailer not configured: {0}")]
    NotConfigured(String),

    #[error("SES operation failed: {0}")]
    Ses(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), MailError>;
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub from_email: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl MailerConfig {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            from_email: non_empty("AWS_SES_FROM_EMAIL"),
            region: non_empty("AWS_SES_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: non_empty("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY"),
        }
    }
}

pub struct SesMailer {
    client: SesClient,
    from_email: String,
}

impl SesMailer {
    /// Build the SES client. Explicit keys win over the default credential chain.
    pub async fn from_config(config: &MailerConfig) -> Result<Self, MailError> {
        let from_email = config
            .from_email
            .clone()
            .ok_or_else(|| MailError::NotConfigured("AWS_SES_FROM_EMAIL is not set".into()))?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(key_id, secret, None, None, "env"));
        }

        let aws_config = loader.load().await;

        Ok(Self {
            client: SesClient::new(&aws_config),
            from_email,
        })
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send_email(&self, message: EmailMessage) -> Result<(), MailError> {
        let destination = Destination::builder()
            .to_addresses(message.to.clone())
            .build();

        let subject = Content::builder()
            .data(&message.subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::Ses(format!("Failed to build subject: {}", e)))?;

        let body = Content::builder()
            .data(&message.html)
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::Ses(format!("Failed to build body: {}", e)))?;

        let content = EmailContent::builder()
            .simple(
                Message::builder()
                    .subject(subject)
                    .body(SesBody::builder().html(body).build())
                    .build(),
            )
            .build();

        let result = self
            .client
            .send_email()
            .from_email_address(&self.from_email)
            .destination(destination)
            .content(content)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, to = %safe_email_log(&message.to), "Failed to send email via SES");
                MailError::Ses(format!("Send failed: {}", e))
            })?;

        info!(
            to = %safe_email_log(&message.to),
            message_id = ?result.message_id(),
            "Email sent via SES"
        );
        Ok(())
    }
}

/// Mailer that records the send in the log and nothing else
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_email(&self, message: EmailMessage) -> Result<(), MailError> {
        info!(
            to = %safe_email_log(&message.to),
            subject = %message.subject,
            "Email delivery not configured, message logged only"
        );
        Ok(())
    }
}
