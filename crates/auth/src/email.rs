//! Outbound email.
//!
//! The core only ever sends best-effort mail (verification links), so the
//! production adapter degrades gracefully: without an API key it logs the
//! send and reports success instead of failing operations that already
//! committed their real work.

use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail provider returned status {status}")]
    Provider { status: u16 },
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError>;
}

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Mailer backed by the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key.into()),
            from: from.into(),
        }
    }

    /// Build from `RESEND_API_KEY` / `EMAIL_FROM`. A missing API key yields a
    /// disabled mailer rather than an error.
    pub fn from_env() -> Self {
        let api_key = std::env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty());
        let from = std::env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "no-reply@palaver.chat".to_string());

        if api_key.is_none() {
            tracing::warn!("email sending not configured (missing RESEND_API_KEY)");
        }

        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait::async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!(to = %to, subject = %subject, "email sending disabled, dropping message");
            return Ok(());
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html_body,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Provider { status: status.as_u16() });
        }

        tracing::debug!(to = %to, subject = %subject, "email dispatched");
        Ok(())
    }
}
