use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Outbound mail delivery failed. Callers on the verification path treat
/// this as non-fatal: log it, keep the persisted credential.
#[derive(Debug, thiserror::Error)]
#[error("mail delivery failed: {0}")]
pub struct MailerError(pub String);

/// Seam over the outbound mail provider so services can run against a
/// recording or failing double in tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError>;
}

/// Resend-backed mail client. Every send is bounded by the client timeout.
#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    text: String,
}

impl EmailClient {
    pub fn new(api_key: &str, from_email: &str, from_name: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for EmailClient {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError> {
        let request = ResendRequest {
            from: format!("{} <{}>", self.from_name, self.from_email),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            text: body.to_string(),
        };

        let response = self
            .client
            .post("https://api.resend.com/emails")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| MailerError(format!("email send failed: {e}")))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError(format!("email API error: {body}")));
        }

        tracing::debug!(to = %to, subject = %subject, "email sent");
        Ok(())
    }
}
