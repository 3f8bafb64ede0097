//! Outgoing mail: request shape, delivery through Resend, and invocation of
//! the `send-email` function from a backend client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{remote_error, Backend};
use crate::{Error, Result};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Name of the deployed mail function.
pub const SEND_EMAIL_FUNCTION: &str = "send-email";

pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: to, subject, html";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    /// True when there is no recipient or any listed address is blank.
    fn has_blank(&self) -> bool {
        match self {
            Recipients::One(address) => address.trim().is_empty(),
            Recipients::Many(addresses) => {
                addresses.is_empty() || addresses.iter().any(|a| a.trim().is_empty())
            }
        }
    }
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Recipients::One(address.to_string())
    }
}

/// Body accepted by the mail function; fields are optional so that missing
/// ones are reported rather than failing deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct SendEmailPayload {
    #[serde(default)]
    pub to: Option<Recipients>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl SendEmailPayload {
    pub fn into_request(self) -> Result<EmailRequest> {
        let present = |s: &Option<String>| s.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false);

        match (self.to, present(&self.subject), present(&self.html)) {
            (Some(to), true, true) if !to.has_blank() => Ok(EmailRequest {
                to,
                subject: self.subject.unwrap_or_default(),
                html: self.html.unwrap_or_default(),
                text: self.text,
            }),
            _ => Err(Error::Validation(MISSING_FIELDS_MESSAGE.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailRequest {
    pub to: Recipients,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Message body of the Resend `POST /emails` call.
#[derive(Debug, Serialize)]
struct ResendMessage<'a> {
    from: &'a str,
    to: &'a Recipients,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentEmail {
    #[serde(default)]
    pub id: Option<String>,
}

/// Delivers a message through some mail provider.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, email: &EmailRequest) -> Result<SentEmail>;
}

/// Resend HTTP API client
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: Option<String>,
    from: String,
    endpoint: String,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from: from.into(),
            endpoint: RESEND_API_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl MailSender for ResendMailer {
    async fn send(&self, email: &EmailRequest) -> Result<SentEmail> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("RESEND_API_KEY not set".to_string()))?;

        let payload = ResendMessage {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            text: email.text.as_deref(),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(remote_error(status, &body));
        }

        let sent: SentEmail = serde_json::from_str(&body)?;
        info!(email_id = sent.id.as_deref().unwrap_or("unknown"), "Email sent");
        Ok(sent)
    }
}

/// Ask the backend's mail function to deliver `email`.
pub async fn send_email(client: &dyn Backend, email: &EmailRequest) -> Result<()> {
    let response = client
        .invoke(SEND_EMAIL_FUNCTION, serde_json::to_value(email)?)
        .await?;

    if response.get("success").and_then(|v| v.as_bool()) == Some(true) {
        return Ok(());
    }

    let message = response
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("Mail function did not confirm delivery");
    Err(Error::Internal(message.to_string()))
}
