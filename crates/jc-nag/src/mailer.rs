//! Email delivery: the provider interface and its Mailgun adapter.

use async_trait::async_trait;
use staleness::OutgoingMessage;
use tracing::debug;

use crate::errors::MailError;

/// Sends one rendered message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), MailError>;
}

/// [`Mailer`] backed by the Mailgun messages API.
pub struct MailgunMailer {
    client: reqwest::Client,
    /// Base URL including scheme, e.g. `https://api.mailgun.net`
    base_url: String,
    domain: String,
    api_key: String,
    from: String,
}

impl MailgunMailer {
    /// `host` is either a bare host (`api.mailgun.net`, HTTPS assumed) or a
    /// full base URL.
    pub fn new(
        host: &str,
        domain: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Result<Self, MailError> {
        let base_url = if host.contains("://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| MailError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            domain: domain.into(),
            api_key: api_key.into(),
            from: from.into(),
        })
    }

    pub fn messages_url(&self) -> String {
        format!("{}/v3/{}/messages", self.base_url, self.domain)
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), MailError> {
        let cc = message.recipients.cc_header();
        let mut form = vec![
            ("from", self.from.as_str()),
            ("to", message.recipients.to.as_str()),
            ("subject", message.subject.as_str()),
            ("html", message.html.as_str()),
        ];
        if !cc.is_empty() {
            form.push(("cc", cc.as_str()));
        }
        debug!(to = %message.recipients.to, cc = %cc, "Sending message");

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .await
            .map_err(|e| MailError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
