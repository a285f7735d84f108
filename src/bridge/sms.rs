//! Outbound SMS.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::error::ChannelError;

pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError>;
}

/// Sends through the Twilio Messages REST API.
pub struct TwilioSmsSender {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: SecretString,
    from: String,
}

impl TwilioSmsSender {
    pub fn new(
        client: reqwest::Client,
        account_sid: impl Into<String>,
        auth_token: SecretString,
        from: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: TWILIO_API_BASE.to_string(),
            account_sid: account_sid.into(),
            auth_token,
            from: from.into(),
        }
    }

    /// Point at a different API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        let send_failed = |reason: String| ChannelError::SendFailed {
            name: "sms".to_string(),
            reason,
        };

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("To", to), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "SMS send rejected");
            return Err(send_failed(format!("HTTP {status}: {detail}")));
        }
        debug!(chars = body.chars().count(), "SMS sent");
        Ok(())
    }
}
