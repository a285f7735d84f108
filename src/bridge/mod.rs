//! Telephony bridge: turns provider webhooks into agent turns and relays
//! the replies back as SMS messages or speech.

pub mod agent;
pub mod routes;
pub mod sms;
pub mod twiml;

use async_trait::async_trait;

use crate::error::{ChannelError, SessionError};
use crate::session::SessionKey;

pub use agent::{HttpAgentClient, LocalAgent};
pub use routes::{BridgeState, bridge_routes};
pub use sms::{SmsSender, TwilioSmsSender};

/// Reply to one relayed turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentReply {
    /// Discrete messages, one per SMS or spoken segment.
    pub messages: Vec<String>,
    /// The conversation reached a terminal stage.
    pub ended: bool,
    pub internal_error: bool,
}

/// Where turns are processed: in this process or behind the agent API.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Create the session if it does not exist. An existing session is
    /// success, since the provider may redeliver the first turn.
    async fn ensure_session(&self, key: &SessionKey) -> Result<(), SessionError>;

    async fn run_turn(&self, key: &SessionKey, text: &str) -> Result<AgentReply, ChannelError>;

    /// Best-effort cleanup once a conversation is over.
    async fn delete_session(&self, key: &SessionKey) -> Result<(), ChannelError>;
}

/// Concatenate reply texts and split them into one message per line.
pub fn split_messages<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    texts
        .into_iter()
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep the digits of a phone number, for use in session ids.
pub fn phone_digits(number: &str) -> String {
    number.chars().filter(char::is_ascii_digit).collect()
}

/// Session id for a text conversation, keyed on the sender's number.
/// Withheld senders ("anonymous", "Restricted") have no number to key on
/// or reply to, so they get no session.
pub fn sms_session_id(from: &str) -> Option<String> {
    let digits = phone_digits(from);
    (!digits.is_empty()).then(|| format!("sms-{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_newlines_and_drop_blanks() {
        let messages = split_messages(["Hola.\nSegunda línea", "", "  Tercera  \n\n"]);
        assert_eq!(messages, vec!["Hola.", "Segunda línea", "Tercera"]);
    }

    #[test]
    fn digits_only() {
        assert_eq!(phone_digits("+1 (555) 123-4567"), "15551234567");
        assert_eq!(phone_digits("anonymous"), "");
    }

    #[test]
    fn withheld_senders_have_no_sms_session() {
        assert_eq!(sms_session_id("+1 (555) 123-4567").as_deref(), Some("sms-15551234567"));
        assert_eq!(sms_session_id("anonymous"), None);
        assert_eq!(sms_session_id("Restricted"), None);
    }
}
