//! `AgentClient` implementations.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{AgentClient, AgentReply, split_messages};
use crate::api::{Content, Event, EventActions, RunRequest};
use crate::dialogue::DialogueEngine;
use crate::error::{ChannelError, SessionError};
use crate::session::SessionKey;

/// Runs turns on an in-process `DialogueEngine`.
pub struct LocalAgent {
    engine: Arc<DialogueEngine>,
}

impl LocalAgent {
    pub fn new(engine: Arc<DialogueEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl AgentClient for LocalAgent {
    async fn ensure_session(&self, key: &SessionKey) -> Result<(), SessionError> {
        match self.engine.store().create(key).await {
            Ok(outcome) => {
                debug!(session = %key, ?outcome, "Session ready");
                Ok(())
            }
            Err(e) => Err(SessionError::BootstrapFailed {
                session_id: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn run_turn(&self, key: &SessionKey, text: &str) -> Result<AgentReply, ChannelError> {
        let outcome = self
            .engine
            .handle_turn(key, text)
            .await
            .map_err(|e| ChannelError::Agent(e.to_string()))?;
        Ok(AgentReply {
            messages: split_messages(outcome.replies.iter().map(String::as_str)),
            ended: outcome.ended,
            internal_error: outcome.internal_error,
        })
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<(), ChannelError> {
        self.engine
            .store()
            .delete(key)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::Agent(e.to_string()))
    }
}

/// Talks to an agent host over its HTTP API.
pub struct HttpAgentClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn session_url(&self, key: &SessionKey) -> String {
        format!(
            "{}/apps/{}/users/{}/sessions/{}",
            self.base_url, key.app_name, key.user_id, key.session_id
        )
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn ensure_session(&self, key: &SessionKey) -> Result<(), SessionError> {
        let bootstrap_failed = |reason: String| SessionError::BootstrapFailed {
            session_id: key.to_string(),
            reason,
        };

        let resp = self
            .client
            .post(self.session_url(key))
            .send()
            .await
            .map_err(|e| bootstrap_failed(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            debug!(session = %key, "Session created");
            Ok(())
        } else if status == StatusCode::CONFLICT || status == StatusCode::BAD_REQUEST {
            debug!(session = %key, status = status.as_u16(), "Session already exists");
            Ok(())
        } else {
            Err(bootstrap_failed(format!("HTTP {status}")))
        }
    }

    async fn run_turn(&self, key: &SessionKey, text: &str) -> Result<AgentReply, ChannelError> {
        let request = RunRequest {
            app_name: key.app_name.clone(),
            user_id: key.user_id.clone(),
            session_id: key.session_id.clone(),
            new_message: Content::text("user", text),
        };
        let resp = self
            .client
            .post(format!("{}/run", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError::Agent(format!("run returned HTTP {status}")));
        }
        let events: Vec<Event> = resp
            .json()
            .await
            .map_err(|e| ChannelError::InvalidMessage(e.to_string()))?;

        let texts: Vec<String> = events.iter().map(|e| e.content.joined_text()).collect();
        let flag = |f: fn(&EventActions) -> bool| {
            events.iter().filter_map(|e| e.actions.as_ref()).any(f)
        };
        Ok(AgentReply {
            messages: split_messages(texts.iter().map(String::as_str)),
            ended: flag(|a| a.end_conversation),
            internal_error: flag(|a| a.internal_error),
        })
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<(), ChannelError> {
        let resp = self
            .client
            .delete(self.session_url(key))
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            warn!(session = %key, status = status.as_u16(), "Session delete refused");
            Err(ChannelError::Http(format!("delete returned HTTP {status}")))
        }
    }
}
