//! Provider webhook endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::{AgentClient, AgentReply, SmsSender, sms_session_id, twiml};
use crate::dialogue::replies;
use crate::session::SessionKey;

/// Session user id for text conversations.
pub const SMS_USER: &str = "sms";
/// Session user id for calls.
pub const VOICE_USER: &str = "voice";

/// Shared state for the bridge routes.
#[derive(Clone)]
pub struct BridgeState {
    pub agent: Arc<dyn AgentClient>,
    pub sms: Arc<dyn SmsSender>,
    pub app_name: String,
    /// Language tag for `<Say>` and `<Gather>`.
    pub voice_language: String,
}

#[derive(Debug, Deserialize)]
struct SmsWebhook {
    #[serde(rename = "From", default)]
    from: Option<String>,
    #[serde(rename = "Body", default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceWebhook {
    #[serde(rename = "CallSid", default)]
    call_sid: Option<String>,
    #[serde(rename = "From", default)]
    from: Option<String>,
    #[serde(rename = "SpeechResult", default)]
    speech_result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TestSmsRequest {
    to: String,
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

/// Drop a finished conversation so the next contact starts fresh.
async fn close_if_ended(agent: &dyn AgentClient, key: &SessionKey, reply: &AgentReply) {
    if !reply.ended {
        return;
    }
    if let Err(e) = agent.delete_session(key).await {
        warn!(session = %key, error = %e, "Session cleanup failed");
    }
}

async fn send_all(sms: &dyn SmsSender, to: &str, messages: &[String]) {
    for message in messages {
        if let Err(e) = sms.send(to, message).await {
            error!(error = %e, "SMS reply not delivered");
            break;
        }
    }
}

/// POST /sms/receive
///
/// Replies go out through the SMS API, one message per line; the webhook
/// itself always answers with an empty response.
async fn sms_receive(State(state): State<BridgeState>, Form(hook): Form<SmsWebhook>) -> Response {
    let Some(from) = hook.from.filter(|f| !f.trim().is_empty()) else {
        warn!("SMS webhook without sender");
        return xml(twiml::empty());
    };
    let Some(session_id) = sms_session_id(&from) else {
        warn!("SMS webhook from a withheld number, ignored");
        return xml(twiml::empty());
    };
    let key = SessionKey::new(state.app_name.as_str(), SMS_USER, session_id);
    let body = hook.body.unwrap_or_default();
    info!(session = %key, "SMS received");

    if let Err(e) = state.agent.ensure_session(&key).await {
        error!(session = %key, error = %e, "Session bootstrap failed");
        send_all(state.sms.as_ref(), &from, &[replies::try_again_later()]).await;
        return xml(twiml::empty());
    }

    match state.agent.run_turn(&key, &body).await {
        Ok(reply) => {
            send_all(state.sms.as_ref(), &from, &reply.messages).await;
            close_if_ended(state.agent.as_ref(), &key, &reply).await;
        }
        Err(e) => {
            error!(session = %key, error = %e, "Turn failed");
            send_all(state.sms.as_ref(), &from, &[replies::try_again_later()]).await;
        }
    }
    xml(twiml::empty())
}

/// POST /voice/receive
///
/// Speaks the replies and gathers the next utterance, or hangs up when the
/// conversation is over or the turn could not run.
async fn voice_receive(
    State(state): State<BridgeState>,
    Form(hook): Form<VoiceWebhook>,
) -> Response {
    let language = state.voice_language.as_str();
    let fatal = || xml(twiml::say_and_hangup(&[replies::try_again_later()], language));

    let Some(call_sid) = hook.call_sid.filter(|s| !s.trim().is_empty()) else {
        warn!("Voice webhook without CallSid");
        return fatal();
    };
    let key = SessionKey::new(state.app_name.as_str(), VOICE_USER, format!("call-{call_sid}"));
    info!(
        session = %key,
        caller_known = hook.from.as_deref().is_some_and(|f| !f.is_empty()),
        "Voice turn received"
    );

    if let Err(e) = state.agent.ensure_session(&key).await {
        error!(session = %key, error = %e, "Session bootstrap failed");
        return fatal();
    }

    let speech = hook.speech_result.unwrap_or_default();
    match state.agent.run_turn(&key, &speech).await {
        Ok(reply) if reply.ended => {
            close_if_ended(state.agent.as_ref(), &key, &reply).await;
            xml(twiml::say_and_hangup(&reply.messages, language))
        }
        Ok(reply) => xml(twiml::gather(&reply.messages, language)),
        Err(e) => {
            error!(session = %key, error = %e, "Turn failed");
            fatal()
        }
    }
}

/// POST /send/sms
///
/// Sends a fixed message to check SMS connectivity.
async fn send_test_sms(
    State(state): State<BridgeState>,
    Json(req): Json<TestSmsRequest>,
) -> Response {
    let text = replies::conversation_closed();
    match state.sms.send(&req.to, &text).await {
        Ok(()) => Json(serde_json::json!({ "sent": true })).into_response(),
        Err(e) => {
            warn!(error = %e, "Test SMS failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "sms send failed" })),
            )
                .into_response()
        }
    }
}

/// Build the telephony webhook routes.
pub fn bridge_routes(state: BridgeState) -> Router {
    Router::new()
        .route("/sms/receive", post(sms_receive))
        .route("/voice/receive", post(voice_receive))
        .route("/send/sms", post(send_test_sms))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::error::{ChannelError, SessionError};

    /// Agent that answers every turn with a fixed reply.
    struct ScriptedAgent {
        reply: AgentReply,
        fail_bootstrap: bool,
        turns: Mutex<Vec<(String, String)>>,
        deleted: Mutex<Vec<String>>,
    }

    impl ScriptedAgent {
        fn replying(messages: &[&str], ended: bool) -> Self {
            Self {
                reply: AgentReply {
                    messages: messages.iter().map(|m| m.to_string()).collect(),
                    ended,
                    internal_error: false,
                },
                fail_bootstrap: false,
                turns: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AgentClient for ScriptedAgent {
        async fn ensure_session(&self, key: &SessionKey) -> Result<(), SessionError> {
            if self.fail_bootstrap {
                return Err(SessionError::BootstrapFailed {
                    session_id: key.to_string(),
                    reason: "HTTP 500".into(),
                });
            }
            Ok(())
        }
        async fn run_turn(&self, key: &SessionKey, text: &str) -> Result<AgentReply, ChannelError> {
            self.turns
                .lock()
                .unwrap()
                .push((key.session_id.clone(), text.to_string()));
            Ok(self.reply.clone())
        }
        async fn delete_session(&self, key: &SessionKey) -> Result<(), ChannelError> {
            self.deleted.lock().unwrap().push(key.session_id.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSms {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SmsSender for RecordingSms {
        async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn app(agent: Arc<ScriptedAgent>, sms: Arc<RecordingSms>) -> Router {
        bridge_routes(BridgeState {
            agent,
            sms,
            app_name: "sofia".into(),
            voice_language: "es-MX".into(),
        })
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn text_body(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn sms_replies_are_sent_one_per_message() {
        let agent = Arc::new(ScriptedAgent::replying(&["Hola.", "¿Su nombre?"], false));
        let sms = Arc::new(RecordingSms::default());
        let resp = app(agent.clone(), sms.clone())
            .oneshot(form("/sms/receive", "From=%2B15551234567&Body=Hola"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(text_body(resp).await, twiml::empty());
        assert_eq!(
            *agent.turns.lock().unwrap(),
            vec![("sms-15551234567".to_string(), "Hola".to_string())]
        );
        let sent = sms.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], ("+15551234567".to_string(), "Hola.".to_string()));
        assert_eq!(sent[1].1, "¿Su nombre?");
    }

    #[tokio::test]
    async fn sms_without_sender_is_ignored() {
        let agent = Arc::new(ScriptedAgent::replying(&["Hola."], false));
        let sms = Arc::new(RecordingSms::default());
        let resp = app(agent.clone(), sms.clone())
            .oneshot(form("/sms/receive", "Body=Hola"))
            .await
            .unwrap();
        assert_eq!(text_body(resp).await, twiml::empty());
        assert!(agent.turns.lock().unwrap().is_empty());
        assert!(sms.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sms_bootstrap_failure_sends_only_an_apology() {
        let mut scripted = ScriptedAgent::replying(&["Hola."], false);
        scripted.fail_bootstrap = true;
        let agent = Arc::new(scripted);
        let sms = Arc::new(RecordingSms::default());
        app(agent.clone(), sms.clone())
            .oneshot(form("/sms/receive", "From=%2B15551234567&Body=Hola"))
            .await
            .unwrap();

        assert!(agent.turns.lock().unwrap().is_empty());
        let sent = sms.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, replies::try_again_later());
    }

    #[tokio::test]
    async fn voice_turn_gathers_next_answer() {
        let agent = Arc::new(ScriptedAgent::replying(&["¿Con quién tengo el gusto?"], false));
        let resp = app(agent.clone(), Arc::new(RecordingSms::default()))
            .oneshot(form(
                "/voice/receive",
                "CallSid=CA42&From=%2B15551234567&SpeechResult=Soy+Ana+P%C3%A9rez",
            ))
            .await
            .unwrap();

        let body = text_body(resp).await;
        assert!(body.contains("<Gather"));
        assert!(body.contains("¿Con quién tengo el gusto?"));
        assert_eq!(
            *agent.turns.lock().unwrap(),
            vec![("call-CA42".to_string(), "Soy Ana Pérez".to_string())]
        );
    }

    #[tokio::test]
    async fn voice_terminal_turn_hangs_up_and_cleans_up() {
        let agent = Arc::new(ScriptedAgent::replying(&["Gracias por llamar."], true));
        let resp = app(agent.clone(), Arc::new(RecordingSms::default()))
            .oneshot(form("/voice/receive", "CallSid=CA42&From=%2B15551234567"))
            .await
            .unwrap();

        let body = text_body(resp).await;
        assert!(body.contains("<Hangup/>"));
        assert!(!body.contains("<Gather"));
        assert_eq!(*agent.deleted.lock().unwrap(), vec!["call-CA42".to_string()]);
    }

    #[tokio::test]
    async fn voice_bootstrap_failure_hangs_up() {
        let mut scripted = ScriptedAgent::replying(&["Hola."], false);
        scripted.fail_bootstrap = true;
        let agent = Arc::new(scripted);
        let resp = app(agent.clone(), Arc::new(RecordingSms::default()))
            .oneshot(form("/voice/receive", "CallSid=CA42"))
            .await
            .unwrap();

        let body = text_body(resp).await;
        assert!(body.contains("<Hangup/>"));
        assert!(body.contains(&twiml::escape_xml(&replies::try_again_later())));
        assert!(agent.turns.lock().unwrap().is_empty());
    }
}
