//! REST endpoints for the agent host.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use super::{Content, Event, EventActions, RunRequest};
use crate::dialogue::{DialogueEngine, TurnOutcome};
use crate::error::SessionError;
use crate::session::{CreateOutcome, SessionKey};

/// Author name on every event the agent emits.
pub const AGENT_AUTHOR: &str = "sofia";

/// Shared state for the agent routes.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<DialogueEngine>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sofia-intake"
    }))
}

/// POST /apps/{app}/users/{user}/sessions/{session}
///
/// 200 when created, 409 when the session already exists.
async fn create_session(
    State(state): State<ApiState>,
    Path((app, user, session)): Path<(String, String, String)>,
) -> Response {
    let key = SessionKey::new(app, user, session);
    match state.engine.store().create(&key).await {
        Ok(CreateOutcome::Created) => {
            info!(session = %key, "Session created");
            Json(serde_json::json!({ "created": true })).into_response()
        }
        Ok(CreateOutcome::AlreadyExists) => {
            error_response(StatusCode::CONFLICT, "session already exists")
        }
        Err(e) => {
            error!(session = %key, error = %e, "Session create failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "session create failed")
        }
    }
}

/// GET /apps/{app}/users/{user}/sessions/{session}
async fn get_session(
    State(state): State<ApiState>,
    Path((app, user, session)): Path<(String, String, String)>,
) -> Response {
    let key = SessionKey::new(app, user, session);
    match state.engine.store().load(&key).await {
        Ok(Some(session_state)) => Json(serde_json::json!({
            "app_name": key.app_name,
            "user_id": key.user_id,
            "id": key.session_id,
            "state": session_state,
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "session not found"),
        Err(e) => {
            error!(session = %key, error = %e, "Session load failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "session load failed")
        }
    }
}

/// DELETE /apps/{app}/users/{user}/sessions/{session}
async fn delete_session(
    State(state): State<ApiState>,
    Path((app, user, session)): Path<(String, String, String)>,
) -> Response {
    let key = SessionKey::new(app, user, session);
    match state.engine.store().delete(&key).await {
        Ok(true) => {
            info!(session = %key, "Session deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "session not found"),
        Err(e) => {
            error!(session = %key, error = %e, "Session delete failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "session delete failed")
        }
    }
}

/// POST /run
///
/// Runs one turn and returns one event per reply message.
async fn run(State(state): State<ApiState>, Json(req): Json<RunRequest>) -> Response {
    let key = SessionKey::new(req.app_name, req.user_id, req.session_id);
    let text = req.new_message.joined_text();

    match state.engine.handle_turn(&key, &text).await {
        Ok(outcome) => Json(events_for(outcome)).into_response(),
        Err(SessionError::NotFound { .. }) => {
            error_response(StatusCode::NOT_FOUND, "session not found")
        }
        Err(e) => {
            error!(session = %key, error = %e, "Turn failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "turn failed")
        }
    }
}

fn event(content: Content) -> Event {
    Event {
        id: Uuid::new_v4().to_string(),
        author: AGENT_AUTHOR.to_string(),
        content,
        actions: None,
    }
}

/// One event per reply. Flags ride on the last event; a turn with no
/// replies still gets an empty event when there are flags to carry.
fn events_for(outcome: TurnOutcome) -> Vec<Event> {
    let mut events: Vec<Event> = outcome
        .replies
        .into_iter()
        .map(|text| event(Content::text("model", text)))
        .collect();

    if outcome.ended || outcome.internal_error {
        if events.is_empty() {
            events.push(event(Content {
                role: "model".to_string(),
                parts: Vec::new(),
            }));
        }
        if let Some(last) = events.last_mut() {
            last.actions = Some(EventActions {
                end_conversation: outcome.ended,
                internal_error: outcome.internal_error,
            });
        }
    }
    events
}

/// Build the agent host routes.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/run", post(run))
        .route(
            "/apps/{app}/users/{user}/sessions/{session}",
            post(create_session).get(get_session).delete(delete_session),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::backend::{CaseFields, Contact, RecordApi, RecordClient};
    use crate::dialogue::{RuleInterpreter, Stage};
    use crate::dialogue::replies;
    use crate::error::BackendError;
    use crate::session::{LibSqlSessionStore, SessionStore};

    /// Backend that knows nobody.
    struct EmptyBackend;

    #[async_trait]
    impl RecordApi for EmptyBackend {
        async fn find_contact(&self, _n: &str) -> Result<Option<Contact>, BackendError> {
            Ok(None)
        }
        async fn create_contact(&self, _n: &str) -> Result<Contact, BackendError> {
            Ok(Contact {
                id: Some("003N".into()),
                account_id: Some("001N".into()),
            })
        }
        async fn verify_dob(&self, _n: &str, _d: &str) -> Result<bool, BackendError> {
            Ok(false)
        }
        async fn verify_dob_phone(&self, _n: &str, _d: &str, _p: &str) -> Result<bool, BackendError> {
            Ok(false)
        }
        async fn create_case(&self, _f: &CaseFields) -> Result<String, BackendError> {
            Ok("a0C".into())
        }
    }

    async fn app() -> Router {
        let store: Arc<dyn SessionStore> = Arc::new(LibSqlSessionStore::new_memory().await.unwrap());
        let engine = DialogueEngine::new(
            store,
            RecordClient::new(Arc::new(EmptyBackend)),
            Arc::new(RuleInterpreter::new()),
        );
        api_routes(ApiState {
            engine: Arc::new(engine),
        })
    }

    fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const SESSION: &str = "/apps/sofia/users/sms/sessions/sms-5551234567";

    fn run_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "app_name": "sofia",
            "user_id": "sms",
            "session_id": "sms-5551234567",
            "new_message": { "role": "user", "parts": [{ "text": text }] }
        })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let resp = app().await.oneshot(request("GET", "/health", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn create_session_twice_conflicts() {
        let app = app().await;
        let resp = app.clone().oneshot(request("POST", SESSION, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["created"], true);

        let resp = app.oneshot(request("POST", SESSION, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn get_and_delete_session() {
        let app = app().await;
        let resp = app.clone().oneshot(request("GET", SESSION, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        app.clone().oneshot(request("POST", SESSION, None)).await.unwrap();
        let resp = app.clone().oneshot(request("GET", SESSION, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["state"]["case"]["client_found"], false);

        let resp = app.clone().oneshot(request("DELETE", SESSION, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app.oneshot(request("DELETE", SESSION, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn run_unknown_session_is_404() {
        let resp = app()
            .await
            .oneshot(request("POST", "/run", Some(run_body("Hola"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn run_returns_one_event_per_reply() {
        let app = app().await;
        app.clone().oneshot(request("POST", SESSION, None)).await.unwrap();

        let resp = app
            .oneshot(request("POST", "/run", Some(run_body("Soy Luis Herrera"))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let events: Vec<Event> = serde_json::from_value(json_body(resp).await).unwrap();
        let texts: Vec<String> = events.iter().map(|e| e.content.joined_text()).collect();
        assert_eq!(
            texts,
            vec![
                replies::introduction(),
                replies::searching(Some("Luis")),
                replies::not_found("Luis Herrera"),
            ]
        );
        assert!(events.iter().all(|e| e.content.role == "model"));
        assert!(events.iter().all(|e| e.actions.is_none()));
    }

    #[test]
    fn silent_final_turn_still_carries_actions() {
        let events = events_for(TurnOutcome {
            replies: Vec::new(),
            stage: Stage::Escalated,
            ended: true,
            internal_error: false,
        });
        assert_eq!(events.len(), 1);
        assert!(events[0].content.parts.is_empty());
        assert_eq!(events[0].content.joined_text(), "");
        let actions = events[0].actions.as_ref().unwrap();
        assert!(actions.end_conversation);
        assert!(!actions.internal_error);
    }

    #[test]
    fn actions_only_on_last_event() {
        let events = events_for(TurnOutcome {
            replies: vec!["uno".into(), "dos".into()],
            stage: Stage::Done,
            ended: true,
            internal_error: true,
        });
        assert!(events[0].actions.is_none());
        let actions = events[1].actions.as_ref().unwrap();
        assert!(actions.end_conversation && actions.internal_error);

        let quiet = events_for(TurnOutcome {
            replies: Vec::new(),
            stage: Stage::Identify,
            ended: false,
            internal_error: false,
        });
        assert!(quiet.is_empty());
    }
}
