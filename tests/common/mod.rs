//! Shared fixtures: a stub record backend served over real HTTP.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use sofia_intake::bridge::SmsSender;
use sofia_intake::error::ChannelError;

pub const ANA: &str = "Ana Pérez";
pub const ANA_ACCOUNT: &str = "001ANA";
pub const ANA_DOB: &str = "1995-08-23";
pub const ANA_PHONE: &str = "5551234567";
/// Name the stub answers with HTTP 404.
pub const UNKNOWN_404: &str = "Luis Herrera";
/// Name the stub answers slowly.
pub const SLOW: &str = "Lento Despacio";

/// Everything the stub backend saw.
#[derive(Default)]
pub struct StubBackend {
    pub requests: AtomicUsize,
    pub authorization: Mutex<Vec<String>>,
    pub cases: Mutex<Vec<Value>>,
}

impl StubBackend {
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn seen(&self, headers: &HeaderMap) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.authorization.lock().unwrap().push(auth.to_string());
        }
    }
}

fn field<'a>(body: &'a Value, key: &str) -> &'a str {
    body.get(key).and_then(Value::as_str).unwrap_or_default()
}

async fn find(
    State(stub): State<Arc<StubBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.seen(&headers);
    match field(&body, "full_name") {
        ANA => Json(json!({
            "status": "found",
            "contact": { "Id": "003ANA", "AccountId": ANA_ACCOUNT }
        }))
        .into_response(),
        UNKNOWN_404 => StatusCode::NOT_FOUND.into_response(),
        SLOW => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({ "status": "not_found" })).into_response()
        }
        _ => Json(json!({ "status": "not_found" })).into_response(),
    }
}

async fn create_contact(
    State(stub): State<Arc<StubBackend>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> Response {
    stub.seen(&headers);
    Json(json!({
        "status": "created",
        "contact": { "Id": "003NEW", "AccountId": "001NEW" }
    }))
    .into_response()
}

async fn verify_dob(
    State(stub): State<Arc<StubBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.seen(&headers);
    if field(&body, "full_name") == ANA && field(&body, "dob") == ANA_DOB {
        Json(json!({ "status": "verified", "contact": { "Id": "003ANA" } })).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn verify_dob_phone(
    State(stub): State<Arc<StubBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.seen(&headers);
    let matches = field(&body, "full_name") == ANA
        && field(&body, "dob") == ANA_DOB
        && field(&body, "phone") == ANA_PHONE;
    let status = if matches { "verified" } else { "not_verified" };
    Json(json!({ "status": status })).into_response()
}

async fn create_case(
    State(stub): State<Arc<StubBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.seen(&headers);
    stub.cases.lock().unwrap().push(body);
    Json(json!({ "status": "created", "customer_service": { "Id": "a0CASE1" } })).into_response()
}

/// Serve a router on a random local port.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://127.0.0.1:{port}")
}

/// Start the stub record backend. Returns its base URL.
pub async fn start_backend() -> (String, Arc<StubBackend>) {
    let stub = Arc::new(StubBackend::default());
    let app = Router::new()
        .route("/contact/find", post(find))
        .route("/contact/create", post(create_contact))
        .route("/contact/verify/dob", post(verify_dob))
        .route("/contact/verify/dob-phone", post(verify_dob_phone))
        .route("/customer_service/create", post(create_case))
        .with_state(Arc::clone(&stub));
    (serve(app).await, stub)
}

/// SMS sender that keeps what it was asked to send.
#[derive(Default)]
pub struct RecordingSms {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSms {
    pub fn take(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .drain(..)
            .map(|(_, body)| body)
            .collect()
    }
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(())
    }
}
