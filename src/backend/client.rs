//! HTTP implementation of the record backend contract and the
//! session-aware `RecordClient` built on top of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::auth::TokenProvider;
use super::{CaseFields, Contact, FindOutcome, RecordApi, VerifyOutcome};
use crate::error::BackendError;
use crate::session::SessionState;

/// Per-operation time budgets. Each covers the token fetch and the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    /// find / verify.
    pub read: Duration,
    pub create_contact: Duration,
    pub create_case: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(10),
            create_contact: Duration::from_secs(20),
            create_case: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    contact: Option<Contact>,
    #[serde(default)]
    customer_service: Option<ServiceRef>,
}

#[derive(Debug, Deserialize)]
struct ServiceRef {
    #[serde(rename = "Id", default)]
    id: Option<String>,
}

impl ApiReply {
    fn rejected(self, operation: &str) -> BackendError {
        BackendError::Rejected {
            operation: operation.to_string(),
            message: self
                .message
                .unwrap_or_else(|| format!("unexpected status {:?}", self.status)),
        }
    }
}

/// What came back from one POST.
enum Reply {
    /// HTTP 404 on an endpoint where that means "no match".
    NotFound,
    Body(ApiReply),
}

/// Talks to the record backend over HTTPS.
///
/// The `reqwest::Client` is pooled and shared by all sessions.
pub struct HttpRecordApi {
    base_url: String,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    timeouts: RequestTimeouts,
}

impl HttpRecordApi {
    pub fn new(
        base_url: impl Into<String>,
        client: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
        timeouts: RequestTimeouts,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            tokens,
            timeouts,
        }
    }

    async fn post<B: Serialize + Sync>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
        budget: Duration,
        not_found_is_negative: bool,
    ) -> Result<Reply, BackendError> {
        let call = async {
            let token = self.tokens.token(&self.base_url).await?;

            let resp = self
                .client
                .post(format!("{}{path}", self.base_url))
                .bearer_auth(token.expose_secret())
                .json(body)
                .timeout(budget)
                .send()
                .await
                .map_err(|e| transport_error(operation, budget, e))?;

            let status = resp.status();
            if status == StatusCode::NOT_FOUND && not_found_is_negative {
                return Ok(Reply::NotFound);
            }
            if !status.is_success() {
                warn!(operation, status = status.as_u16(), "Record backend returned error status");
                return Err(BackendError::HttpStatus {
                    operation: operation.to_string(),
                    status: status.as_u16(),
                });
            }

            let reply = resp
                .json::<ApiReply>()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    operation: operation.to_string(),
                    reason: e.to_string(),
                })?;
            Ok::<_, BackendError>(Reply::Body(reply))
        };

        tokio::time::timeout(budget, call)
            .await
            .map_err(|_| BackendError::Timeout {
                operation: operation.to_string(),
                timeout: budget,
            })?
    }
}

fn transport_error(operation: &str, budget: Duration, e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout {
            operation: operation.to_string(),
            timeout: budget,
        }
    } else {
        BackendError::Unreachable {
            operation: operation.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl RecordApi for HttpRecordApi {
    async fn find_contact(&self, full_name: &str) -> Result<Option<Contact>, BackendError> {
        const OP: &str = "find_contact";
        let body = serde_json::json!({ "full_name": full_name });
        match self.post(OP, "/contact/find", &body, self.timeouts.read, true).await? {
            Reply::NotFound => Ok(None),
            Reply::Body(reply) => match reply.status.as_str() {
                "found" => reply.contact.map(Some).ok_or_else(|| BackendError::InvalidResponse {
                    operation: OP.to_string(),
                    reason: "found without contact".to_string(),
                }),
                "not_found" => Ok(None),
                _ => Err(reply.rejected(OP)),
            },
        }
    }

    async fn create_contact(&self, full_name: &str) -> Result<Contact, BackendError> {
        const OP: &str = "create_contact";
        let body = serde_json::json!({ "full_name": full_name });
        match self
            .post(OP, "/contact/create", &body, self.timeouts.create_contact, false)
            .await?
        {
            Reply::NotFound => Err(BackendError::HttpStatus {
                operation: OP.to_string(),
                status: 404,
            }),
            Reply::Body(reply) if reply.status == "created" => {
                reply.contact.ok_or_else(|| BackendError::InvalidResponse {
                    operation: OP.to_string(),
                    reason: "created without contact".to_string(),
                })
            }
            Reply::Body(reply) => Err(reply.rejected(OP)),
        }
    }

    async fn verify_dob(&self, full_name: &str, dob: &str) -> Result<bool, BackendError> {
        const OP: &str = "verify_dob";
        let body = serde_json::json!({ "full_name": full_name, "dob": dob });
        let reply = self
            .post(OP, "/contact/verify/dob", &body, self.timeouts.read, true)
            .await?;
        verification_result(OP, reply)
    }

    async fn verify_dob_phone(
        &self,
        full_name: &str,
        dob: &str,
        phone: &str,
    ) -> Result<bool, BackendError> {
        const OP: &str = "verify_dob_phone";
        let body = serde_json::json!({ "full_name": full_name, "dob": dob, "phone": phone });
        let reply = self
            .post(OP, "/contact/verify/dob-phone", &body, self.timeouts.read, true)
            .await?;
        verification_result(OP, reply)
    }

    async fn create_case(&self, fields: &CaseFields) -> Result<String, BackendError> {
        const OP: &str = "create_case";
        match self
            .post(OP, "/customer_service/create", fields, self.timeouts.create_case, false)
            .await?
        {
            Reply::NotFound => Err(BackendError::HttpStatus {
                operation: OP.to_string(),
                status: 404,
            }),
            Reply::Body(reply) if reply.status == "created" => reply
                .customer_service
                .and_then(|s| s.id)
                .ok_or_else(|| BackendError::InvalidResponse {
                    operation: OP.to_string(),
                    reason: "created without customer_service id".to_string(),
                }),
            Reply::Body(reply) => Err(reply.rejected(OP)),
        }
    }
}

fn verification_result(operation: &str, reply: Reply) -> Result<bool, BackendError> {
    match reply {
        Reply::NotFound => Ok(false),
        Reply::Body(reply) => match reply.status.as_str() {
            "verified" => Ok(true),
            "error" => Err(reply.rejected(operation)),
            _ => Ok(false),
        },
    }
}

fn required<'a>(operation: &str, field: &str, value: &'a Option<String>) -> Result<&'a str, BackendError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BackendError::MissingInput {
            operation: operation.to_string(),
            field: field.to_string(),
        })
}

/// Record backend operations with their session bookkeeping.
#[derive(Clone)]
pub struct RecordClient {
    api: Arc<dyn RecordApi>,
}

impl RecordClient {
    pub fn new(api: Arc<dyn RecordApi>) -> Self {
        Self { api }
    }

    /// Search by the customer's full name.
    ///
    /// Marks the search as attempted whatever happens. A transport failure
    /// leaves `client_found` false and sets `client_search_errored`.
    pub async fn find_contact(&self, state: &mut SessionState) -> Result<FindOutcome, BackendError> {
        state.case.client_search_attempted = true;
        state.case.client_found = false;

        let full_name = match required("find_contact", "full_name", &state.customer.full_name) {
            Ok(name) => name.to_string(),
            Err(e) => {
                state.case.client_search_errored = true;
                return Err(e);
            }
        };
        debug!(full_name = %full_name, "Searching contact");

        match self.api.find_contact(&full_name).await {
            Ok(Some(contact)) => {
                info!("Contact found");
                state.case.client_found = true;
                state.case.client_search_errored = false;
                state.account.id = contact.account_id.clone();
                Ok(FindOutcome {
                    found: true,
                    account_id: contact.account_id,
                })
            }
            Ok(None) => {
                info!("Contact not found");
                state.case.client_search_errored = false;
                Ok(FindOutcome {
                    found: false,
                    account_id: None,
                })
            }
            Err(e) => {
                warn!(error = %e, "Contact search failed");
                state.case.client_search_errored = true;
                Err(e)
            }
        }
    }

    /// Create a contact for the customer. A created contact counts as verified.
    pub async fn create_contact(&self, state: &mut SessionState) -> Result<Contact, BackendError> {
        const OP: &str = "create_contact";
        let full_name = required(OP, "full_name", &state.customer.full_name)?.to_string();

        let contact = self.api.create_contact(&full_name).await?;
        let Some(account_id) = contact.account_id.clone() else {
            return Err(BackendError::InvalidResponse {
                operation: OP.to_string(),
                reason: "created contact has no AccountId".to_string(),
            });
        };

        info!("Contact created");
        state.account.id = Some(account_id);
        state.case.client_verified = true;
        state.case.contact_created = true;
        Ok(contact)
    }

    /// Verify with name and date of birth. Spends one attempt.
    pub async fn verify_by_dob(&self, state: &mut SessionState) -> Result<VerifyOutcome, BackendError> {
        const OP: &str = "verify_dob";
        state.case.client_verification_attempted = true;
        let full_name = required(OP, "full_name", &state.customer.full_name)?.to_string();
        let dob = required(OP, "dob", &state.customer.dob)?.to_string();

        let attempts = self.spend_attempt(state);
        let result = self.api.verify_dob(&full_name, &dob).await;
        self.record_verification(state, attempts, result)
    }

    /// Verify with name, date of birth and phone. Spends one attempt from
    /// the same budget as `verify_by_dob`.
    pub async fn verify_by_dob_phone(
        &self,
        state: &mut SessionState,
    ) -> Result<VerifyOutcome, BackendError> {
        const OP: &str = "verify_dob_phone";
        state.case.client_verification_attempted = true;
        let full_name = required(OP, "full_name", &state.customer.full_name)?.to_string();
        let dob = required(OP, "dob", &state.customer.dob)?.to_string();
        let phone = required(OP, "phone", &state.customer.phone)?.to_string();

        let attempts = self.spend_attempt(state);
        let result = self.api.verify_dob_phone(&full_name, &dob, &phone).await;
        self.record_verification(state, attempts, result)
    }

    fn spend_attempt(&self, state: &mut SessionState) -> u32 {
        state.case.client_verification_attempts += 1;
        state.case.client_verification_attempts
    }

    fn record_verification(
        &self,
        state: &mut SessionState,
        attempts: u32,
        result: Result<bool, BackendError>,
    ) -> Result<VerifyOutcome, BackendError> {
        match result {
            Ok(verified) => {
                info!(attempt = attempts, verified, "Verification result");
                state.case.client_verified = verified;
                Ok(VerifyOutcome { verified, attempts })
            }
            Err(e) => {
                warn!(attempt = attempts, error = %e, "Verification call failed");
                state.case.client_verified = false;
                Err(e)
            }
        }
    }

    /// File the service case from the session's account and service fields.
    ///
    /// Fails with `MissingAccount` before any network call when no account
    /// id has been resolved.
    pub async fn create_case(&self, state: &mut SessionState) -> Result<String, BackendError> {
        const OP: &str = "create_case";
        let Some(account_id) = state.account.id.clone().filter(|id| !id.is_empty()) else {
            return Err(BackendError::MissingAccount);
        };

        let service = &state.service;
        let fields = CaseFields {
            account_id,
            call_type: required(OP, "call_type", &service.call_type)?.to_string(),
            relationship: required(OP, "relationship", &service.relationship)?.to_string(),
            fast_note: required(OP, "reason_contact", &service.reason_contact)?.to_string(),
            last_help_year: required(OP, "last_help_year", &service.last_help_year)?.to_string(),
            channel: required(OP, "channel", &service.channel)?.to_string(),
            client_type: required(OP, "client_type", &service.client_type)?.to_string(),
            mood: required(OP, "mood", &service.mood)?.to_string(),
        };

        let id = self.api.create_case(&fields).await?;
        info!(service_record_id = %id, "Service case created");
        state.case.customer_service_created = true;
        state.case.service_record_id = Some(id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Scripted backend that records every call.
    #[derive(Default)]
    struct ScriptedApi {
        found: Option<Contact>,
        fail_find: bool,
        verify: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl RecordApi for ScriptedApi {
        async fn find_contact(&self, _full_name: &str) -> Result<Option<Contact>, BackendError> {
            self.record("find");
            if self.fail_find {
                return Err(BackendError::Unreachable {
                    operation: "find_contact".into(),
                    reason: "connection refused".into(),
                });
            }
            Ok(self.found.clone())
        }
        async fn create_contact(&self, _full_name: &str) -> Result<Contact, BackendError> {
            self.record("create");
            Ok(Contact {
                id: Some("003NEW".into()),
                account_id: Some("001NEW".into()),
            })
        }
        async fn verify_dob(&self, _n: &str, _d: &str) -> Result<bool, BackendError> {
            self.record("verify_dob");
            Ok(self.verify)
        }
        async fn verify_dob_phone(&self, _n: &str, _d: &str, _p: &str) -> Result<bool, BackendError> {
            self.record("verify_dob_phone");
            Ok(self.verify)
        }
        async fn create_case(&self, _fields: &CaseFields) -> Result<String, BackendError> {
            self.record("create_case");
            Ok("a0CASE".into())
        }
    }

    fn named_state() -> SessionState {
        let mut state = SessionState::default();
        state.customer.full_name = Some("Ana Pérez".into());
        state
    }

    #[tokio::test]
    async fn find_sets_account_when_found() {
        let api = Arc::new(ScriptedApi {
            found: Some(Contact {
                id: Some("003A".into()),
                account_id: Some("001A".into()),
            }),
            ..Default::default()
        });
        let client = RecordClient::new(api);
        let mut state = named_state();

        let outcome = client.find_contact(&mut state).await.unwrap();
        assert!(outcome.found);
        assert!(state.case.client_found);
        assert!(state.case.client_search_attempted);
        assert_eq!(state.account.id.as_deref(), Some("001A"));
    }

    #[tokio::test]
    async fn find_transport_failure_marks_attempt_and_error() {
        let api = Arc::new(ScriptedApi {
            fail_find: true,
            ..Default::default()
        });
        let client = RecordClient::new(api);
        let mut state = named_state();
        state.case.client_found = true;

        assert!(client.find_contact(&mut state).await.is_err());
        assert!(state.case.client_search_attempted);
        assert!(state.case.client_search_errored);
        assert!(!state.case.client_found);
    }

    #[tokio::test]
    async fn verification_paths_share_one_counter() {
        let api = Arc::new(ScriptedApi::default());
        let client = RecordClient::new(api.clone());
        let mut state = named_state();
        state.customer.dob = Some("1995-08-23".into());
        state.customer.phone = Some("5551234567".into());

        let first = client.verify_by_dob(&mut state).await.unwrap();
        let second = client.verify_by_dob_phone(&mut state).await.unwrap();
        assert_eq!(first.attempts, 1);
        assert_eq!(second.attempts, 2);
        assert!(!second.verified);
        assert!(state.case.client_verification_attempted);
        assert_eq!(api.calls(), vec!["verify_dob", "verify_dob_phone"]);
    }

    #[tokio::test]
    async fn verification_without_dob_spends_nothing() {
        let api = Arc::new(ScriptedApi::default());
        let client = RecordClient::new(api.clone());
        let mut state = named_state();

        let err = client.verify_by_dob(&mut state).await.unwrap_err();
        assert!(matches!(err, BackendError::MissingInput { .. }));
        assert_eq!(state.case.client_verification_attempts, 0);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn created_contact_is_trusted() {
        let api = Arc::new(ScriptedApi::default());
        let client = RecordClient::new(api);
        let mut state = named_state();

        client.create_contact(&mut state).await.unwrap();
        assert!(state.case.client_verified);
        assert!(state.case.contact_created);
        assert_eq!(state.account.id.as_deref(), Some("001NEW"));
    }

    #[tokio::test]
    async fn create_case_without_account_makes_no_call() {
        let api = Arc::new(ScriptedApi::default());
        let client = RecordClient::new(api.clone());
        let mut state = named_state();

        let err = client.create_case(&mut state).await.unwrap_err();
        assert!(matches!(err, BackendError::MissingAccount));
        assert!(err.is_precondition());
        assert!(api.calls().is_empty());
        assert!(!state.case.customer_service_created);
    }
}
