//! Client for the external customer-record service.
//!
//! `RecordApi` is the raw REST contract (one method per endpoint) and is
//! the seam tests stub out. `RecordClient` layers session bookkeeping on
//! top of it: which flags each operation sets, and when the shared
//! verification counter moves.

pub mod auth;
pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub use auth::{MetadataTokenProvider, StaticTokenProvider, TokenProvider};
pub use client::{HttpRecordApi, RecordClient};

/// A contact as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "Id", default)]
    pub id: Option<String>,
    #[serde(rename = "AccountId", default)]
    pub account_id: Option<String>,
}

/// Fields filed with a service case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFields {
    #[serde(rename = "AccountId")]
    pub account_id: String,
    #[serde(rename = "CallType")]
    pub call_type: String,
    #[serde(rename = "Relationship")]
    pub relationship: String,
    #[serde(rename = "FastNote")]
    pub fast_note: String,
    #[serde(rename = "LastHelpYear")]
    pub last_help_year: String,
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "ClientType")]
    pub client_type: String,
    #[serde(rename = "Mood")]
    pub mood: String,
}

/// Outcome of `RecordClient::find_contact`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOutcome {
    pub found: bool,
    pub account_id: Option<String>,
}

/// Outcome of either verification path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub verified: bool,
    /// Value of the shared attempts counter after this call.
    pub attempts: u32,
}

/// Raw record backend operations.
///
/// Negative results (not found, not verified) are `Ok`. Only transport,
/// auth, and logical backend errors are `Err`.
#[async_trait]
pub trait RecordApi: Send + Sync {
    async fn find_contact(&self, full_name: &str) -> Result<Option<Contact>, BackendError>;

    async fn create_contact(&self, full_name: &str) -> Result<Contact, BackendError>;

    async fn verify_dob(&self, full_name: &str, dob: &str) -> Result<bool, BackendError>;

    async fn verify_dob_phone(
        &self,
        full_name: &str,
        dob: &str,
        phone: &str,
    ) -> Result<bool, BackendError>;

    /// File a service case, returning the new record id.
    async fn create_case(&self, fields: &CaseFields) -> Result<String, BackendError>;
}
