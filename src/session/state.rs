//! Typed conversation state persisted in the session store.
//!
//! Every field defaults to absent/false so that a document written by an
//! older build (or an empty document) deserializes into a valid state.

use serde::{Deserialize, Serialize};

/// The person the case is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name_gathered: bool,
    /// ISO `YYYY-MM-DD`.
    pub dob: Option<String>,
    /// Digits only.
    pub phone: Option<String>,
    pub email: Option<String>,
    pub ssn: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// The caller, when calling on behalf of the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Representative {
    pub is_representative: bool,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name_gathered: bool,
    pub relationship: Option<String>,
    pub relationship_gathered: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    /// Backend account identifier.
    pub id: Option<String>,
}

/// Search and verification bookkeeping for this conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseProgress {
    pub client_found: bool,
    pub client_search_attempted: bool,
    /// The last search failed at the transport layer.
    pub client_search_errored: bool,
    pub client_verified: bool,
    pub client_verification_attempted: bool,
    /// Shared by both verification paths. Never decremented.
    pub client_verification_attempts: u32,
    pub customer_service_created: bool,
    pub service_record_id: Option<String>,
    /// Set once the caller was moved from customer to representative.
    pub reclassified: bool,
    pub caller_is_new: bool,
    pub wants_account: bool,
    pub information_only: bool,
    /// A contact was created during this conversation.
    pub contact_created: bool,
    /// Verification ceiling reached; handed to a human.
    pub escalated: bool,
    /// Sofía has introduced herself.
    pub greeted: bool,
    /// Identify turns that produced no usable name.
    pub refusals: u32,
    /// Caller declined to continue; nothing more will be asked.
    pub conversation_closed: bool,
}

/// Fields assembled for the service case. Written once, just before filing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRecord {
    pub call_type: Option<String>,
    pub relationship: Option<String>,
    pub reason_contact: Option<String>,
    pub last_help_year: Option<String>,
    pub channel: Option<String>,
    pub client_type: Option<String>,
    pub mood: Option<String>,
}

/// Full per-session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub customer: Customer,
    pub representative: Representative,
    pub account: Account,
    pub case: CaseProgress,
    pub service: ServiceRecord,
}

impl SessionState {
    /// Decode a stored document. `null` and unknown keys are tolerated.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Name of whoever is on the line, for addressing the caller.
    pub fn caller_first_name(&self) -> Option<&str> {
        if self.representative.is_representative {
            self.representative.first_name.as_deref()
        } else {
            self.customer.first_name.as_deref()
        }
        .filter(|s| !s.is_empty())
    }
}
