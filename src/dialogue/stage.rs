//! Conversation stage, derived from session flags on every turn.
//!
//! The stage is never stored. `derive_stage` evaluates an ordered list of
//! predicates and returns the first that holds; the predicates are also
//! written to be mutually exclusive, so the order only documents intent.

use serde::{Deserialize, Serialize};

use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No usable customer name yet.
    Identify,
    /// Customer name known, search not yet run (or last search errored).
    Search,
    /// Search came back empty; find out who the caller is.
    Disambiguate,
    /// Customer found, identity not yet confirmed.
    Verify,
    /// Verified; gather the case details and file the case.
    CollectCase,
    /// Verification budget exhausted; a human takes over.
    Escalated,
    /// Case filed, or the caller ended the conversation.
    Done,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Escalated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Identify => "identify",
            Stage::Search => "search",
            Stage::Disambiguate => "disambiguate",
            Stage::Verify => "verify",
            Stage::CollectCase => "collect_case",
            Stage::Escalated => "escalated",
            Stage::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_done(s: &SessionState) -> bool {
    s.case.customer_service_created || s.case.conversation_closed
}

fn is_escalated(s: &SessionState) -> bool {
    !is_done(s) && s.case.escalated
}

fn is_collect_case(s: &SessionState) -> bool {
    !is_done(s) && !s.case.escalated && s.case.client_verified
}

fn is_verify(s: &SessionState) -> bool {
    !is_done(s) && !s.case.escalated && !s.case.client_verified && s.case.client_found
}

fn is_disambiguate(s: &SessionState) -> bool {
    !is_done(s)
        && !s.case.escalated
        && !s.case.client_verified
        && !s.case.client_found
        && s.case.client_search_attempted
        && !s.case.client_search_errored
}

fn is_search(s: &SessionState) -> bool {
    !is_done(s)
        && !s.case.escalated
        && !s.case.client_verified
        && !s.case.client_found
        && s.customer.name_gathered
        && (!s.case.client_search_attempted || s.case.client_search_errored)
}

/// Ordered predicate list. First match wins.
const STAGE_PREDICATES: &[(Stage, fn(&SessionState) -> bool)] = &[
    (Stage::Done, is_done),
    (Stage::Escalated, is_escalated),
    (Stage::CollectCase, is_collect_case),
    (Stage::Verify, is_verify),
    (Stage::Disambiguate, is_disambiguate),
    (Stage::Search, is_search),
];

/// Compute the current stage from stored flags alone.
pub fn derive_stage(state: &SessionState) -> Stage {
    STAGE_PREDICATES
        .iter()
        .find(|(_, holds)| holds(state))
        .map(|(stage, _)| *stage)
        .unwrap_or(Stage::Identify)
}

/// Verification retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// Attempts made with DOB alone before phone is also requested.
    pub dob_only_attempts: u32,
    /// Total attempts across both factors before escalating to a human.
    pub max_attempts: u32,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            dob_only_attempts: 3,
            max_attempts: 5,
        }
    }
}

/// What to ask for on the next verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFactor {
    DobOnly,
    DobAndPhone,
}

impl VerificationPolicy {
    /// Factor for the next attempt, given attempts already spent.
    pub fn factor(&self, attempts: u32) -> VerificationFactor {
        if attempts < self.dob_only_attempts {
            VerificationFactor::DobOnly
        } else {
            VerificationFactor::DobAndPhone
        }
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
