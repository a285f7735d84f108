//! Extraction layer: turns free-form answers into typed session fields.
//!
//! These functions never touch the network. Validation failures are
//! reported as `ValidationError` and leave the session unchanged.

pub mod dates;

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::session::SessionState;

pub use dates::{find_date, parse_date};

/// Minimum number of digits accepted as a phone number.
pub const MIN_PHONE_DIGITS: usize = 7;

static PHONE_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\s().-]*\d").expect("valid phone regex"));

/// Whose name is being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Representative,
}

/// A name split into first name and the remaining surnames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
}

impl NameParts {
    pub fn split(raw: &str) -> Self {
        let mut parts = raw.split_whitespace();
        let first_name = parts.next().unwrap_or_default().to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");
        let full_name = if last_name.is_empty() {
            first_name.clone()
        } else {
            format!("{first_name} {last_name}")
        };
        Self {
            full_name,
            first_name,
            last_name,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.first_name.is_empty() && !self.last_name.is_empty()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// Store a full name for `role`. Returns the resulting `name_gathered` flag,
/// which is true only when both a first and a last name are present.
///
/// Capturing a representative name also marks the caller as a representative.
pub fn extract_full_name(state: &mut SessionState, role: Role, raw: &str) -> bool {
    let parts = NameParts::split(raw);
    let gathered = parts.is_complete();
    match role {
        Role::Customer => {
            let customer = &mut state.customer;
            customer.full_name = non_empty(parts.full_name);
            customer.first_name = non_empty(parts.first_name);
            customer.last_name = non_empty(parts.last_name);
            customer.name_gathered = gathered;
        }
        Role::Representative => {
            let rep = &mut state.representative;
            rep.is_representative = true;
            rep.full_name = non_empty(parts.full_name);
            rep.first_name = non_empty(parts.first_name);
            rep.last_name = non_empty(parts.last_name);
            rep.name_gathered = gathered;
        }
    }
    gathered
}

/// Parse a date of birth and store it as ISO `YYYY-MM-DD`.
pub fn extract_dob(state: &mut SessionState, raw: &str) -> Result<String, ValidationError> {
    let date = parse_date(raw).ok_or_else(|| ValidationError::UnparseableDate(raw.to_string()))?;
    let normalized = date.format("%Y-%m-%d").to_string();
    state.customer.dob = Some(normalized.clone());
    Ok(normalized)
}

/// Keep only the digits of a phone number and store them.
pub fn extract_phone(state: &mut SessionState, raw: &str) -> Result<String, ValidationError> {
    let digits = normalize_phone(raw)?;
    state.customer.phone = Some(digits.clone());
    Ok(digits)
}

/// Digits-only form of `raw`, without touching any session.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        return Err(ValidationError::PhoneTooShort {
            digits: digits.len(),
            min: MIN_PHONE_DIGITS,
        });
    }
    Ok(digits)
}

/// Find the longest phone-like run of digits and separators in `text`.
pub fn find_phone(text: &str) -> Option<&str> {
    PHONE_CANDIDATE
        .find_iter(text)
        .max_by_key(|m| m.as_str().chars().filter(|c| c.is_ascii_digit()).count())
        .map(|m| m.as_str())
}

/// Store the representative's relationship to the customer verbatim.
pub fn extract_relationship(state: &mut SessionState, raw: &str) {
    let rep = &mut state.representative;
    rep.relationship = Some(raw.trim().to_string());
    rep.relationship_gathered = true;
}

/// Clear the customer search so a new customer name can be searched.
pub fn reset_search(state: &mut SessionState) {
    state.case.client_search_attempted = false;
    state.case.client_search_errored = false;
    state.case.client_found = false;
    let customer = &mut state.customer;
    customer.full_name = None;
    customer.first_name = None;
    customer.last_name = None;
    customer.name_gathered = false;
}

/// The caller revealed, after a failed search, that the name they gave is
/// their own and they are calling for someone else.
///
/// Moves the captured customer name to the representative and resets the
/// search. Runs at most once per session; returns whether it ran.
pub fn reclassify_as_representative(state: &mut SessionState) -> bool {
    if state.case.reclassified {
        return false;
    }
    if let Some(name) = state.customer.full_name.clone() {
        extract_full_name(state, Role::Representative, &name);
    } else {
        state.representative.is_representative = true;
    }
    reset_search(state);
    state.case.reclassified = true;
    true
}
