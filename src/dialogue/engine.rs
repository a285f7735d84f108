//! Turn processing for the intake conversation.
//!
//! Each turn loads the session, runs stage handlers until one needs the
//! caller's next answer, then saves. A handler either waits for input or
//! hands over to the stage its changes produced, so one utterance that
//! carries several facts can move the conversation through several stages.

use std::sync::Arc;

use chrono::Datelike;
use tracing::{debug, error, info, warn};

use super::interpreter::{Intent, Interpretation, UtteranceInterpreter};
use super::replies;
use super::service_record::{
    CALL_TYPE_INBOUND, ClientType, ContactChannel, Mood, RELATIONSHIP_SELF,
};
use super::stage::{Stage, VerificationFactor, VerificationPolicy, derive_stage};
use crate::backend::{RecordClient, VerifyOutcome};
use crate::error::{BackendError, SessionError};
use crate::extraction::{
    self, Role, extract_dob, extract_full_name, extract_phone, extract_relationship, find_date,
    find_phone,
};
use crate::session::{SessionKey, SessionState, SessionStore};

/// Identify turns without a usable name before the conversation is closed.
const MAX_REFUSALS: u32 = 3;

/// Upper bound on stage handlers run for a single turn.
const MAX_STEPS: usize = 8;

/// What one turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Messages for the caller, in order.
    pub replies: Vec<String>,
    /// Stage after the turn.
    pub stage: Stage,
    /// Nothing further will be asked.
    pub ended: bool,
    /// Something the caller can't fix went wrong and was logged.
    pub internal_error: bool,
}

enum Step {
    /// The stage changed; run the next handler.
    Continue,
    /// Waiting for the caller.
    Wait,
}

/// Mutable working set for one turn.
struct Turn<'a> {
    key: &'a SessionKey,
    state: SessionState,
    input: Option<String>,
    replies: Vec<String>,
    internal_error: bool,
}

impl Turn<'_> {
    /// Take the caller's text. Only the first handler of a turn sees it.
    fn take_input(&mut self) -> Option<String> {
        self.input.take().filter(|text| !text.is_empty())
    }

    fn say(&mut self, reply: String) {
        self.replies.push(reply);
    }
}

/// Drives sessions through the intake stages.
pub struct DialogueEngine {
    store: Arc<dyn SessionStore>,
    records: RecordClient,
    interpreter: Arc<dyn UtteranceInterpreter>,
    policy: VerificationPolicy,
    reference_year: i32,
}

impl DialogueEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        records: RecordClient,
        interpreter: Arc<dyn UtteranceInterpreter>,
    ) -> Self {
        Self {
            store,
            records,
            interpreter,
            policy: VerificationPolicy::default(),
            reference_year: chrono::Utc::now().year(),
        }
    }

    pub fn with_policy(mut self, policy: VerificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Year the client-type bands are measured from.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Process one caller message for an existing session.
    pub async fn handle_turn(&self, key: &SessionKey, text: &str) -> Result<TurnOutcome, SessionError> {
        let state = self
            .store
            .load(key)
            .await?
            .ok_or_else(|| SessionError::NotFound {
                session_id: key.to_string(),
            })?;

        let mut turn = Turn {
            key,
            state,
            input: Some(text.trim().to_string()),
            replies: Vec::new(),
            internal_error: false,
        };

        for _ in 0..MAX_STEPS {
            let stage = derive_stage(&turn.state);
            let step = match stage {
                Stage::Identify => self.identify(&mut turn).await,
                Stage::Search => self.search(&mut turn).await,
                Stage::Disambiguate => self.disambiguate(&mut turn).await,
                Stage::Verify => self.verify(&mut turn).await,
                Stage::CollectCase => self.collect_case(&mut turn).await,
                Stage::Escalated => self.escalated(&mut turn),
                Stage::Done => self.done(&mut turn),
            };
            debug!(session = %key, stage = %stage, "Stage handled");
            if matches!(step, Step::Wait) || derive_stage(&turn.state) == stage {
                break;
            }
        }

        self.store.save(key, &turn.state).await?;

        let stage = derive_stage(&turn.state);
        info!(
            session = %key,
            stage = %stage,
            replies = turn.replies.len(),
            "Turn complete"
        );
        Ok(TurnOutcome {
            replies: turn.replies,
            stage,
            ended: stage.is_terminal(),
            internal_error: turn.internal_error,
        })
    }

    async fn identify(&self, turn: &mut Turn<'_>) -> Step {
        let first_turn = !turn.state.case.greeted;
        turn.state.case.greeted = true;

        let Some(text) = turn.take_input() else {
            let reply = if first_turn {
                replies::greeting()
            } else {
                name_prompt(&turn.state)
            };
            turn.say(reply);
            return Step::Wait;
        };

        let reading = self.interpreter.interpret(&text).await;
        let progressed = apply_identity(&mut turn.state, &reading);

        if first_turn {
            turn.say(if progressed {
                replies::introduction()
            } else {
                replies::greeting()
            });
        }

        if turn.state.customer.name_gathered {
            turn.state.case.refusals = 0;
            return Step::Continue;
        }
        if progressed {
            turn.state.case.refusals = 0;
            let prompt = name_prompt(&turn.state);
            turn.say(prompt);
            return Step::Wait;
        }
        if first_turn {
            return Step::Wait;
        }

        turn.state.case.refusals += 1;
        if turn.state.case.refusals >= MAX_REFUSALS {
            info!(session = %turn.key, refusals = turn.state.case.refusals, "Caller declined to identify");
            turn.state.case.conversation_closed = true;
            turn.say(replies::refusal_goodbye());
            return Step::Wait;
        }
        let prompt = name_prompt(&turn.state);
        turn.say(prompt);
        Step::Wait
    }

    async fn search(&self, turn: &mut Turn<'_>) -> Step {
        // Only reached with input after a failed search; the caller may have
        // corrected the name in the meantime.
        if let Some(text) = turn.take_input() {
            let reading = self.interpreter.interpret(&text).await;
            if reading.mentions_a_name() {
                let mut corrected = turn.state.clone();
                apply_identity(&mut corrected, &reading);
                if corrected.customer.name_gathered {
                    debug!(session = %turn.key, "Name updated before retrying search");
                    turn.state = corrected;
                }
            } else {
                debug!(session = %turn.key, "Retrying search with the stored name");
            }
        }
        let caller = turn.state.caller_first_name().map(str::to_string);
        turn.say(replies::searching(caller.as_deref()));

        match self.records.find_contact(&mut turn.state).await {
            Ok(outcome) => {
                let is_rep = turn.state.representative.is_representative;
                let full_name = turn.state.customer.full_name.clone().unwrap_or_default();
                let reply = match (outcome.found, is_rep) {
                    (true, false) => {
                        let first = turn.state.customer.first_name.clone().unwrap_or_default();
                        replies::found_customer(&first)
                    }
                    (true, true) => replies::found_for_representative(&full_name),
                    (false, false) => replies::not_found(&full_name),
                    (false, true) => replies::not_found_for_representative(&full_name),
                };
                turn.say(reply);
            }
            Err(e) => {
                self.backend_failed(turn, "find_contact", &e);
                turn.say(replies::apology());
            }
        }
        Step::Wait
    }

    async fn disambiguate(&self, turn: &mut Turn<'_>) -> Step {
        let Some(text) = turn.take_input() else {
            let prompt = disambiguation_prompt(&turn.state);
            turn.say(prompt);
            return Step::Wait;
        };
        let reading = self.interpreter.interpret(&text).await;
        let state = &mut turn.state;

        if state.case.caller_is_new {
            let declines = reading.has(Intent::InformationOnly) || reading.has(Intent::Deny);
            if reading.has(Intent::CreateAccount)
                || reading.has(Intent::Affirm)
                || (state.case.wants_account && !declines)
            {
                state.case.wants_account = true;
                return self.create_contact(turn).await;
            }
            if declines {
                state.case.wants_account = false;
                state.case.information_only = true;
                turn.say(replies::information());
                return Step::Wait;
            }
            turn.say(replies::new_customer_options());
            return Step::Wait;
        }

        let new_name = reading
            .third_party_name
            .clone()
            .or_else(|| reading.bare_name.clone());

        if !state.representative.is_representative && reading.speaks_for_someone_else() {
            if extraction::reclassify_as_representative(state) {
                info!(session = %turn.key, "Caller reclassified as representative");
                if let Some(speaker) = &reading.speaker_name {
                    extract_full_name(state, Role::Representative, speaker);
                }
                if let Some(rel) = &reading.relationship {
                    extract_relationship(state, rel);
                }
                if let Some(client) = new_name {
                    extract_full_name(state, Role::Customer, &client);
                    if state.customer.name_gathered {
                        return Step::Continue;
                    }
                }
                turn.say(replies::reclassified());
                return Step::Wait;
            }
            state.representative.is_representative = true;
        }

        if let Some(name) = new_name {
            extraction::reset_search(state);
            extract_full_name(state, Role::Customer, &name);
            if state.customer.name_gathered {
                return Step::Continue;
            }
            let prompt = name_prompt(state);
            turn.say(prompt);
            return Step::Wait;
        }

        if reading.has(Intent::NewCustomer) {
            state.case.caller_is_new = true;
            if reading.has(Intent::CreateAccount) {
                state.case.wants_account = true;
                return self.create_contact(turn).await;
            }
            turn.say(replies::new_customer_options());
            return Step::Wait;
        }

        let prompt = disambiguation_prompt(state);
        turn.say(prompt);
        Step::Wait
    }

    async fn create_contact(&self, turn: &mut Turn<'_>) -> Step {
        match self.records.create_contact(&mut turn.state).await {
            Ok(_) => turn.say(replies::contact_created()),
            Err(e) => {
                self.backend_failed(turn, "create_contact", &e);
                turn.say(replies::contact_creation_failed());
            }
        }
        Step::Wait
    }

    async fn verify(&self, turn: &mut Turn<'_>) -> Step {
        let attempts = turn.state.case.client_verification_attempts;
        if self.policy.exhausted(attempts) {
            self.escalate(turn, attempts);
            return Step::Wait;
        }

        let factor = self.policy.factor(attempts);
        let Some(text) = turn.take_input() else {
            turn.say(match factor {
                VerificationFactor::DobOnly => replies::ask_dob(),
                VerificationFactor::DobAndPhone => replies::ask_dob_and_phone(),
            });
            return Step::Wait;
        };

        let result = match factor {
            VerificationFactor::DobOnly => {
                if extract_dob(&mut turn.state, &text).is_err() {
                    turn.say(replies::unparseable_dob());
                    return Step::Wait;
                }
                self.records.verify_by_dob(&mut turn.state).await
            }
            VerificationFactor::DobAndPhone => {
                let rest = match find_date(&text) {
                    Some((_, span)) => {
                        if extract_dob(&mut turn.state, &text[span.clone()]).is_err() {
                            turn.say(replies::unparseable_dob());
                            return Step::Wait;
                        }
                        format!("{} {}", &text[..span.start], &text[span.end..])
                    }
                    None if turn.state.customer.dob.is_some() => text.clone(),
                    None => {
                        turn.say(replies::unparseable_dob());
                        return Step::Wait;
                    }
                };
                let Some(candidate) = find_phone(&rest) else {
                    turn.say(replies::ask_phone());
                    return Step::Wait;
                };
                if extract_phone(&mut turn.state, candidate).is_err() {
                    turn.say(replies::invalid_phone());
                    return Step::Wait;
                }
                self.records.verify_by_dob_phone(&mut turn.state).await
            }
        };

        self.after_verification(turn, factor, result);
        Step::Wait
    }

    fn after_verification(
        &self,
        turn: &mut Turn<'_>,
        tried: VerificationFactor,
        result: Result<VerifyOutcome, BackendError>,
    ) {
        let attempts = turn.state.case.client_verification_attempts;
        match result {
            Ok(outcome) if outcome.verified => {
                let caller = turn.state.caller_first_name().map(str::to_string);
                turn.say(replies::verified(caller.as_deref()));
            }
            Ok(outcome) => {
                if self.policy.exhausted(outcome.attempts) {
                    self.escalate(turn, outcome.attempts);
                    return;
                }
                turn.say(match (tried, self.policy.factor(outcome.attempts)) {
                    (_, VerificationFactor::DobOnly) => replies::dob_mismatch(),
                    (VerificationFactor::DobOnly, VerificationFactor::DobAndPhone) => {
                        replies::ask_dob_and_phone()
                    }
                    (VerificationFactor::DobAndPhone, VerificationFactor::DobAndPhone) => {
                        replies::dob_phone_mismatch()
                    }
                });
            }
            Err(e) => {
                self.backend_failed(turn, "verify", &e);
                if self.policy.exhausted(attempts) {
                    self.escalate(turn, attempts);
                } else {
                    turn.say(replies::apology());
                }
            }
        }
    }

    fn escalate(&self, turn: &mut Turn<'_>, attempts: u32) {
        warn!(session = %turn.key, attempts, "Verification ceiling reached, escalating");
        turn.state.case.escalated = true;
        turn.say(replies::escalated());
    }

    async fn collect_case(&self, turn: &mut Turn<'_>) -> Step {
        let input = turn.take_input();

        if let Some(text) = input {
            let state = &mut turn.state;
            if state.service.reason_contact.is_none() {
                let mood = self.interpreter.mood(&text).await;
                state.service.reason_contact = Some(text);
                state.service.mood = Some(mood.label().to_string());
                turn.say(replies::ask_last_help_year());
                return Step::Wait;
            }
            if state.service.last_help_year.is_none() {
                let Some(year) = self
                    .interpreter
                    .last_help_year(&text, self.reference_year)
                    .await
                else {
                    turn.say(replies::unparseable_last_help_year());
                    return Step::Wait;
                };
                let client_type =
                    ClientType::derive(year, state.case.contact_created, self.reference_year);
                state.service.last_help_year = Some(year.label(self.reference_year));
                state.service.client_type = Some(client_type.backend_label().to_string());
            } else if needs_relationship(state) {
                extract_relationship(state, &text);
            }
        } else if turn.state.service.reason_contact.is_none() {
            turn.say(replies::ask_reason());
            return Step::Wait;
        } else if turn.state.service.last_help_year.is_none() {
            turn.say(replies::ask_last_help_year());
            return Step::Wait;
        }

        if needs_relationship(&turn.state) {
            let client = turn.state.customer.full_name.clone();
            turn.say(replies::ask_relationship(client.as_deref()));
            return Step::Wait;
        }

        self.file_case(turn).await
    }

    async fn file_case(&self, turn: &mut Turn<'_>) -> Step {
        let state = &mut turn.state;
        let relationship = if state.representative.is_representative {
            state.representative.relationship.clone()
        } else {
            Some(RELATIONSHIP_SELF.to_string())
        };
        let service = &mut state.service;
        service.call_type = Some(CALL_TYPE_INBOUND.to_string());
        service.relationship = relationship;
        service.channel = Some(ContactChannel::from_user_id(&turn.key.user_id).label().to_string());
        if service.mood.is_none() {
            service.mood = Some(Mood::Calmado.label().to_string());
        }

        match self.records.create_case(&mut turn.state).await {
            Ok(_) => turn.say(replies::case_filed()),
            Err(e) if e.is_precondition() => {
                error!(session = %turn.key, error = %e, "Case cannot be filed from this session");
                turn.internal_error = true;
                turn.say(replies::try_again_later());
            }
            Err(e) => {
                warn!(session = %turn.key, error = %e, "Case filing failed");
                turn.say(replies::case_filing_failed());
            }
        }
        Step::Wait
    }

    fn escalated(&self, turn: &mut Turn<'_>) -> Step {
        if turn.take_input().is_some() {
            turn.say(replies::already_escalated());
        }
        Step::Wait
    }

    fn done(&self, turn: &mut Turn<'_>) -> Step {
        if turn.take_input().is_some() {
            turn.say(if turn.state.case.customer_service_created {
                replies::already_filed()
            } else {
                replies::conversation_closed()
            });
        }
        Step::Wait
    }

    fn backend_failed(&self, turn: &mut Turn<'_>, operation: &str, e: &BackendError) {
        if e.is_precondition() {
            error!(session = %turn.key, operation, error = %e, "Backend call made without required input");
            turn.internal_error = true;
        } else {
            warn!(session = %turn.key, operation, error = %e, "Backend call failed");
        }
    }
}

fn needs_relationship(state: &SessionState) -> bool {
    state.representative.is_representative && !state.representative.relationship_gathered
}

/// Record whatever names and roles the utterance carries. Returns whether
/// anything was learned.
fn apply_identity(state: &mut SessionState, reading: &Interpretation) -> bool {
    let mut learned = false;
    let for_someone_else = reading.speaks_for_someone_else() || state.representative.is_representative;

    // "Soy Carlos" then "llamo por Ana Pérez": the first name was the caller's.
    if reading.third_party_name.is_some()
        && reading.speaker_name.is_none()
        && !state.customer.name_gathered
        && state.representative.full_name.is_none()
    {
        if let Some(previous) = state.customer.full_name.clone() {
            extract_full_name(state, Role::Representative, &previous);
        }
    }

    if let Some(speaker) = &reading.speaker_name {
        if for_someone_else {
            extract_full_name(state, Role::Representative, speaker);
        } else {
            merge_customer_name(state, speaker);
        }
        learned = true;
    }
    if let Some(client) = &reading.third_party_name {
        state.representative.is_representative = true;
        extract_full_name(state, Role::Customer, client);
        learned = true;
    }
    if let Some(rel) = &reading.relationship {
        state.representative.is_representative = true;
        extract_relationship(state, rel);
        learned = true;
    }
    if reading.has(Intent::Representative) && !state.representative.is_representative {
        state.representative.is_representative = true;
        learned = true;
    }
    if let Some(name) = &reading.bare_name {
        merge_customer_name(state, name);
        learned = true;
    }
    learned
}

/// Store a customer name, appending it to a lone first name already given
/// ("Carlos" then "García Díaz").
fn merge_customer_name(state: &mut SessionState, name: &str) {
    let merged = match state.customer.first_name.as_deref() {
        Some(first)
            if !state.customer.name_gathered
                && !name.to_lowercase().starts_with(&first.to_lowercase()) =>
        {
            format!("{first} {name}")
        }
        _ => name.to_string(),
    };
    extract_full_name(state, Role::Customer, &merged);
}

/// Next question while the customer name is incomplete.
fn name_prompt(state: &SessionState) -> String {
    let partial = state.customer.first_name.as_deref();
    match (state.representative.is_representative, partial) {
        (true, Some(first)) => replies::ask_client_surnames(first),
        (true, None) => replies::ask_client_name(state.representative.first_name.as_deref()),
        (false, Some(first)) => replies::ask_surnames(first),
        (false, None) => replies::ask_full_name(),
    }
}

fn disambiguation_prompt(state: &SessionState) -> String {
    if state.case.caller_is_new {
        return replies::new_customer_options();
    }
    let full_name = state.customer.full_name.as_deref().unwrap_or_default();
    if state.representative.is_representative {
        replies::not_found_for_representative(full_name)
    } else {
        replies::not_found(full_name)
    }
}
