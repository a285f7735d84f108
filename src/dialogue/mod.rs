//! The Sofía intake conversation.

pub mod engine;
pub mod interpreter;
pub mod replies;
pub mod service_record;
pub mod stage;

pub use engine::{DialogueEngine, TurnOutcome};
pub use interpreter::{Intent, Interpretation, RuleInterpreter, UtteranceInterpreter};
pub use service_record::{ClientType, ContactChannel, LastHelpYear, Mood};
pub use stage::{Stage, VerificationFactor, VerificationPolicy, derive_stage};
