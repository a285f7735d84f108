//! Session persistence. The only memory a conversation has between turns.

pub mod libsql_backend;
pub mod migrations;
pub mod state;
pub mod store;

pub use libsql_backend::LibSqlSessionStore;
pub use state::{Account, CaseProgress, Customer, Representative, ServiceRecord, SessionState};
pub use store::{CreateOutcome, SessionKey, SessionStore};
