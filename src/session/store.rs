//! `SessionStore` trait and session keys.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::state::SessionState;
use crate::error::DatabaseError;

/// Identifies one conversation. All mutation is scoped to this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// Result of an idempotent session create. Both variants are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Backend-agnostic session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create the session if absent. Safe to call repeatedly.
    async fn create(&self, key: &SessionKey) -> Result<CreateOutcome, DatabaseError>;

    /// Load a session's state, or `None` if the session does not exist.
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionState>, DatabaseError>;

    /// Overwrite a session's state. The session must already exist.
    async fn save(&self, key: &SessionKey, state: &SessionState) -> Result<(), DatabaseError>;

    /// Remove a session. Returns whether anything was deleted.
    async fn delete(&self, key: &SessionKey) -> Result<bool, DatabaseError>;
}
