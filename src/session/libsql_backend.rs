//! libSQL implementation of `SessionStore`.
//!
//! Supports local file and in-memory databases. A single connection is
//! reused for all operations; `libsql::Connection` is `Send + Sync`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use super::migrations;
use super::state::SessionState;
use super::store::{CreateOutcome, SessionKey, SessionStore};
use crate::error::DatabaseError;

pub struct LibSqlSessionStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlSessionStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Pool(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Session store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl SessionStore for LibSqlSessionStore {
    async fn create(&self, key: &SessionKey) -> Result<CreateOutcome, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO sessions (app_name, user_id, session_id, state, created_at, updated_at)
                 VALUES (?1, ?2, ?3, '{}', ?4, ?4)
                 ON CONFLICT (app_name, user_id, session_id) DO NOTHING",
                params![
                    key.app_name.as_str(),
                    key.user_id.as_str(),
                    key.session_id.as_str(),
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_session: {e}")))?;

        let outcome = if inserted > 0 {
            CreateOutcome::Created
        } else {
            CreateOutcome::AlreadyExists
        };
        debug!(session = %key, ?outcome, "Session create");
        Ok(outcome)
    }

    async fn load(&self, key: &SessionKey) -> Result<Option<SessionState>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT state FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
                params![
                    key.app_name.as_str(),
                    key.user_id.as_str(),
                    key.session_id.as_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("load_session state column: {e}")))?;
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
                let state = SessionState::from_value(value)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load_session: {e}"))),
        }
    }

    async fn save(&self, key: &SessionKey, state: &SessionState) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let value =
            serde_json::to_string(state).map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let updated = self
            .conn()
            .execute(
                "UPDATE sessions SET state = ?4, updated_at = ?5
                 WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
                params![
                    key.app_name.as_str(),
                    key.user_id.as_str(),
                    key.session_id.as_str(),
                    value,
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_session: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "session".to_string(),
                id: key.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
                params![
                    key.app_name.as_str(),
                    key.user_id.as_str(),
                    key.session_id.as_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> LibSqlSessionStore {
        LibSqlSessionStore::new_memory().await.unwrap()
    }

    fn key(session: &str) -> SessionKey {
        SessionKey::new("sofia_agent", "sms", session)
    }

    async fn count_sessions(store: &LibSqlSessionStore) -> i64 {
        let mut rows = store
            .conn()
            .query("SELECT COUNT(*) FROM sessions", ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    #[tokio::test]
    async fn create_twice_is_idempotent() {
        let store = test_store().await;
        let k = key("s1");

        assert_eq!(store.create(&k).await.unwrap(), CreateOutcome::Created);
        assert_eq!(store.create(&k).await.unwrap(), CreateOutcome::AlreadyExists);
        assert_eq!(count_sessions(&store).await, 1);
    }

    #[tokio::test]
    async fn recreate_does_not_reset_state() {
        let store = test_store().await;
        let k = key("s1");
        store.create(&k).await.unwrap();

        let mut state = SessionState::default();
        state.case.client_verification_attempts = 2;
        store.save(&k, &state).await.unwrap();

        store.create(&k).await.unwrap();
        let loaded = store.load(&k).await.unwrap().unwrap();
        assert_eq!(loaded.case.client_verification_attempts, 2);
    }

    #[tokio::test]
    async fn new_session_loads_default_state() {
        let store = test_store().await;
        let k = key("fresh");
        store.create(&k).await.unwrap();
        assert_eq!(store.load(&k).await.unwrap(), Some(SessionState::default()));
    }

    #[tokio::test]
    async fn unreadable_state_is_an_error() {
        let store = test_store().await;
        let k = key("s1");
        store.create(&k).await.unwrap();
        store
            .conn()
            .execute(
                "UPDATE sessions SET state = X'7B7D' WHERE session_id = ?1",
                params!["s1"],
            )
            .await
            .unwrap();

        let err = store.load(&k).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[tokio::test]
    async fn load_missing_session_is_none() {
        let store = test_store().await;
        assert!(store.load(&key("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_missing_session_is_not_found() {
        let store = test_store().await;
        let err = store
            .save(&key("ghost"), &SessionState::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn sessions_are_isolated_by_full_key() {
        let store = test_store().await;
        let a = SessionKey::new("sofia_agent", "sms", "same");
        let b = SessionKey::new("sofia_agent", "voice", "same");
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        let mut state = SessionState::default();
        state.customer.full_name = Some("Ana Pérez".into());
        store.save(&a, &state).await.unwrap();

        let other = store.load(&b).await.unwrap().unwrap();
        assert!(other.customer.full_name.is_none());
    }

    #[tokio::test]
    async fn delete_session() {
        let store = test_store().await;
        let k = key("gone");
        store.create(&k).await.unwrap();

        assert!(store.delete(&k).await.unwrap());
        assert!(store.load(&k).await.unwrap().is_none());
        assert!(!store.delete(&k).await.unwrap());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let k = key("durable");

        {
            let store = LibSqlSessionStore::new_local(&path).await.unwrap();
            store.create(&k).await.unwrap();
            let mut state = SessionState::default();
            state.account.id = Some("001ABC".into());
            store.save(&k, &state).await.unwrap();
        }

        let reopened = LibSqlSessionStore::new_local(&path).await.unwrap();
        let state = reopened.load(&k).await.unwrap().unwrap();
        assert_eq!(state.account.id.as_deref(), Some("001ABC"));
    }
}
