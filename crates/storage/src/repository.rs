use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracker_core::model::{QuestionId, Session, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("remote rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

//
// ─── KEY-VALUE STORE ───────────────────────────────────────────────────────────
//

/// Durable string key-value storage scoped to one device.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write several entries together.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any entry cannot be stored.
    async fn set_entries(&self, entries: &[(&str, String)]) -> Result<(), StorageError>;

    /// Remove several keys together. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove_entries(&self, keys: &[&str]) -> Result<(), StorageError>;
}

/// Simple in-memory key-value store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the raw entries, for assertions.
    #[must_use]
    pub fn dump(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set_entries(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for (key, value) in entries {
            guard.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove_entries(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for key in keys {
            guard.remove(*key);
        }
        Ok(())
    }
}

//
// ─── REMOTE PROGRESS TABLE ─────────────────────────────────────────────────────
//

/// Row written to the remote progress table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRow {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub completed: bool,
    pub completed_at: String,
}

/// Row read back from the remote progress table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCompletion {
    pub question_id: QuestionId,
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Hosted table keyed by (user, question).
///
/// Every call is made on behalf of `session`; adapters may only touch rows
/// owned by `session.user_id`.
#[async_trait]
pub trait ProgressTable: Send + Sync {
    /// All rows of the session's user with `completed = true`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the table cannot be read.
    async fn completed_rows(&self, session: &Session) -> Result<Vec<RemoteCompletion>, StorageError>;

    /// Insert or overwrite rows, using (`user_id`, `question_id`) as the conflict target.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the batch is rejected.
    async fn upsert_rows(&self, session: &Session, rows: &[ProgressRow]) -> Result<(), StorageError>;

    /// Delete the session user's rows for the given questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete is rejected.
    async fn delete_rows(&self, session: &Session, ids: &[QuestionId]) -> Result<(), StorageError>;
}

/// In-memory progress table for testing and offline use.
#[derive(Clone, Default)]
pub struct InMemoryProgressTable {
    rows: Arc<Mutex<HashMap<(UserId, QuestionId), ProgressRow>>>,
}

impl InMemoryProgressTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row for a user, ordered by question id.
    #[must_use]
    pub fn rows_for(&self, user_id: UserId) -> Vec<ProgressRow> {
        let Ok(guard) = self.rows.lock() else {
            return Vec::new();
        };
        let mut rows: Vec<ProgressRow> = guard
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        rows
    }

    /// Seed a row directly, bypassing any session.
    pub fn insert(&self, row: ProgressRow) {
        if let Ok(mut guard) = self.rows.lock() {
            guard.insert((row.user_id, row.question_id.clone()), row);
        }
    }
}

#[async_trait]
impl ProgressTable for InMemoryProgressTable {
    async fn completed_rows(&self, session: &Session) -> Result<Vec<RemoteCompletion>, StorageError> {
        Ok(self
            .rows_for(session.user_id)
            .into_iter()
            .filter(|row| row.completed)
            .map(|row| RemoteCompletion {
                question_id: row.question_id,
                completed: row.completed,
                completed_at: Some(row.completed_at),
            })
            .collect())
    }

    async fn upsert_rows(&self, session: &Session, rows: &[ProgressRow]) -> Result<(), StorageError> {
        let mut guard = self
            .rows
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for row in rows {
            if row.user_id != session.user_id {
                return Err(StorageError::Rejected {
                    status: 403,
                    body: format!("row for {} does not belong to session user", row.question_id),
                });
            }
            guard.insert((row.user_id, row.question_id.clone()), row.clone());
        }
        Ok(())
    }

    async fn delete_rows(&self, session: &Session, ids: &[QuestionId]) -> Result<(), StorageError> {
        let mut guard = self
            .rows
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for id in ids {
            guard.remove(&(session.user_id, id.clone()));
        }
        Ok(())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the device-local store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryKeyValueStore::new()),
        }
    }
}
