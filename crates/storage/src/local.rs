//! Device-local persistence of the two completion maps.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::warn;
use tracker_core::model::{CompletedMap, ProgressMaps, TimestampMap};

use crate::repository::{KeyValueStore, StorageError};

/// Key holding the JSON object `questionId -> true`.
pub const COMPLETED_KEY: &str = "completedQuestions";

/// Key holding the JSON object `questionId -> ISO-8601 string`.
pub const TIMESTAMPS_KEY: &str = "completionTimestamps";

/// The persisted maps as read back, before any repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredProgress {
    pub completed: CompletedMap,
    pub timestamps: TimestampMap,
}

/// Adapter that stores completion state under two JSON keys.
///
/// A detached store models an environment with no durable storage: reads
/// return empty maps and writes are dropped.
#[derive(Clone)]
pub struct LocalProgressStore {
    kv: Option<Arc<dyn KeyValueStore>>,
}

impl LocalProgressStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv: Some(kv) }
    }

    #[must_use]
    pub fn detached() -> Self {
        Self { kv: None }
    }

    /// Read both maps. Absent or unreadable values come back empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only when the backend itself fails.
    pub async fn load(&self) -> Result<StoredProgress, StorageError> {
        let Some(kv) = &self.kv else {
            return Ok(StoredProgress::default());
        };
        let completed = read_map(kv.as_ref(), COMPLETED_KEY).await?;
        let timestamps = read_map(kv.as_ref(), TIMESTAMPS_KEY).await?;
        Ok(StoredProgress {
            completed,
            timestamps,
        })
    }

    /// Write both maps in one batch.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the write fails.
    pub async fn save(&self, maps: &ProgressMaps) -> Result<(), StorageError> {
        let Some(kv) = &self.kv else {
            return Ok(());
        };
        let completed = serde_json::to_string(maps.completed())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let timestamps = serde_json::to_string(maps.timestamps())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        kv.set_entries(&[(COMPLETED_KEY, completed), (TIMESTAMPS_KEY, timestamps)])
            .await
    }

    /// Remove both keys.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let Some(kv) = &self.kv else {
            return Ok(());
        };
        kv.remove_entries(&[COMPLETED_KEY, TIMESTAMPS_KEY]).await
    }
}

async fn read_map<T>(kv: &dyn KeyValueStore, key: &str) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = kv.get(key).await? else {
        return Ok(T::default());
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!(key, error = %err, "discarding unreadable local progress value");
            Ok(T::default())
        }
    }
}
