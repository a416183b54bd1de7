use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;

/// Completion flags keyed by question.
pub type CompletedMap = BTreeMap<QuestionId, bool>;

/// Completion timestamps (ISO-8601) keyed by question.
pub type TimestampMap = BTreeMap<QuestionId, String>;

/// The two parallel completion maps.
///
/// Keys are always synchronized: a question is either absent from both maps or
/// present in both with `completed == true`. Absence means "not completed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMaps {
    completed: CompletedMap,
    timestamps: TimestampMap,
}

impl ProgressMaps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a valid state from two independently persisted maps.
    ///
    /// `false` flags and orphaned timestamps are dropped; a completed key with
    /// no timestamp gets `fallback_iso`.
    #[must_use]
    pub fn from_parts(completed: CompletedMap, mut timestamps: TimestampMap, fallback_iso: &str) -> Self {
        let mut maps = Self::new();
        for (id, done) in completed {
            if !done {
                continue;
            }
            let at = timestamps
                .remove(&id)
                .unwrap_or_else(|| fallback_iso.to_string());
            maps.mark_completed(id, at);
        }
        maps
    }

    /// Sets the flag and (re)stamps the completion time.
    pub fn mark_completed(&mut self, id: QuestionId, at: String) {
        self.completed.insert(id.clone(), true);
        self.timestamps.insert(id, at);
    }

    /// Removes both keys. Returns whether the question was completed.
    pub fn unmark(&mut self, id: &QuestionId) -> bool {
        self.timestamps.remove(id);
        self.completed.remove(id).is_some()
    }

    /// Drops everything and takes `entries` as the whole new state.
    pub fn replace_with(&mut self, entries: impl IntoIterator<Item = (QuestionId, String)>) {
        self.clear();
        self.merge_from(entries);
    }

    /// Adds `entries` on top of the current state; incoming timestamps win.
    pub fn merge_from(&mut self, entries: impl IntoIterator<Item = (QuestionId, String)>) {
        for (id, at) in entries {
            self.mark_completed(id, at);
        }
    }

    pub fn clear(&mut self) {
        self.completed.clear();
        self.timestamps.clear();
    }

    #[must_use]
    pub fn is_completed(&self, id: &QuestionId) -> bool {
        self.completed.get(id).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn completed_at(&self, id: &QuestionId) -> Option<&str> {
        self.timestamps.get(id).map(String::as_str)
    }

    pub fn completed_ids(&self) -> impl Iterator<Item = &QuestionId> {
        self.completed
            .iter()
            .filter(|(_, done)| **done)
            .map(|(id, _)| id)
    }

    /// Completed questions paired with their timestamps.
    pub fn entries(&self) -> impl Iterator<Item = (&QuestionId, Option<&str>)> {
        self.completed_ids()
            .map(|id| (id, self.timestamps.get(id).map(String::as_str)))
    }

    #[must_use]
    pub fn completed(&self) -> &CompletedMap {
        &self.completed
    }

    #[must_use]
    pub fn timestamps(&self) -> &TimestampMap {
        &self.timestamps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qid(s: &str) -> QuestionId {
        QuestionId::new(s).unwrap()
    }

    #[test]
    fn mark_then_unmark_leaves_nothing() {
        let mut maps = ProgressMaps::new();
        maps.mark_completed(qid("two-sum"), "2024-01-01T00:00:00.000Z".into());
        assert!(maps.unmark(&qid("two-sum")));
        assert!(maps.completed().is_empty());
        assert!(maps.timestamps().is_empty());
    }

    #[test]
    fn remarking_only_refreshes_timestamp() {
        let mut maps = ProgressMaps::new();
        maps.mark_completed(qid("a"), "2024-01-01T00:00:00.000Z".into());
        maps.mark_completed(qid("a"), "2024-01-02T00:00:00.000Z".into());
        assert_eq!(maps.len(), 1);
        assert_eq!(maps.timestamps().len(), 1);
        assert_eq!(maps.completed_at(&qid("a")), Some("2024-01-02T00:00:00.000Z"));
    }

    #[test]
    fn from_parts_repairs_out_of_sync_maps() {
        let completed = CompletedMap::from([(qid("a"), true), (qid("b"), false), (qid("c"), true)]);
        let timestamps = TimestampMap::from([
            (qid("a"), "2024-01-01T00:00:00Z".to_string()),
            (qid("b"), "2024-01-01T00:00:00Z".to_string()),
            (qid("orphan"), "2024-01-01T00:00:00Z".to_string()),
        ]);

        let maps = ProgressMaps::from_parts(completed, timestamps, "fallback");

        assert_eq!(maps.completed_ids().cloned().collect::<Vec<_>>(), vec![qid("a"), qid("c")]);
        assert_eq!(maps.completed_at(&qid("c")), Some("fallback"));
        assert_eq!(maps.completed_at(&qid("orphan")), None);
        assert_eq!(maps.timestamps().len(), 2);
    }

    #[test]
    fn replace_discards_previous_state() {
        let mut maps = ProgressMaps::new();
        maps.mark_completed(qid("old"), "t0".into());
        maps.replace_with([(qid("two-sum"), "2024-01-01T00:00:00Z".to_string())]);
        assert!(!maps.is_completed(&qid("old")));
        assert_eq!(maps.completed_at(&qid("two-sum")), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn merge_keeps_local_only_keys() {
        let mut maps = ProgressMaps::new();
        maps.mark_completed(qid("local"), "t0".into());
        maps.mark_completed(qid("shared"), "t0".into());
        maps.merge_from([(qid("shared"), "t1".to_string())]);
        assert!(maps.is_completed(&qid("local")));
        assert_eq!(maps.completed_at(&qid("shared")), Some("t1"));
    }
}
