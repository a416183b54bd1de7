use thiserror::Error;

use crate::model::{Question, QuestionId, Topic, TopicDraft, TopicError, TopicId};

const BUNDLED_DATASET: &str = include_str!("../data/dsa-questions.json");

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Topic(#[from] TopicError),
}

/// The static question set, grouped by topic.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    topics: Vec<Topic>,
}

impl Catalog {
    /// Parses a dataset document (an array of topic objects).
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the JSON is malformed or an entry cannot be inferred.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let drafts: Vec<TopicDraft> = serde_json::from_str(raw)?;
        let topics = drafts
            .into_iter()
            .map(TopicDraft::infer)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { topics })
    }

    /// Loads the dataset compiled into the crate.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the bundled file is invalid.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_DATASET)
    }

    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    #[must_use]
    pub fn topic(&self, id: &TopicId) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id() == id)
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.topics.iter().flat_map(Topic::questions)
    }

    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.topics.iter().map(|t| t.questions().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Platform};

    #[test]
    fn parses_dataset_and_infers_fields() {
        let catalog = Catalog::from_json(
            r#"[
                {
                    "name": "Arrays",
                    "questions": [
                        { "title": "Two Sum!!", "link": "https://leetcode.com/problems/two-sum/" },
                        { "title": "Pascal", "link": "https://takeuforward.org/x", "difficulty": "Hard",
                          "videoUrl": "https://youtu.be/x" }
                    ]
                }
            ]"#,
        )
        .unwrap();

        let topic = catalog.topic(&TopicId::new("arrays").unwrap()).unwrap();
        assert_eq!(topic.description(), "Collection of 2 problems.");

        let two_sum = catalog.question(&QuestionId::new("two-sum").unwrap()).unwrap();
        assert_eq!(two_sum.platform(), &Platform::LeetCode);
        assert_eq!(two_sum.difficulty(), Difficulty::Medium);

        let pascal = catalog.question(&QuestionId::new("pascal").unwrap()).unwrap();
        assert_eq!(pascal.platform(), &Platform::TakeUForward);
        assert_eq!(pascal.video_url(), Some("https://youtu.be/x"));
        assert_eq!(catalog.total_questions(), 2);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(Catalog::from_json("{"), Err(CatalogError::Json(_))));
    }

    #[test]
    fn bundled_dataset_loads() {
        let catalog = Catalog::bundled().unwrap();
        assert!(!catalog.topics().is_empty());
        assert!(catalog.total_questions() > 0);
    }

    #[test]
    fn bundled_ids_are_unique() {
        let catalog = Catalog::bundled().unwrap();
        let mut ids: Vec<_> = catalog.questions().map(|q| q.id().clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
