use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::{IdError, QuestionId, TopicId};
use crate::model::question::{Question, QuestionDraft, QuestionError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("topic `{name}` has no usable id: {source}")]
    Id {
        name: String,
        #[source]
        source: IdError,
    },

    #[error("topic `{topic}`: {source}")]
    Question {
        topic: String,
        #[source]
        source: QuestionError,
    },
}

/// Raw topic entry as it appears in the dataset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

impl TopicDraft {
    /// Derives the topic id, fills the default description and infers every question.
    ///
    /// # Errors
    ///
    /// Returns `TopicError` if the name yields an empty id or a question is invalid.
    pub fn infer(self) -> Result<Topic, TopicError> {
        let id = TopicId::from_name(&self.name).map_err(|source| TopicError::Id {
            name: self.name.clone(),
            source,
        })?;

        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Collection of {} problems.", self.questions.len()));

        let mut questions = Vec::with_capacity(self.questions.len());
        for draft in self.questions {
            let question = draft.infer().map_err(|source| TopicError::Question {
                topic: self.name.clone(),
                source,
            })?;
            questions.push(question);
        }

        Ok(Topic {
            id,
            name: self.name,
            description,
            questions,
        })
    }
}

/// A named grouping of questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    id: TopicId,
    name: String,
    description: String,
    questions: Vec<Question>,
}

impl Topic {
    #[must_use]
    pub fn id(&self) -> &TopicId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    /// Questions whose title contains `text`, ignoring case.
    pub fn filter<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a Question> + 'a {
        self.questions.iter().filter(move |q| q.title_matches(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_defaults_to_question_count() {
        let topic = TopicDraft {
            name: "Arrays & Hashing".into(),
            description: None,
            questions: vec![
                QuestionDraft::new("Two Sum", "https://leetcode.com/problems/two-sum/"),
                QuestionDraft::new("Contains Duplicate", "https://leetcode.com/problems/x/"),
            ],
        }
        .infer()
        .unwrap();

        assert_eq!(topic.id().as_str(), "arrays-hashing");
        assert_eq!(topic.description(), "Collection of 2 problems.");
        assert_eq!(topic.filter("two").count(), 1);
    }

    #[test]
    fn bad_question_names_its_topic() {
        let err = TopicDraft {
            name: "Graphs".into(),
            description: Some("BFS and friends".into()),
            questions: vec![QuestionDraft::new("", "x")],
        }
        .infer()
        .unwrap_err();

        assert!(matches!(err, TopicError::Question { ref topic, .. } if topic == "Graphs"));
    }
}
