use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{IdError, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question title cannot be empty")]
    EmptyTitle,

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),

    #[error("question `{title}` has no usable id: {source}")]
    Id {
        title: String,
        #[source]
        source: IdError,
    },
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(QuestionError::UnknownDifficulty(s.to_string())),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

//
// ─── PLATFORM ──────────────────────────────────────────────────────────────────
//

/// Judge or site hosting a question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    LeetCode,
    CodeForces,
    GeeksForGeeks,
    HackerRank,
    TakeUForward,
    Other,
    /// A platform name from the dataset that is not one of the known ones.
    Custom(String),
}

impl Platform {
    /// Guesses the platform from a problem link.
    #[must_use]
    pub fn infer_from_link(link: &str) -> Self {
        if link.contains("leetcode") {
            Self::LeetCode
        } else if link.contains("takeuforward") {
            Self::TakeUForward
        } else {
            Self::Other
        }
    }

    /// Maps a dataset value onto a platform, keeping unknown names verbatim.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "LeetCode" => Self::LeetCode,
            "CodeForces" => Self::CodeForces,
            "GeeksForGeeks" => Self::GeeksForGeeks,
            "HackerRank" => Self::HackerRank,
            "TakeUForward" => Self::TakeUForward,
            "Other" => Self::Other,
            other => Self::Custom(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::LeetCode => "LeetCode",
            Self::CodeForces => "CodeForces",
            Self::GeeksForGeeks => "GeeksForGeeks",
            Self::HackerRank => "HackerRank",
            Self::TakeUForward => "TakeUForward",
            Self::Other => "Other",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Raw question entry as it appears in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub article_url: Option<String>,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            ..Self::default()
        }
    }

    /// Fills in missing attributes and produces an immutable question.
    ///
    /// - no `id`: slug of the title
    /// - no `platform`: inferred from the link
    /// - no `difficulty`: Medium
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the title is empty, the difficulty is not
    /// recognised, or no non-empty id can be derived.
    pub fn infer(self) -> Result<Question, QuestionError> {
        if self.title.trim().is_empty() {
            return Err(QuestionError::EmptyTitle);
        }

        let id = match self.id.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => QuestionId::new(explicit),
            _ => QuestionId::from_title(&self.title),
        }
        .map_err(|source| QuestionError::Id {
            title: self.title.clone(),
            source,
        })?;

        let platform = match self.platform.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Platform::from_name(name),
            _ => Platform::infer_from_link(&self.link),
        };

        let difficulty = match self.difficulty.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.parse()?,
            _ => Difficulty::default(),
        };

        Ok(Question {
            id,
            title: self.title,
            link: self.link,
            difficulty,
            platform,
            video_url: non_blank(self.video_url),
            article_url: non_blank(self.article_url),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A single interview problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    title: String,
    link: String,
    difficulty: Difficulty,
    platform: Platform,
    video_url: Option<String>,
    article_url: Option<String>,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn link(&self) -> &str {
        &self.link
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    #[must_use]
    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    #[must_use]
    pub fn article_url(&self) -> Option<&str> {
        self.article_url.as_deref()
    }

    /// Case-insensitive title match used by list filters.
    #[must_use]
    pub fn title_matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(&needle.to_lowercase())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attributes_are_inferred() {
        let q = QuestionDraft::new("Two Sum!!", "https://leetcode.com/problems/two-sum/")
            .infer()
            .unwrap();
        assert_eq!(q.id().as_str(), "two-sum");
        assert_eq!(q.platform(), &Platform::LeetCode);
        assert_eq!(q.difficulty(), Difficulty::Medium);
    }

    #[test]
    fn takeuforward_link_is_recognised() {
        let q = QuestionDraft::new("Rotate Matrix", "https://takeuforward.org/data-structure/x")
            .infer()
            .unwrap();
        assert_eq!(q.platform(), &Platform::TakeUForward);
    }

    #[test]
    fn unknown_link_falls_back_to_other() {
        let q = QuestionDraft::new("Fib", "https://example.com/fib")
            .infer()
            .unwrap();
        assert_eq!(q.platform(), &Platform::Other);
    }

    #[test]
    fn explicit_values_win() {
        let mut draft = QuestionDraft::new("Two Sum", "https://leetcode.com/problems/two-sum/");
        draft.id = Some("ts-1".into());
        draft.platform = Some("CodeChef".into());
        draft.difficulty = Some("easy".into());
        let q = draft.infer().unwrap();
        assert_eq!(q.id().as_str(), "ts-1");
        assert_eq!(q.platform(), &Platform::Custom("CodeChef".into()));
        assert_eq!(q.difficulty(), Difficulty::Easy);
    }

    #[test]
    fn unknown_difficulty_is_rejected() {
        let mut draft = QuestionDraft::new("X", "y");
        draft.difficulty = Some("Insane".into());
        assert_eq!(
            draft.infer().unwrap_err(),
            QuestionError::UnknownDifficulty("Insane".into())
        );
    }

    #[test]
    fn title_filter_ignores_case() {
        let q = QuestionDraft::new("Longest Common Prefix", "l").infer().unwrap();
        assert!(q.title_matches("common"));
        assert!(!q.title_matches("suffix"));
    }
}
