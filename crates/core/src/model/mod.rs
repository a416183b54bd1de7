pub mod contest;
mod ids;
mod progress;
mod question;
mod session;
mod topic;

pub use contest::{Contest, ContestBatch, ContestError, ContestFeed, SkippedEntry};
pub use ids::{IdError, QuestionId, TopicId, UserId, slugify};
pub use progress::{CompletedMap, ProgressMaps, TimestampMap};
pub use question::{Difficulty, Platform, Question, QuestionDraft, QuestionError};
pub use session::{AuthEvent, AuthEventKind, Session};
pub use topic::{Topic, TopicDraft, TopicError};
