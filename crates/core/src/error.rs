use thiserror::Error;

use crate::catalog::CatalogError;
use crate::model::{ContestError, IdError, QuestionError, TopicError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Contest(#[from] ContestError),
}
