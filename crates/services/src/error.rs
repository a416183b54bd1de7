//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use tracker_core::catalog::CatalogError;
use tracker_core::model::ContestError;

/// Errors emitted by `ProgressStore`.
///
/// Only local persistence can fail a call; remote sync failures are logged
/// by the background worker and never returned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by auth providers. These are meant to reach the user.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("sign-in is not configured")]
    NotConfigured,
    #[error("not signed in")]
    NoSession,
    #[error("auth backend rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid session payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors emitted by `ContestFeedClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContestFeedError {
    #[error("contest feed request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Feed(#[from] ContestError),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(
        "missing backend credentials: set DSA_BACKEND_URL and DSA_BACKEND_ANON_KEY"
    )]
    MissingBackendCredentials,
    #[error("invalid {key} value: {raw}")]
    InvalidValue { key: &'static str, raw: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}
