#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth;
pub mod config;
pub mod contest_feed;
pub mod error;
pub mod progress;

pub use tracker_core::Clock;

pub use app_services::AppServices;
pub use auth::{LocalSessionProvider, RestAuthClient, SessionHub, SessionProvider};
pub use config::{AppConfig, Profile};
pub use contest_feed::ContestFeedClient;
pub use error::{AppServicesError, AuthError, ConfigError, ContestFeedError, ProgressError};
pub use progress::{ProgressStore, PullPolicy, SyncPolicy, UncompletePolicy};
