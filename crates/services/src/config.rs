//! Runtime configuration read from `DSA_*` environment variables.

use storage::rest::{BackendConfig, DEFAULT_PROGRESS_TABLE};
use tracing::warn;

use crate::contest_feed::DEFAULT_CONTEST_FEED_URL;
use crate::error::ConfigError;
use crate::progress::{PullPolicy, SyncPolicy, UncompletePolicy};

pub const DEFAULT_DB_URL: &str = "sqlite://dsa.sqlite3";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
}

impl Profile {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub profile: Profile,
    pub db_url: String,
    /// `None` runs the app local-only: no sign-in, no remote mirror.
    pub backend: Option<BackendConfig>,
    pub progress_table: String,
    pub contest_feed_url: String,
    pub sync: SyncPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            db_url: DEFAULT_DB_URL.to_string(),
            backend: None,
            progress_table: DEFAULT_PROGRESS_TABLE.to_string(),
            contest_feed_url: DEFAULT_CONTEST_FEED_URL.to_string(),
            sync: SyncPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unrecognised enum value, and
    /// `ConfigError::MissingBackendCredentials` when the production profile
    /// has no backend.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let profile = match get("DSA_PROFILE") {
            Some(raw) => Profile::parse(&raw).ok_or(ConfigError::InvalidValue {
                key: "DSA_PROFILE",
                raw,
            })?,
            None => Profile::default(),
        };
        let uncomplete = match get("DSA_UNCOMPLETE_POLICY") {
            Some(raw) => UncompletePolicy::from_name(&raw).ok_or(ConfigError::InvalidValue {
                key: "DSA_UNCOMPLETE_POLICY",
                raw,
            })?,
            None => UncompletePolicy::default(),
        };
        let pull = match get("DSA_PULL_POLICY") {
            Some(raw) => PullPolicy::from_name(&raw).ok_or(ConfigError::InvalidValue {
                key: "DSA_PULL_POLICY",
                raw,
            })?,
            None => PullPolicy::default(),
        };

        let backend = match (get("DSA_BACKEND_URL"), get("DSA_BACKEND_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(BackendConfig::new(url.trim(), anon_key.trim())),
            _ if profile == Profile::Production => {
                return Err(ConfigError::MissingBackendCredentials);
            }
            _ => {
                warn!("backend credentials not set, progress stays on this device");
                None
            }
        };

        Ok(Self {
            profile,
            db_url: get("DSA_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.to_string()),
            backend,
            progress_table: get("DSA_PROGRESS_TABLE")
                .unwrap_or_else(|| DEFAULT_PROGRESS_TABLE.to_string()),
            contest_feed_url: get("DSA_CONTEST_FEED_URL")
                .unwrap_or_else(|| DEFAULT_CONTEST_FEED_URL.to_string()),
            sync: SyncPolicy { uncomplete, pull },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_local_only_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.backend.is_none());
    }

    #[test]
    fn reads_backend_and_policies() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DSA_BACKEND_URL", "https://abc.example.co"),
            ("DSA_BACKEND_ANON_KEY", "anon"),
            ("DSA_PROGRESS_TABLE", "progress_v2"),
            ("DSA_UNCOMPLETE_POLICY", "keep-remote"),
            ("DSA_PULL_POLICY", "merge"),
            ("DSA_DB_URL", "sqlite::memory:"),
        ]))
        .unwrap();

        assert_eq!(
            config.backend,
            Some(BackendConfig::new("https://abc.example.co", "anon"))
        );
        assert_eq!(config.progress_table, "progress_v2");
        assert_eq!(config.db_url, "sqlite::memory:");
        assert_eq!(config.sync.uncomplete, UncompletePolicy::KeepRemote);
        assert_eq!(config.sync.pull, PullPolicy::Merge);
    }

    #[test]
    fn production_requires_backend() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DSA_PROFILE", "production"),
            ("DSA_BACKEND_URL", "https://abc.example.co"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingBackendCredentials);
    }

    #[test]
    fn blank_values_are_unset() {
        let config = AppConfig::from_lookup(lookup(&[("DSA_DB_URL", "  ")])).unwrap();
        assert_eq!(config.db_url, DEFAULT_DB_URL);
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = AppConfig::from_lookup(lookup(&[("DSA_PULL_POLICY", "union")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "DSA_PULL_POLICY",
                raw: "union".to_string(),
            }
        );
    }
}
