//! `PostgREST` adapter for the hosted progress table.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;
use tracker_core::model::{QuestionId, Session};

use crate::repository::{ProgressRow, ProgressTable, RemoteCompletion, StorageError};

pub const DEFAULT_PROGRESS_TABLE: &str = "user_progress";

/// Location and public key of the hosted backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl BackendConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
        }
    }

    /// Joins `path` onto the base URL without doubling slashes.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Clone)]
pub struct RestProgressTable {
    client: Client,
    config: BackendConfig,
    table: String,
}

impl RestProgressTable {
    #[must_use]
    pub fn new(config: BackendConfig, table: impl Into<String>) -> Self {
        Self::with_client(Client::new(), config, table)
    }

    #[must_use]
    pub fn with_client(client: Client, config: BackendConfig, table: impl Into<String>) -> Self {
        Self {
            client,
            config,
            table: table.into(),
        }
    }

    fn url(&self) -> String {
        self.config.endpoint(&format!("rest/v1/{}", self.table))
    }

    fn authorize(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&session.access_token)
    }
}

/// Builds a `PostgREST` `in.(...)` filter with every value quoted.
#[must_use]
pub fn in_filter(ids: &[QuestionId]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.as_str().replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

async fn check(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Rejected {
        status: status.as_u16(),
        body,
    })
}

fn transport(err: reqwest::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

#[async_trait]
impl ProgressTable for RestProgressTable {
    async fn completed_rows(&self, session: &Session) -> Result<Vec<RemoteCompletion>, StorageError> {
        let user_filter = format!("eq.{}", session.user_id);
        let request = self.client.get(self.url()).query(&[
            ("select", "question_id,completed,completed_at"),
            ("user_id", user_filter.as_str()),
            ("completed", "eq.true"),
        ]);
        let response = check(
            self.authorize(request, session)
                .send()
                .await
                .map_err(transport)?,
        )
        .await?;

        let rows: Vec<RemoteCompletion> = response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        debug!(rows = rows.len(), "fetched remote progress");
        Ok(rows)
    }

    async fn upsert_rows(&self, session: &Session, rows: &[ProgressRow]) -> Result<(), StorageError> {
        let request = self
            .client
            .post(self.url())
            .query(&[("on_conflict", "user_id,question_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        check(
            self.authorize(request, session)
                .send()
                .await
                .map_err(transport)?,
        )
        .await?;
        Ok(())
    }

    async fn delete_rows(&self, session: &Session, ids: &[QuestionId]) -> Result<(), StorageError> {
        if ids.is_empty() {
            return Ok(());
        }
        let user_filter = format!("eq.{}", session.user_id);
        let id_filter = in_filter(ids);
        let request = self.client.delete(self.url()).query(&[
            ("user_id", user_filter.as_str()),
            ("question_id", id_filter.as_str()),
        ]);
        check(
            self.authorize(request, session)
                .send()
                .await
                .map_err(transport)?,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_cleanly() {
        let config = BackendConfig::new("https://abc.example.co/", "anon");
        assert_eq!(
            config.endpoint("/rest/v1/user_progress"),
            "https://abc.example.co/rest/v1/user_progress"
        );
    }

    #[test]
    fn in_filter_quotes_values() {
        let ids = vec![
            QuestionId::new("two-sum").unwrap(),
            QuestionId::new("3sum").unwrap(),
        ];
        assert_eq!(in_filter(&ids), r#"in.("two-sum","3sum")"#);
    }

    #[test]
    fn table_url_uses_configured_name() {
        let table = RestProgressTable::new(
            BackendConfig::new("https://abc.example.co", "anon"),
            DEFAULT_PROGRESS_TABLE,
        );
        assert_eq!(table.url(), "https://abc.example.co/rest/v1/user_progress");
    }
}
