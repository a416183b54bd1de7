use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, warn};
use tracker_core::model::ContestFeed;
use tracker_core::model::contest::{Contest, upcoming};

use crate::error::ContestFeedError;

pub const DEFAULT_CONTEST_FEED_URL: &str =
    "https://node.codolio.com/api/contest-calendar/v1/all/get-upcoming-contests";

/// Read-only client for the public contest calendar.
#[derive(Clone)]
pub struct ContestFeedClient {
    client: Client,
    url: String,
}

impl ContestFeedClient {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Every readable contest in the feed, sorted by start time.
    ///
    /// Entries that fail to decode are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns `ContestFeedError` on a transport failure, a non-2xx status, or
    /// a feed that reports `success: false`.
    pub async fn fetch_all(&self) -> Result<Vec<Contest>, ContestFeedError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContestFeedError::HttpStatus(status));
        }
        let feed: ContestFeed = response.json().await?;
        let batch = feed.into_contests()?;
        for entry in &batch.skipped {
            warn!(id = entry.id.as_deref().unwrap_or("?"), reason = %entry.reason, "skipping contest entry");
        }
        debug!(
            contests = batch.contests.len(),
            skipped = batch.skipped.len(),
            "fetched contest feed"
        );
        Ok(batch.contests)
    }

    /// Contests that have not started yet at `now`.
    ///
    /// # Errors
    ///
    /// See [`ContestFeedClient::fetch_all`].
    pub async fn fetch_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Contest>, ContestFeedError> {
        let contests = self.fetch_all().await?;
        Ok(upcoming(&contests, now).cloned().collect())
    }
}
