use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContestError {
    #[error("contest feed reported failure: {0}")]
    Unsuccessful(String),
}

/// Upcoming programming contest from the third-party feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Contest {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "contestName")]
    pub name: String,
    #[serde(rename = "contestStartDate", deserialize_with = "instant")]
    pub start: DateTime<Utc>,
    #[serde(rename = "contestEndDate", deserialize_with = "instant")]
    pub end: DateTime<Utc>,
    /// Length in whole seconds.
    #[serde(rename = "contestDuration", deserialize_with = "whole_seconds")]
    pub duration_secs: u64,
    #[serde(rename = "contestUrl")]
    pub url: String,
    pub platform: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedStatus {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Envelope returned by the contest feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ContestFeed {
    pub status: FeedStatus,
    #[serde(default)]
    pub data: Vec<Value>,
}

/// Feed entry that could not be read as a contest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub id: Option<String>,
    pub reason: String,
}

/// Contests decoded from one feed, ordered by start time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContestBatch {
    pub contests: Vec<Contest>,
    pub skipped: Vec<SkippedEntry>,
}

impl ContestFeed {
    /// Decodes each entry on its own; a malformed entry is set aside in
    /// `skipped` instead of failing the whole feed.
    ///
    /// # Errors
    ///
    /// Returns `ContestError::Unsuccessful` when the feed flags failure.
    pub fn into_contests(self) -> Result<ContestBatch, ContestError> {
        if !self.status.success {
            return Err(ContestError::Unsuccessful(
                self.status.message.unwrap_or_else(|| "no message".into()),
            ));
        }
        let mut batch = ContestBatch::default();
        for entry in self.data {
            let id = entry.get("_id").and_then(Value::as_str).map(str::to_string);
            match serde_json::from_value::<Contest>(entry) {
                Ok(contest) => batch.contests.push(contest),
                Err(err) => batch.skipped.push(SkippedEntry {
                    id,
                    reason: err.to_string(),
                }),
            }
        }
        batch.contests.sort_by_key(|c| c.start);
        Ok(batch)
    }
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS[.fff]` read as UTC.
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn instant<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).ok_or_else(|| de::Error::custom(format!("unreadable date `{raw}`")))
}

/// Accepts any non-negative number of seconds, rounding fractions.
fn whole_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(de::Error::custom(format!("invalid duration {secs}")));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = secs.round() as u64;
    Ok(whole)
}

impl Contest {
    #[must_use]
    pub fn starts_on(&self, day: NaiveDate) -> bool {
        self.start.date_naive() == day
    }

    /// Human duration such as `2 hrs 30 mins` or `3 hrs`.
    #[must_use]
    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration_secs)
    }

    /// Link that opens a pre-filled Google Calendar event.
    ///
    /// # Errors
    ///
    /// Returns a parse error only if the base calendar URL is malformed.
    pub fn calendar_link(&self) -> Result<Url, url::ParseError> {
        const FMT: &str = "%Y%m%dT%H%M%S";
        let dates = format!("{}/{}", self.start.format(FMT), self.end.format(FMT));
        Url::parse_with_params(
            "https://calendar.google.com/calendar/render",
            &[
                ("action", "TEMPLATE"),
                ("dates", dates.as_str()),
                ("text", self.name.as_str()),
                ("location", self.url.as_str()),
            ],
        )
    }
}

#[must_use]
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if minutes > 0 {
        format!("{hours} hrs {minutes} mins")
    } else {
        format!("{hours} hrs")
    }
}

/// Contests that have not started yet.
pub fn upcoming(contests: &[Contest], now: DateTime<Utc>) -> impl Iterator<Item = &Contest> {
    contests.iter().filter(move |c| c.start >= now)
}

pub fn on_day(contests: &[Contest], day: NaiveDate) -> impl Iterator<Item = &Contest> {
    contests.iter().filter(move |c| c.starts_on(day))
}
