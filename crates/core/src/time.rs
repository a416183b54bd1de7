use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, TimeZone, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Current time as a completion timestamp.
    #[must_use]
    pub fn now_iso(&self) -> String {
        to_iso(self.now())
    }

    /// Current calendar day in UTC.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Current calendar day as seen on a wall clock in `tz`.
    #[must_use]
    pub fn today_in<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.now().with_timezone(tz).date_naive()
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Formats a UTC instant as `2024-01-01T00:00:00.000Z`.
#[must_use]
pub fn to_iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Extracts the calendar day of an ISO-8601 timestamp.
///
/// Only the date part before `T` is read, so offsets are not applied.
#[must_use]
pub fn iso_date(iso: &str) -> Option<NaiveDate> {
    let day = iso.split('T').next()?;
    NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d").ok()
}

/// Calendar day of an ISO-8601 timestamp as seen in `tz`.
///
/// Values without a readable offset fall back to their written date.
#[must_use]
pub fn iso_date_in<Tz: TimeZone>(iso: &str, tz: &Tz) -> Option<NaiveDate> {
    match DateTime::parse_from_rfc3339(iso.trim()) {
        Ok(at) => Some(at.with_timezone(tz).date_naive()),
        Err(_) => iso_date(iso),
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn iso_matches_javascript_shape() {
        assert_eq!(fixed_clock().now_iso(), "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn advancing_fixed_clock_moves_today() {
        let mut clock = fixed_clock();
        clock.advance(Duration::days(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2023, 11, 15).unwrap());
    }

    #[test]
    fn iso_date_ignores_time_part() {
        assert_eq!(
            iso_date("2024-01-01T23:59:59+05:30"),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(iso_date("garbage"), None);
    }

    #[test]
    fn local_day_follows_the_offset() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let pst = FixedOffset::west_opt(8 * 3600).unwrap();

        assert_eq!(fixed_clock().today_in(&ist), NaiveDate::from_ymd_opt(2023, 11, 15).unwrap());
        assert_eq!(fixed_clock().today_in(&pst), NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());

        assert_eq!(
            iso_date_in("2024-03-10T20:00:00.000Z", &ist),
            NaiveDate::from_ymd_opt(2024, 3, 11)
        );
        assert_eq!(
            iso_date_in("2024-03-11T03:00:00Z", &pst),
            NaiveDate::from_ymd_opt(2024, 3, 10)
        );
        assert_eq!(iso_date_in("2024-03-11", &pst), NaiveDate::from_ymd_opt(2024, 3, 11));
    }
}
