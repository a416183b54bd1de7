use chrono::{Datelike, Days, NaiveDate};

/// Days shown in a month view whose weeks start on Sunday.
///
/// Starts at the Sunday on or before the 1st and ends at the Saturday on or
/// after the last day, so the length is always a multiple of seven.
/// Returns an empty grid for an invalid month.
#[must_use]
pub fn month_grid(year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let Some(last) = last_day_of_month(first) else {
        return Vec::new();
    };

    let lead = u64::from(first.weekday().num_days_from_sunday());
    let trail = 6 - u64::from(last.weekday().num_days_from_sunday());
    let (Some(start), Some(end)) = (
        first.checked_sub_days(Days::new(lead)),
        last.checked_add_days(Days::new(trail)),
    ) else {
        return Vec::new();
    };

    start.iter_days().take_while(|d| *d <= end).collect()
}

fn last_day_of_month(first: NaiveDate) -> Option<NaiveDate> {
    let (y, m) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)?.pred_opt()
}
