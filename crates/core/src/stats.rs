//! Read-only summaries derived from the catalog and the completion maps.

use std::collections::BTreeSet;

use chrono::{NaiveDate, TimeZone};

use crate::catalog::Catalog;
use crate::model::{Difficulty, ProgressMaps, Topic};
use crate::time::{iso_date, iso_date_in};

//
// ─── TALLIES ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub solved: usize,
    pub total: usize,
}

impl Tally {
    /// Share solved in `0.0..=100.0`; zero when there is nothing to solve.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = self.solved as f64 / self.total as f64 * 100.0;
        pct
    }
}

/// Overall completion across the catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
}

impl ProgressSummary {
    /// Every `true` flag counts, even for questions no longer in the catalog.
    #[must_use]
    pub fn compute(catalog: &Catalog, maps: &ProgressMaps) -> Self {
        let tally = Tally {
            solved: maps.completed_ids().count(),
            total: catalog.total_questions(),
        };
        Self {
            completed: tally.solved,
            total: tally.total,
            percent: tally.percent(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DifficultyBreakdown {
    pub easy: Tally,
    pub medium: Tally,
    pub hard: Tally,
}

impl DifficultyBreakdown {
    #[must_use]
    pub fn compute(catalog: &Catalog, maps: &ProgressMaps) -> Self {
        let mut out = Self::default();
        for question in catalog.questions() {
            let tally = out.tally_mut(question.difficulty());
            tally.total += 1;
            if maps.is_completed(question.id()) {
                tally.solved += 1;
            }
        }
        out
    }

    #[must_use]
    pub fn get(&self, difficulty: Difficulty) -> Tally {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    fn tally_mut(&mut self, difficulty: Difficulty) -> &mut Tally {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStatus {
    NotStarted,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicProgress {
    pub tally: Tally,
    pub status: TopicStatus,
}

impl TopicProgress {
    #[must_use]
    pub fn compute(topic: &Topic, maps: &ProgressMaps) -> Self {
        let tally = Tally {
            solved: topic
                .questions()
                .iter()
                .filter(|q| maps.is_completed(q.id()))
                .count(),
            total: topic.questions().len(),
        };
        let status = if tally.total > 0 && tally.solved == tally.total {
            TopicStatus::Complete
        } else if tally.solved > 0 {
            TopicStatus::InProgress
        } else {
            TopicStatus::NotStarted
        };
        Self { tally, status }
    }
}

//
// ─── STREAKS ───────────────────────────────────────────────────────────────────
//

/// Days with at least one completion, plus streak counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySummary {
    pub active_days: BTreeSet<NaiveDate>,
    pub current_streak: u32,
    pub best_streak: u32,
    pub completed_today: usize,
}

impl ActivitySummary {
    /// Builds the summary from completion timestamps as seen on `today`.
    ///
    /// Days are the written UTC dates of the timestamps. The current streak
    /// counts back from today, or from yesterday when nothing was solved
    /// today yet; otherwise it is zero.
    #[must_use]
    pub fn compute(maps: &ProgressMaps, today: NaiveDate) -> Self {
        let dates = maps.timestamps().values().filter_map(|iso| iso_date(iso));
        Self::from_dates(dates, today)
    }

    /// Like [`Self::compute`], but each completion is bucketed by its
    /// calendar day in `tz`. `today` should come from the same zone.
    #[must_use]
    pub fn compute_in<Tz: TimeZone>(maps: &ProgressMaps, today: NaiveDate, tz: &Tz) -> Self {
        let dates = maps
            .timestamps()
            .values()
            .filter_map(|iso| iso_date_in(iso, tz));
        Self::from_dates(dates, today)
    }

    fn from_dates(dates: impl Iterator<Item = NaiveDate>, today: NaiveDate) -> Self {
        let dates: Vec<NaiveDate> = dates.collect();
        let completed_today = dates.iter().filter(|d| **d == today).count();
        let active_days: BTreeSet<NaiveDate> = dates.into_iter().collect();

        let best_streak = best_run(&active_days);
        let current_streak = current_run(&active_days, today);

        Self {
            active_days,
            current_streak,
            best_streak,
            completed_today,
        }
    }

    #[must_use]
    pub fn is_active(&self, day: NaiveDate) -> bool {
        self.active_days.contains(&day)
    }
}

fn best_run(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut best = 0;
    let mut running = 0;
    let mut last: Option<NaiveDate> = None;
    for day in days {
        running = match last {
            Some(prev) if prev.succ_opt() == Some(*day) => running + 1,
            _ => 1,
        };
        best = best.max(running);
        last = Some(*day);
    }
    best
}

fn current_run(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let start = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt().filter(|y| days.contains(y))
    };

    let mut count = 0;
    let mut cursor = start;
    while let Some(day) = cursor {
        if !days.contains(&day) {
            break;
        }
        count += 1;
        cursor = day.pred_opt();
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionId;
    use chrono::FixedOffset;

    const DATASET: &str = r#"[
        { "name": "Arrays", "questions": [
            { "title": "A", "link": "l", "difficulty": "Easy" },
            { "title": "B", "link": "l" },
            { "title": "C", "link": "l", "difficulty": "Hard" }
        ]},
        { "name": "Empty", "questions": [] }
    ]"#;

    fn qid(s: &str) -> QuestionId {
        QuestionId::new(s).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn maps_with(entries: &[(&str, &str)]) -> ProgressMaps {
        let mut maps = ProgressMaps::new();
        for (id, at) in entries {
            maps.mark_completed(qid(id), (*at).to_string());
        }
        maps
    }

    #[test]
    fn summary_and_breakdown() {
        let catalog = Catalog::from_json(DATASET).unwrap();
        let maps = maps_with(&[("a", "2024-01-01T00:00:00Z"), ("c", "2024-01-01T00:00:00Z")]);

        let summary = ProgressSummary::compute(&catalog, &maps);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.total, 3);

        let by_diff = DifficultyBreakdown::compute(&catalog, &maps);
        assert_eq!(by_diff.get(Difficulty::Easy), Tally { solved: 1, total: 1 });
        assert_eq!(by_diff.get(Difficulty::Medium), Tally { solved: 0, total: 1 });
        assert_eq!(by_diff.get(Difficulty::Hard), Tally { solved: 1, total: 1 });
    }

    #[test]
    fn topic_status_needs_questions_to_be_complete() {
        let catalog = Catalog::from_json(DATASET).unwrap();
        let maps = maps_with(&[("a", "t"), ("b", "t"), ("c", "t")]);

        let arrays = TopicProgress::compute(&catalog.topics()[0], &maps);
        assert_eq!(arrays.status, TopicStatus::Complete);

        let empty = TopicProgress::compute(&catalog.topics()[1], &maps);
        assert_eq!(empty.status, TopicStatus::NotStarted);
        assert_eq!(empty.tally.percent(), 0.0);
    }

    #[test]
    fn streaks_count_consecutive_days() {
        let maps = maps_with(&[
            ("a", "2024-03-01T10:00:00.000Z"),
            ("b", "2024-03-02T10:00:00.000Z"),
            ("c", "2024-03-03T10:00:00.000Z"),
            ("d", "2024-03-07T10:00:00.000Z"),
            ("e", "2024-03-08T09:00:00.000Z"),
            ("f", "2024-03-08T11:00:00.000Z"),
        ]);

        let activity = ActivitySummary::compute(&maps, day(2024, 3, 8));
        assert_eq!(activity.best_streak, 3);
        assert_eq!(activity.current_streak, 2);
        assert_eq!(activity.completed_today, 2);
        assert!(activity.is_active(day(2024, 3, 2)));
    }

    #[test]
    fn streak_survives_until_end_of_next_day() {
        let maps = maps_with(&[("a", "2024-03-06T10:00:00Z"), ("b", "2024-03-07T10:00:00Z")]);
        assert_eq!(ActivitySummary::compute(&maps, day(2024, 3, 8)).current_streak, 2);
        assert_eq!(ActivitySummary::compute(&maps, day(2024, 3, 9)).current_streak, 0);
    }

    #[test]
    fn evening_completions_count_for_the_local_day() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let maps = maps_with(&[
            ("a", "2024-03-09T10:00:00.000Z"),
            ("b", "2024-03-10T20:00:00.000Z"),
        ]);

        let utc = ActivitySummary::compute(&maps, day(2024, 3, 11));
        assert_eq!(utc.completed_today, 0);
        assert_eq!(utc.current_streak, 2);

        let local = ActivitySummary::compute_in(&maps, day(2024, 3, 11), &ist);
        assert_eq!(local.completed_today, 1);
        assert!(local.is_active(day(2024, 3, 11)));
        assert!(!local.is_active(day(2024, 3, 10)));
        assert_eq!(local.current_streak, 1);
        assert_eq!(local.best_streak, 1);
    }

    #[test]
    fn empty_maps_have_no_activity() {
        let activity = ActivitySummary::compute(&ProgressMaps::new(), day(2024, 1, 1));
        assert_eq!(activity, ActivitySummary::default());
    }
}
