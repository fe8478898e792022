use crate::{Rating, ReviewLog};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct Totals {
    pub total: u32,
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl Totals {
    pub fn record(&mut self, r: Rating) {
        self.total += 1;
        match r {
            Rating::Again => self.again += 1,
            Rating::Hard => self.hard += 1,
            Rating::Good => self.good += 1,
            Rating::Easy => self.easy += 1,
        }
    }

    /// Share of reviews that were recalled, i.e. not rated `Again`.
    pub fn accuracy(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            (self.total - self.again) as f32 / self.total as f32
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StatsSummary {
    pub totals: Totals,
    pub per_day: BTreeMap<NaiveDate, Totals>,
}

pub fn summarize(logs: &[ReviewLog]) -> StatsSummary {
    let mut summary = StatsSummary::default();
    for l in logs {
        summary.totals.record(l.rating);
        let d = l.reviewed_at.date_naive();
        summary.per_day.entry(d).or_default().record(l.rating);
    }
    summary
}

/// Consecutive days, ending at `today`, with at least one review.
pub fn daily_streak(logs: &[ReviewLog], today: NaiveDate) -> u32 {
    let per_day = summarize(logs).per_day;
    let mut streak = 0u32;
    let mut day = today;
    while per_day.get(&day).is_some_and(|t| t.total > 0) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}
