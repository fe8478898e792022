//! FSRS-4.5 memory model: stability/difficulty per card, 17 trainable weights.

use super::{Scheduler, SchedulerLog, SchedulingInfo, SchedulingOutcomes};
use crate::{Algo, AlgorithmState, CardPhase, CoreResult, Rating};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;
const MIN_STABILITY: f64 = 0.1;

pub const DEFAULT_WEIGHTS: [f64; 17] = [
    0.4, 0.6, 2.4, 5.8, 4.93, 0.94, 0.86, 0.01, 1.49, 0.14, 0.94, 2.18, 0.05, 0.34, 1.26, 0.29,
    2.61,
];
pub const DEFAULT_MAXIMUM_INTERVAL: f64 = 36500.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FsrsParams {
    pub weights: [f64; 17],
    pub maximum_interval: f64,
}

impl Default for FsrsParams {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FsrsState {
    pub due: DateTime<Utc>,
    pub stability: f64,
    pub difficulty: f64,
    pub elapsed_days: u64,
    pub scheduled_days: u64,
    pub reps: u32,
    pub lapses: u32,
    pub phase: CardPhase,
    pub last_review: Option<DateTime<Utc>>,
}

impl FsrsState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            due: now,
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0,
            scheduled_days: 0,
            reps: 0,
            lapses: 0,
            phase: CardPhase::New,
            last_review: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FsrsScheduler {
    params: FsrsParams,
}

/// Where a rating branch lands: next phase, due time, and interval in days.
struct Landing {
    phase: CardPhase,
    due: DateTime<Utc>,
    scheduled_days: u64,
}

impl FsrsScheduler {
    pub fn new(params: FsrsParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FsrsParams {
        &self.params
    }

    fn w(&self, i: usize) -> f64 {
        self.params.weights[i]
    }

    fn init_stability(&self, rating: Rating) -> f64 {
        self.w((rating.as_score() - 1) as usize).max(MIN_STABILITY)
    }

    fn init_difficulty(&self, rating: Rating) -> f64 {
        (self.w(4) - self.w(5) * (rating.as_score() - 3) as f64).clamp(1.0, 10.0)
    }

    fn next_difficulty(&self, d: f64, rating: Rating) -> f64 {
        let next = d - self.w(6) * (rating.as_score() - 3) as f64;
        // mean reversion towards the initial "good" difficulty
        (self.w(7) * self.w(4) + (1.0 - self.w(7)) * next).clamp(1.0, 10.0)
    }

    fn retrievability(elapsed_days: u64, stability: f64) -> f64 {
        (1.0 + FACTOR * elapsed_days as f64 / stability.max(MIN_STABILITY)).powf(DECAY)
    }

    fn next_recall_stability(&self, d: f64, s: f64, r: f64, rating: Rating) -> f64 {
        let hard_penalty = if rating == Rating::Hard { self.w(15) } else { 1.0 };
        let easy_bonus = if rating == Rating::Easy { self.w(16) } else { 1.0 };
        s * (1.0
            + self.w(8).exp()
                * (11.0 - d)
                * s.powf(-self.w(9))
                * (((1.0 - r) * self.w(10)).exp() - 1.0)
                * hard_penalty
                * easy_bonus)
    }

    fn next_forget_stability(&self, d: f64, s: f64, r: f64) -> f64 {
        let forget = self.w(11)
            * d.powf(-self.w(12))
            * ((s + 1.0).powf(self.w(13)) - 1.0)
            * ((1.0 - r) * self.w(14)).exp();
        forget.min(s).max(MIN_STABILITY)
    }

    fn next_interval(&self, stability: f64, retention: f64) -> u64 {
        let retention = retention.clamp(0.01, 0.99);
        let ivl = stability / FACTOR * (retention.powf(1.0 / DECAY) - 1.0);
        ivl.round().clamp(1.0, self.params.maximum_interval.max(1.0)) as u64
    }

    /// Difficulty and stability after `rating`, for a card already in memory.
    fn next_ds(&self, prev: &FsrsState, r: f64, rating: Rating) -> (f64, f64) {
        let d = self.next_difficulty(prev.difficulty, rating);
        let s = match rating {
            Rating::Again => self.next_forget_stability(prev.difficulty, prev.stability, r),
            _ => self.next_recall_stability(prev.difficulty, prev.stability, r, rating),
        };
        (d, s)
    }

    fn branch(
        &self,
        prev: &FsrsState,
        now: DateTime<Utc>,
        elapsed_days: u64,
        (difficulty, stability): (f64, f64),
        landing: Landing,
        lapsed: bool,
    ) -> SchedulingInfo {
        let next = FsrsState {
            due: landing.due,
            stability,
            difficulty,
            elapsed_days,
            scheduled_days: landing.scheduled_days,
            reps: prev.reps + 1,
            lapses: prev.lapses + u32::from(lapsed),
            phase: landing.phase,
            last_review: Some(now),
        };
        SchedulingInfo {
            due: landing.due,
            state: AlgorithmState::Fsrs(next),
            log: SchedulerLog {
                phase: prev.phase,
                scheduled_days: landing.scheduled_days,
                elapsed_days,
            },
        }
    }
}

fn minutes(now: DateTime<Utc>, m: i64, phase: CardPhase) -> Landing {
    Landing {
        phase,
        due: now + Duration::minutes(m),
        scheduled_days: 0,
    }
}

fn days(now: DateTime<Utc>, d: u64) -> Landing {
    Landing {
        phase: CardPhase::Review,
        due: now + Duration::days(d as i64),
        scheduled_days: d,
    }
}

impl Scheduler for FsrsScheduler {
    fn algo(&self) -> Algo {
        Algo::Fsrs
    }

    fn initial_state(&self, now: DateTime<Utc>) -> AlgorithmState {
        AlgorithmState::Fsrs(FsrsState::new(now))
    }

    fn repeat(
        &self,
        state: &AlgorithmState,
        now: DateTime<Utc>,
        target_retention: f64,
    ) -> CoreResult<SchedulingOutcomes> {
        let AlgorithmState::Fsrs(prev) = state;
        let elapsed_days = match (prev.phase, prev.last_review) {
            (CardPhase::New, _) | (_, None) => 0,
            (_, Some(last)) => (now - last).num_days().max(0) as u64,
        };

        let mut out = BTreeMap::new();
        match prev.phase {
            CardPhase::New => {
                for rating in Rating::ALL {
                    let ds = (self.init_difficulty(rating), self.init_stability(rating));
                    let landing = match rating {
                        Rating::Again => minutes(now, 1, CardPhase::Learning),
                        Rating::Hard => minutes(now, 5, CardPhase::Learning),
                        Rating::Good => minutes(now, 10, CardPhase::Learning),
                        Rating::Easy => days(now, self.next_interval(ds.1, target_retention)),
                    };
                    out.insert(rating, self.branch(prev, now, elapsed_days, ds, landing, false));
                }
            }
            CardPhase::Learning | CardPhase::Relearning => {
                let r = Self::retrievability(elapsed_days, prev.stability);
                let good = self.next_ds(prev, r, Rating::Good);
                let easy = self.next_ds(prev, r, Rating::Easy);
                let good_ivl = self.next_interval(good.1, target_retention);
                let easy_ivl = self.next_interval(easy.1, target_retention).max(good_ivl + 1);
                for rating in Rating::ALL {
                    let ds = self.next_ds(prev, r, rating);
                    let landing = match rating {
                        Rating::Again => minutes(now, 5, prev.phase),
                        Rating::Hard => minutes(now, 10, prev.phase),
                        Rating::Good => days(now, good_ivl),
                        Rating::Easy => days(now, easy_ivl),
                    };
                    out.insert(rating, self.branch(prev, now, elapsed_days, ds, landing, false));
                }
            }
            CardPhase::Review => {
                let r = Self::retrievability(elapsed_days, prev.stability);
                let hard = self.next_ds(prev, r, Rating::Hard);
                let good = self.next_ds(prev, r, Rating::Good);
                let easy = self.next_ds(prev, r, Rating::Easy);
                let mut hard_ivl = self.next_interval(hard.1, target_retention);
                let mut good_ivl = self.next_interval(good.1, target_retention);
                hard_ivl = hard_ivl.min(good_ivl);
                good_ivl = good_ivl.max(hard_ivl + 1);
                let easy_ivl = self.next_interval(easy.1, target_retention).max(good_ivl + 1);
                for rating in Rating::ALL {
                    let ds = self.next_ds(prev, r, rating);
                    let (landing, lapsed) = match rating {
                        Rating::Again => (minutes(now, 5, CardPhase::Relearning), true),
                        Rating::Hard => (days(now, hard_ivl), false),
                        Rating::Good => (days(now, good_ivl), false),
                        Rating::Easy => (days(now, easy_ivl), false),
                    };
                    out.insert(rating, self.branch(prev, now, elapsed_days, ds, landing, lapsed));
                }
            }
        }
        Ok(out)
    }
}
