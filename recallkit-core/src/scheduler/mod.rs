use crate::{Algo, AlgorithmState, CardPhase, CoreResult, Rating};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub mod fsrs;

/// Scheduler-side details of one rating branch, copied into the review log.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerLog {
    pub phase: CardPhase,
    pub scheduled_days: u64,
    pub elapsed_days: u64,
}

#[derive(Clone, Debug)]
pub struct SchedulingInfo {
    pub state: AlgorithmState,
    pub due: DateTime<Utc>,
    pub log: SchedulerLog,
}

pub type SchedulingOutcomes = BTreeMap<Rating, SchedulingInfo>;

/// Memory-scheduling capability consumed by the index store.
pub trait Scheduler: Send + Sync {
    fn algo(&self) -> Algo;

    /// State for a card that has never been reviewed, due at `now`.
    fn initial_state(&self, now: DateTime<Utc>) -> AlgorithmState;

    /// Computes the outcome of every rating for `state` reviewed at `now`.
    /// Nothing is committed; the caller picks a branch.
    fn repeat(
        &self,
        state: &AlgorithmState,
        now: DateTime<Utc>,
        target_retention: f64,
    ) -> CoreResult<SchedulingOutcomes>;
}
