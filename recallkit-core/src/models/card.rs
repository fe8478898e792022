use crate::{Algo, AlgorithmState, CardId, CardSourceId, CoreError, CoreResult, DueStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRIORITY: f64 = 0.5;

/// A single schedulable flashcard. The card does no I/O and no locking;
/// the index store serializes access to it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub card_source_id: CardSourceId,
    pub algo: Algo,
    algorithm_state: AlgorithmState,

    pub due: DateTime<Utc>,
    pub priority: f64,
    pub suspend: bool,
    pub tag: String,
    pub flag: String,
    pub reps: u32,
    pub lapses: u32,

    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(card_source_id: CardSourceId, state: AlgorithmState) -> Self {
        Self::with_id(CardId::new(), card_source_id, state)
    }

    pub fn with_id(id: CardId, card_source_id: CardSourceId, state: AlgorithmState) -> Self {
        Self {
            id,
            card_source_id,
            algo: state.algo(),
            due: state.due(),
            algorithm_state: state,
            priority: DEFAULT_PRIORITY,
            suspend: false,
            tag: String::new(),
            flag: String::new(),
            reps: 0,
            lapses: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn due(&self) -> DateTime<Utc> {
        self.due
    }

    pub fn set_due(&mut self, due: DateTime<Utc>) {
        self.due = due;
        self.algorithm_state.set_due(due);
        self.updated_at = Utc::now();
    }

    pub fn priority(&self) -> f64 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: f64) {
        self.priority = if priority.is_nan() {
            DEFAULT_PRIORITY
        } else {
            priority.clamp(0.0, 1.0)
        };
        self.updated_at = Utc::now();
    }

    pub fn algorithm_state(&self) -> &AlgorithmState {
        &self.algorithm_state
    }

    /// Installs a new scheduler state. The state must carry this card's algorithm tag.
    pub fn set_algorithm_state(&mut self, state: AlgorithmState) -> CoreResult<()> {
        if state.algo() != self.algo {
            return Err(CoreError::AlgoMismatch {
                expected: self.algo,
                found: state.algo(),
            });
        }
        self.algorithm_state = state;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn increment_reps(&mut self) {
        self.reps += 1;
    }

    pub fn increment_lapses(&mut self) {
        self.lapses += 1;
    }

    /// True while the scheduler has never recorded a review.
    pub fn is_new(&self) -> bool {
        self.algorithm_state.reps() == 0 && self.algorithm_state.last_review().is_none()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.suspend && self.due <= now
    }

    pub fn due_status(&self, now: DateTime<Utc>) -> DueStatus {
        if self.is_new() {
            DueStatus::New
        } else if self.due > now {
            DueStatus::Future
        } else {
            let elapsed = now - self.due;
            if elapsed.num_hours() >= 24 {
                DueStatus::Lapsed
            } else {
                DueStatus::DueToday
            }
        }
    }
}
