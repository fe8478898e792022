use crate::{Algo, AlgorithmState, Card, CardId, CardPhase, HistoryId, Rating};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateResult {
    Created,
    Edited,
    Reviewed,
}

/// Snapshot of a card's observable state at the moment it changed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewHistory {
    pub id: HistoryId,
    pub card_id: CardId,
    pub update_result: UpdateResult,
    pub algo: Algo,
    pub algorithm_state: AlgorithmState,
    pub due: DateTime<Utc>,
    pub priority: f64,
    pub suspend: bool,
    pub tag: String,
    pub flag: String,
    pub reps: u32,
    pub lapses: u32,
    pub recorded_at: DateTime<Utc>,
}

impl ReviewHistory {
    pub fn snapshot(card: &Card, update_result: UpdateResult, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: HistoryId::new(),
            card_id: card.id.clone(),
            update_result,
            algo: card.algo,
            algorithm_state: card.algorithm_state().clone(),
            due: card.due,
            priority: card.priority,
            suspend: card.suspend,
            tag: card.tag.clone(),
            flag: card.flag.clone(),
            reps: card.reps,
            lapses: card.lapses,
            recorded_at,
        }
    }
}

/// One row per review transaction. Never mutated after it is written.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewLog {
    pub history_id: HistoryId,
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
    pub phase: CardPhase,
    pub scheduled_days: u64,
    pub elapsed_days: u64,
}
