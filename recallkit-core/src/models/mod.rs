use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod card;
pub mod card_source;
pub mod deck;
pub mod history;

pub use card::*;
pub use card_source::*;
pub use deck::*;
pub use history::*;

use crate::scheduler::fsrs::FsrsState;
use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn as_score(&self) -> i32 {
        match self {
            Rating::Again => 1,
            Rating::Hard => 2,
            Rating::Good => 3,
            Rating::Easy => 4,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        };
        f.pad(s)
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "a" | "again" => Ok(Rating::Again),
            "2" | "h" | "hard" => Ok(Rating::Hard),
            "3" | "g" | "good" => Ok(Rating::Good),
            "4" | "e" | "easy" => Ok(Rating::Easy),
            other => Err(format!("unknown rating: {other}")),
        }
    }
}

/// Scheduler family that owns a card's memory state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Algo {
    Fsrs,
}

impl fmt::Display for Algo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algo::Fsrs => f.write_str("fsrs"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CardPhase {
    #[default]
    New,
    Learning,
    Review,
    Relearning,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    New,
    DueToday,
    Lapsed,
    Future,
}

/// Scheduler-specific memory state, tagged by the algorithm that produced it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "algo", content = "state", rename_all = "snake_case")]
pub enum AlgorithmState {
    Fsrs(FsrsState),
}

impl AlgorithmState {
    pub fn algo(&self) -> Algo {
        match self {
            AlgorithmState::Fsrs(_) => Algo::Fsrs,
        }
    }

    pub fn due(&self) -> DateTime<Utc> {
        match self {
            AlgorithmState::Fsrs(s) => s.due,
        }
    }

    pub fn reps(&self) -> u32 {
        match self {
            AlgorithmState::Fsrs(s) => s.reps,
        }
    }

    pub fn phase(&self) -> CardPhase {
        match self {
            AlgorithmState::Fsrs(s) => s.phase,
        }
    }

    pub fn last_review(&self) -> Option<DateTime<Utc>> {
        match self {
            AlgorithmState::Fsrs(s) => s.last_review,
        }
    }

    pub(crate) fn set_due(&mut self, due: DateTime<Utc>) {
        match self {
            AlgorithmState::Fsrs(s) => s.due = due,
        }
    }
}
