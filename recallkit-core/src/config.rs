use serde::{Deserialize, Serialize};

pub const DEFAULT_INTEGRITY_CHUNK: usize = 5000;
pub const DEFAULT_SNAPSHOT_NAME: &str = "recallkit";

/// Maps a card's priority onto the retention target handed to the scheduler.
///
/// The curve is piecewise linear through `(0, min)`, `(pivot, default)` and
/// `(1, max)`. Priorities outside `[0, 1]` are clamped first.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionPolicy {
    pub min: f64,
    pub default: f64,
    pub max: f64,
    pub pivot: f64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            min: 0.5,
            default: 0.9,
            max: 0.95,
            pivot: 0.5,
        }
    }
}

impl RetentionPolicy {
    pub fn retention_for(&self, priority: f64) -> f64 {
        let p = if priority.is_nan() { self.pivot } else { priority.clamp(0.0, 1.0) };
        let pivot = self.pivot.clamp(f64::EPSILON, 1.0 - f64::EPSILON);
        if p <= pivot {
            self.min + (self.default - self.min) * (p / pivot)
        } else {
            self.default + (self.max - self.default) * ((p - pivot) / (1.0 - pivot))
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub retention: RetentionPolicy,
    /// Persist decks and reviewed cards as soon as they change.
    pub write_through: bool,
    pub snapshot_name: String,
    pub integrity_chunk: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            write_through: true,
            snapshot_name: DEFAULT_SNAPSHOT_NAME.to_string(),
            integrity_chunk: DEFAULT_INTEGRITY_CHUNK,
        }
    }
}
