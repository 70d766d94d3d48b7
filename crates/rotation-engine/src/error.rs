//! Error types for rotation-engine operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::reconcile::Stage;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RotationError {
    #[error("Invalid interval: start {start} is not before end {end}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid range literal: {0}")]
    InvalidRangeLiteral(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid window length: {0} weeks (must be at least 1)")]
    InvalidWindowWeeks(i64),

    #[error("Invalid cycle length: {0} (must be at least 1)")]
    InvalidCycleLength(i64),

    #[error("Invalid week index: {0} (must not be negative)")]
    InvalidWeekIndex(i64),

    #[error("Cycle slot {week_index} assigns {members} members but the property holds {capacity}")]
    CapacityExceeded {
        week_index: u32,
        members: usize,
        capacity: u32,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    /// A store call failed. `rolled_back` is true when the store restored the
    /// property to its state before the run.
    #[error("Persistence failure while {stage}: {message}")]
    Persistence {
        stage: Stage,
        message: String,
        rolled_back: bool,
    },
}

impl RotationError {
    /// Whether the error was raised before any store call was made.
    pub fn is_validation(&self) -> bool {
        !matches!(self, RotationError::Persistence { .. })
    }
}

pub type Result<T> = std::result::Result<T, RotationError>;
