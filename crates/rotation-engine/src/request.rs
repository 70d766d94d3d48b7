//! Wire-level generation request and its validation.
//!
//! The request mirrors the generator's input contract: raw strings for dates and
//! signed integers for counts, so that every bad value surfaces as a typed
//! validation error instead of a deserialization failure.

use serde::{Deserialize, Serialize};

use crate::blocking::{BlockingEntry, BlockingKind, BlockingSet};
use crate::config::PropertyConfig;
use crate::cycle::{CycleAssignment, CyclePattern};
use crate::error::{Result, RotationError};
use crate::generator::{generate, GeneratedEvent};
use crate::interval::{parse_instant, Interval};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeInput {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerInput {
    pub name: String,
    pub start: String,
    pub end: String,
    pub kind: BlockingKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleInput {
    pub week_index: i64,
    pub member_id: String,
}

/// A request to (re)generate one property's rotation over a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub property_id: String,
    pub range: RangeInput,
    /// Falls back to the property's default turn duration, then to 1.
    #[serde(default)]
    pub window_weeks: Option<i64>,
    #[serde(default)]
    pub blockers: Vec<BlockerInput>,
    #[serde(default)]
    pub cycle: Vec<CycleInput>,
    pub cycle_length: i64,
}

/// A request whose every field has been checked and normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub property_id: String,
    pub range: Interval,
    pub window_weeks: u32,
    pub blockers: BlockingSet,
    pub pattern: CyclePattern,
}

impl ScheduleRequest {
    /// Check and normalize the request.
    ///
    /// When `config` is given, its id must match the request's property, its
    /// default turn duration fills in a missing `window_weeks`, and no cycle slot
    /// may hold more members than `max_slots`.
    pub fn validate(&self, config: Option<&PropertyConfig>) -> Result<ValidatedRequest> {
        if let Some(config) = config {
            config.validate()?;
            if config.id != self.property_id {
                return Err(RotationError::Config(format!(
                    "config is for property '{}', request is for '{}'",
                    config.id, self.property_id
                )));
            }
        }

        let window_weeks = match self.window_weeks {
            Some(weeks) => u32::try_from(weeks)
                .ok()
                .filter(|w| *w > 0)
                .ok_or(RotationError::InvalidWindowWeeks(weeks))?,
            None => config.map_or(1, |c| c.default_turn_duration_weeks),
        };

        let cycle_length = u32::try_from(self.cycle_length)
            .ok()
            .filter(|l| *l > 0)
            .ok_or(RotationError::InvalidCycleLength(self.cycle_length))?;

        let assignments = self
            .cycle
            .iter()
            .map(|input| {
                if input.week_index < 0 {
                    return Err(RotationError::InvalidWeekIndex(input.week_index));
                }
                let reduced = input.week_index % i64::from(cycle_length);
                let week_index = u32::try_from(reduced)
                    .map_err(|_| RotationError::InvalidWeekIndex(input.week_index))?;
                Ok(CycleAssignment::new(week_index, input.member_id.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        let pattern = CyclePattern::new(cycle_length, &assignments)?;
        if let Some(config) = config {
            pattern.check_capacity(config.max_slots)?;
        }

        let range = Interval::normalized(
            parse_instant(&self.range.start)?,
            parse_instant(&self.range.end)?,
        )?;

        let entries = self
            .blockers
            .iter()
            .map(|input| {
                let range =
                    Interval::normalized(parse_instant(&input.start)?, parse_instant(&input.end)?)?;
                Ok(BlockingEntry::new(input.name.clone(), range, input.kind))
            })
            .collect::<Result<Vec<_>>>()?;
        let blockers = BlockingSet::new(entries)?;

        Ok(ValidatedRequest {
            property_id: self.property_id.clone(),
            range,
            window_weeks,
            blockers,
            pattern,
        })
    }
}

impl ValidatedRequest {
    /// Turn events only, in rotation order.
    pub fn turns(&self) -> Result<Vec<GeneratedEvent>> {
        generate(
            &self.property_id,
            &self.range,
            self.window_weeks,
            &self.blockers,
            &self.pattern,
        )
    }

    /// Everything a run persists as events: maintenance closures and turns,
    /// ordered by start. Maintenance comes first on equal starts.
    pub fn events(&self) -> Result<Vec<GeneratedEvent>> {
        let mut events = self.blockers.maintenance_events(&self.property_id);
        events.extend(self.turns()?);
        events.sort_by_key(|e| e.range.start);
        Ok(events)
    }
}

/// Validate a request and return the events a run would insert.
pub fn generate_schedule(
    request: &ScheduleRequest,
    config: Option<&PropertyConfig>,
) -> Result<Vec<GeneratedEvent>> {
    request.validate(config)?.events()
}
