//! Regenerate-and-replace of a property's schedule state over a date range.
//!
//! A run stages everything up front in a [`ReplacePlan`]: the range to clear,
//! the blockers to persist and the events to insert. Building the plan performs
//! all validation, so bad input never reaches the store. The plan can then be
//! previewed (dry run) or applied.
//!
//! Applying runs four stages in a fixed order:
//!
//! 1. delete the property's turn and maintenance events whose interval overlaps
//!    the range (member requests are never deleted),
//! 2. delete the property's blockers whose own bounds lie within the range,
//! 3. insert the supplied blockers,
//! 4. insert the generated events.
//!
//! Stages 1 and 2 select differently: events by overlap, blockers by bound match.
//! The whole sequence runs inside `begin`/`commit` on the store; on failure the
//! store is asked to roll back. Stores without transactions cannot undo the
//! deletes, and the outcome says so.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::blocking::BlockingEntry;
use crate::config::PropertyConfig;
use crate::conflict::{find_conflicts, Conflict};
use crate::error::{Result, RotationError};
use crate::generator::{EventType, GeneratedEvent};
use crate::interval::Interval;
use crate::request::{ScheduleRequest, ValidatedRequest};
use crate::store::{ScheduleStore, StoreError, StoredBlocker};

/// Step of the replace sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Locking,
    DeletingEvents,
    DeletingBlockers,
    InsertingBlockers,
    InsertingEvents,
    Committing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Locking => "locking the property",
            Stage::DeletingEvents => "deleting events",
            Stage::DeletingBlockers => "deleting blockers",
            Stage::InsertingBlockers => "inserting blockers",
            Stage::InsertingEvents => "inserting events",
            Stage::Committing => "committing",
        };
        f.write_str(label)
    }
}

/// Row counts touched by an applied plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceSummary {
    pub events_deleted: usize,
    pub blockers_deleted: usize,
    pub blockers_inserted: usize,
    pub events_inserted: usize,
}

/// What applying a plan would change, computed without writing anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanPreview {
    pub property_id: String,
    pub range: Interval,
    pub events_to_delete: Vec<GeneratedEvent>,
    pub blockers_to_delete: Vec<StoredBlocker>,
    pub blockers_to_insert: Vec<BlockingEntry>,
    pub events_to_insert: Vec<GeneratedEvent>,
    /// Existing ad hoc requests that overlap a newly generated turn. They are
    /// kept; the overlap is reported so the booking can be resolved by hand.
    pub displaced_requests: Vec<Conflict>,
}

/// A fully staged replace of one property's schedule over one range.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacePlan {
    pub property_id: String,
    pub range: Interval,
    pub blockers: Vec<BlockingEntry>,
    /// Maintenance events for maintenance blockers, then turns, ordered by start.
    pub events: Vec<GeneratedEvent>,
}

impl ReplacePlan {
    /// Stage a plan from an already validated request.
    pub fn from_validated(request: &ValidatedRequest) -> Result<Self> {
        Ok(Self {
            property_id: request.property_id.clone(),
            range: request.range,
            blockers: request.blockers.entries().to_vec(),
            events: request.events()?,
        })
    }

    /// Validate a raw request and stage its plan.
    pub fn build(request: &ScheduleRequest, config: Option<&PropertyConfig>) -> Result<Self> {
        Self::from_validated(&request.validate(config)?)
    }

    pub fn turns(&self) -> impl Iterator<Item = &GeneratedEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type == EventType::Turn)
    }

    /// Dry run: report what `apply` would remove and add.
    pub fn preview<S: ScheduleStore + ?Sized>(&self, store: &S) -> Result<PlanPreview> {
        let events_to_delete = store
            .events_overlapping(&self.property_id, &self.range)
            .map_err(|e| persistence(Stage::DeletingEvents, e, false))?;
        let blockers_to_delete = store
            .blockers_in_range(&self.property_id, &self.range)
            .map_err(|e| persistence(Stage::DeletingBlockers, e, false))?;

        let requests = store
            .requests_overlapping(&self.property_id, &self.range)
            .map_err(|e| persistence(Stage::DeletingEvents, e, false))?;
        let turns: Vec<GeneratedEvent> = self.turns().cloned().collect();

        Ok(PlanPreview {
            property_id: self.property_id.clone(),
            range: self.range,
            displaced_requests: find_conflicts(&requests, &turns),
            events_to_delete,
            blockers_to_delete,
            blockers_to_insert: self.blockers.clone(),
            events_to_insert: self.events.clone(),
        })
    }

    /// Run the replace sequence against `store`.
    ///
    /// # Errors
    /// Returns `RotationError::Persistence` naming the stage that failed and
    /// whether the store rolled the property back to its state before the run.
    pub fn apply<S: ScheduleStore + ?Sized>(&self, store: &mut S) -> Result<ReplaceSummary> {
        let property_id = self.property_id.as_str();

        store
            .begin(property_id)
            .map_err(|e| persistence(Stage::Locking, e, true))?;

        let result = self.run_stages(store).and_then(|summary| {
            store
                .commit(property_id)
                .map_err(|e| persistence(Stage::Committing, e, false))?;
            Ok(summary)
        });

        match result {
            Ok(summary) => {
                info!(
                    property_id,
                    range = %self.range,
                    events_deleted = summary.events_deleted,
                    blockers_deleted = summary.blockers_deleted,
                    blockers_inserted = summary.blockers_inserted,
                    events_inserted = summary.events_inserted,
                    "schedule replaced"
                );
                Ok(summary)
            }
            Err(RotationError::Persistence { stage, message, .. }) => {
                let rolled_back = if store.supports_transactions() {
                    match store.rollback(property_id) {
                        Ok(()) => {
                            warn!(property_id, %stage, "replace failed, rolled back");
                            true
                        }
                        Err(e) => {
                            warn!(property_id, %stage, error = %e, "replace failed, rollback failed");
                            false
                        }
                    }
                } else {
                    warn!(property_id, %stage, "replace failed on a store without transactions");
                    false
                };
                Err(RotationError::Persistence {
                    stage,
                    message,
                    rolled_back,
                })
            }
            Err(other) => Err(other),
        }
    }

    fn run_stages<S: ScheduleStore + ?Sized>(&self, store: &mut S) -> Result<ReplaceSummary> {
        let property_id = self.property_id.as_str();
        let mut summary = ReplaceSummary::default();

        summary.events_deleted = store
            .delete_events_overlapping(property_id, &self.range)
            .map_err(|e| persistence(Stage::DeletingEvents, e, false))?;
        info!(property_id, count = summary.events_deleted, "deleted events");

        summary.blockers_deleted = store
            .delete_blockers_in_range(property_id, &self.range)
            .map_err(|e| persistence(Stage::DeletingBlockers, e, false))?;
        info!(property_id, count = summary.blockers_deleted, "deleted blockers");

        summary.blockers_inserted = store
            .insert_blockers(property_id, &self.blockers)
            .map_err(|e| persistence(Stage::InsertingBlockers, e, false))?;
        info!(property_id, count = summary.blockers_inserted, "inserted blockers");

        summary.events_inserted = store
            .insert_events(&self.events)
            .map_err(|e| persistence(Stage::InsertingEvents, e, false))?;
        info!(property_id, count = summary.events_inserted, "inserted events");

        Ok(summary)
    }
}

fn persistence(stage: Stage, error: StoreError, rolled_back: bool) -> RotationError {
    RotationError::Persistence {
        stage,
        message: error.to_string(),
        rolled_back,
    }
}

/// Structured result of a regeneration run, returned instead of an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReplaceSummary>,
    /// The failed run may have left the range without events or blockers.
    #[serde(default)]
    pub calendar_may_be_cleared: bool,
}

impl RunOutcome {
    fn succeeded(summary: ReplaceSummary) -> Self {
        Self {
            success: true,
            message: format!(
                "Schedule regenerated: {} events and {} blockers replaced by {} events and {} blockers",
                summary.events_deleted,
                summary.blockers_deleted,
                summary.events_inserted,
                summary.blockers_inserted
            ),
            stage: None,
            summary: Some(summary),
            calendar_may_be_cleared: false,
        }
    }

    fn failed(error: &RotationError) -> Self {
        match error {
            RotationError::Persistence {
                stage, rolled_back, ..
            } => {
                let cleared = !rolled_back && *stage > Stage::DeletingEvents;
                let mut message = format!("Schedule regeneration failed: {}", error);
                if cleared {
                    message.push_str(
                        ". Existing events in the range may have been removed; re-run the regeneration to restore them",
                    );
                }
                Self {
                    success: false,
                    message,
                    stage: Some(*stage),
                    summary: None,
                    calendar_may_be_cleared: cleared,
                }
            }
            _ => Self {
                success: false,
                message: format!("Invalid schedule request: {}", error),
                stage: None,
                summary: None,
                calendar_may_be_cleared: false,
            },
        }
    }
}

/// Validate, plan and apply a request. Never returns an error; failures come
/// back as `success: false` with a message.
pub fn regenerate<S: ScheduleStore + ?Sized>(
    store: &mut S,
    request: &ScheduleRequest,
    config: Option<&PropertyConfig>,
) -> RunOutcome {
    let result = ReplacePlan::build(request, config).and_then(|plan| plan.apply(store));
    match result {
        Ok(summary) => RunOutcome::succeeded(summary),
        Err(error) => {
            warn!(property_id = %request.property_id, error = %error, "regeneration failed");
            RunOutcome::failed(&error)
        }
    }
}
