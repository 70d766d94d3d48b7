//! # rotation-engine
//!
//! Yearly turn-schedule generation for shared properties.
//!
//! Members take turns occupying a property according to a repeating cycle. The
//! engine walks a target date range in fixed-length windows, trims each window
//! around blocking periods (exemptions and maintenance closures), assigns the
//! surviving windows to the members the cycle names, and replaces the
//! property's stored schedule for that range in one staged unit of work.
//!
//! ## Modules
//!
//! - [`interval`]: half-open `[start, end)` algebra, day normalization, range literals
//! - [`blocking`]: blocking entries and the trimming fold
//! - [`cycle`]: the repeating assignment pattern
//! - [`generator`]: window walk and turn emission
//! - [`conflict`]: pairwise overlap detection between event lists
//! - [`occupancy`]: per-day capacity and conflict check
//! - [`store`]: persistence contract and in-memory store
//! - [`reconcile`]: staged replace, dry run, structured outcome
//! - [`config`]: property configuration and member directory
//! - [`request`]: wire-level request and validation
//! - [`error`]: error types

pub mod blocking;
pub mod config;
pub mod conflict;
pub mod cycle;
pub mod error;
pub mod generator;
pub mod interval;
pub mod occupancy;
pub mod reconcile;
pub mod request;
pub mod store;

pub use blocking::{BlockingEntry, BlockingKind, BlockingSet, WindowFate};
pub use config::{Member, MemberDirectory, PropertyConfig};
pub use conflict::find_conflicts;
pub use cycle::{CycleAssignment, CyclePattern};
pub use error::RotationError;
pub use generator::{generate, EventStatus, EventType, GeneratedEvent};
pub use interval::Interval;
pub use occupancy::{day_occupancy, occupancy_for_range, DayOccupancy};
pub use reconcile::{regenerate, PlanPreview, ReplacePlan, ReplaceSummary, RunOutcome, Stage};
pub use request::{generate_schedule, ScheduleRequest, ValidatedRequest};
pub use store::{MemoryStore, ScheduleStore, StoreError, StoreSnapshot, StoredBlocker};
