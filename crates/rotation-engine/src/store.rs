//! Persistence contract for schedule state, and an in-memory implementation.
//!
//! The reconciliation step only ever talks to a [`ScheduleStore`]. Stores that
//! can run the destructive replace atomically say so through
//! [`ScheduleStore::supports_transactions`] and implement `begin`, `commit` and
//! `rollback`; the defaults are no-ops for stores that cannot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocking::BlockingEntry;
use crate::generator::{EventType, GeneratedEvent};
use crate::interval::Interval;
use crate::reconcile::Stage;

/// Errors raised by a schedule store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Property {0} is being regenerated by another run")]
    Busy(String),

    #[error("No open transaction for property {0}")]
    NoTransaction(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A blocking entry as persisted for one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlocker {
    pub property_id: String,
    #[serde(flatten)]
    pub entry: BlockingEntry,
}

/// The persistence operations the reconciliation step needs.
pub trait ScheduleStore {
    /// `turn` and `maintenance` events of the property whose interval overlaps
    /// `range`: exactly the events `delete_events_overlapping` would remove.
    fn events_overlapping(&self, property_id: &str, range: &Interval)
        -> StoreResult<Vec<GeneratedEvent>>;

    /// `request` events of the property whose interval overlaps `range`.
    fn requests_overlapping(&self, property_id: &str, range: &Interval)
        -> StoreResult<Vec<GeneratedEvent>>;

    /// Blockers of the property whose own bounds lie within `range`.
    fn blockers_in_range(&self, property_id: &str, range: &Interval)
        -> StoreResult<Vec<StoredBlocker>>;

    /// Delete `turn` and `maintenance` events whose interval overlaps `range`.
    /// Returns the number removed. `request` events are left in place.
    fn delete_events_overlapping(&mut self, property_id: &str, range: &Interval)
        -> StoreResult<usize>;

    /// Delete blockers with `range.start <= start && end <= range.end`.
    ///
    /// This is a bound match on the blocker's own dates, not an overlap test: a
    /// blocker straddling either edge of `range` survives.
    fn delete_blockers_in_range(&mut self, property_id: &str, range: &Interval)
        -> StoreResult<usize>;

    fn insert_blockers(&mut self, property_id: &str, blockers: &[BlockingEntry])
        -> StoreResult<usize>;

    fn insert_events(&mut self, events: &[GeneratedEvent]) -> StoreResult<usize>;

    /// Whether `begin`/`commit`/`rollback` actually provide atomicity.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Open a unit of work for one property and serialize concurrent runs on it.
    fn begin(&mut self, _property_id: &str) -> StoreResult<()> {
        Ok(())
    }

    fn commit(&mut self, _property_id: &str) -> StoreResult<()> {
        Ok(())
    }

    fn rollback(&mut self, _property_id: &str) -> StoreResult<()> {
        Ok(())
    }
}

/// Serializable contents of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub events: Vec<GeneratedEvent>,
    #[serde(default)]
    pub blockers: Vec<StoredBlocker>,
}

impl StoreSnapshot {
    fn for_property(&self, property_id: &str) -> StoreSnapshot {
        StoreSnapshot {
            events: self
                .events
                .iter()
                .filter(|e| e.property_id == property_id)
                .cloned()
                .collect(),
            blockers: self
                .blockers
                .iter()
                .filter(|b| b.property_id == property_id)
                .cloned()
                .collect(),
        }
    }

    fn replace_property(&mut self, property_id: &str, saved: StoreSnapshot) {
        self.events.retain(|e| e.property_id != property_id);
        self.blockers.retain(|b| b.property_id != property_id);
        self.events.extend(saved.events);
        self.blockers.extend(saved.blockers);
    }
}

struct OpenTransaction {
    handle: u64,
    saved: StoreSnapshot,
}

#[derive(Default)]
struct MemoryData {
    state: StoreSnapshot,
    transactions: HashMap<String, OpenTransaction>,
    fail_at: Option<Stage>,
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// In-memory schedule store.
///
/// Handles created with [`MemoryStore::connect`] (or `clone`) share the same
/// data, like connections to one database. `begin` takes a per-property lock
/// owned by the calling handle; a second handle calling `begin` on the same
/// property gets `StoreError::Busy` until the first commits or rolls back.
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
    handle: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        self.connect()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_snapshot(StoreSnapshot::default())
    }

    pub fn from_snapshot(state: StoreSnapshot) -> Self {
        Self {
            data: Arc::new(Mutex::new(MemoryData {
                state,
                ..Default::default()
            })),
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// A new handle onto the same data.
    pub fn connect(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Copy of everything currently stored.
    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        Ok(self.data()?.state.clone())
    }

    /// Make the operation belonging to `stage` fail from now on.
    pub fn fail_at(&self, stage: Option<Stage>) -> StoreResult<()> {
        self.data()?.fail_at = stage;
        Ok(())
    }

    /// Every stored event of one property.
    pub fn events_for(&self, property_id: &str) -> StoreResult<Vec<GeneratedEvent>> {
        Ok(self.data()?.state.for_property(property_id).events)
    }

    /// Every stored blocker of one property.
    pub fn blockers_for(&self, property_id: &str) -> StoreResult<Vec<StoredBlocker>> {
        Ok(self.data()?.state.for_property(property_id).blockers)
    }

    fn data(&self) -> StoreResult<MutexGuard<'_, MemoryData>> {
        self.data
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn writable(&self, stage: Stage) -> StoreResult<MutexGuard<'_, MemoryData>> {
        let data = self.data()?;
        if data.fail_at == Some(stage) {
            return Err(StoreError::Query(format!("injected failure while {}", stage)));
        }
        Ok(data)
    }
}

impl ScheduleStore for MemoryStore {
    fn events_overlapping(
        &self,
        property_id: &str,
        range: &Interval,
    ) -> StoreResult<Vec<GeneratedEvent>> {
        Ok(self
            .data()?
            .state
            .events
            .iter()
            .filter(|e| replaceable(e, property_id, range))
            .cloned()
            .collect())
    }

    fn requests_overlapping(
        &self,
        property_id: &str,
        range: &Interval,
    ) -> StoreResult<Vec<GeneratedEvent>> {
        Ok(self
            .data()?
            .state
            .events
            .iter()
            .filter(|e| {
                e.property_id == property_id
                    && e.event_type == EventType::Request
                    && e.range.overlaps(range)
            })
            .cloned()
            .collect())
    }

    fn blockers_in_range(
        &self,
        property_id: &str,
        range: &Interval,
    ) -> StoreResult<Vec<StoredBlocker>> {
        Ok(self
            .data()?
            .state
            .blockers
            .iter()
            .filter(|b| b.property_id == property_id && range.contains(&b.entry.range))
            .cloned()
            .collect())
    }

    fn delete_events_overlapping(
        &mut self,
        property_id: &str,
        range: &Interval,
    ) -> StoreResult<usize> {
        let mut data = self.writable(Stage::DeletingEvents)?;
        let before = data.state.events.len();
        data.state
            .events
            .retain(|e| !replaceable(e, property_id, range));
        Ok(before - data.state.events.len())
    }

    fn delete_blockers_in_range(
        &mut self,
        property_id: &str,
        range: &Interval,
    ) -> StoreResult<usize> {
        let mut data = self.writable(Stage::DeletingBlockers)?;
        let before = data.state.blockers.len();
        data.state
            .blockers
            .retain(|b| !(b.property_id == property_id && range.contains(&b.entry.range)));
        Ok(before - data.state.blockers.len())
    }

    fn insert_blockers(
        &mut self,
        property_id: &str,
        blockers: &[BlockingEntry],
    ) -> StoreResult<usize> {
        let mut data = self.writable(Stage::InsertingBlockers)?;
        data.state
            .blockers
            .extend(blockers.iter().map(|entry| StoredBlocker {
                property_id: property_id.to_string(),
                entry: entry.clone(),
            }));
        Ok(blockers.len())
    }

    fn insert_events(&mut self, events: &[GeneratedEvent]) -> StoreResult<usize> {
        let mut data = self.writable(Stage::InsertingEvents)?;
        data.state.events.extend_from_slice(events);
        Ok(events.len())
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn begin(&mut self, property_id: &str) -> StoreResult<()> {
        let mut data = self.data()?;
        if data.transactions.contains_key(property_id) {
            return Err(StoreError::Busy(property_id.to_string()));
        }
        let saved = data.state.for_property(property_id);
        data.transactions.insert(
            property_id.to_string(),
            OpenTransaction {
                handle: self.handle,
                saved,
            },
        );
        Ok(())
    }

    fn commit(&mut self, property_id: &str) -> StoreResult<()> {
        let mut data = self.data()?;
        if !holds_lock(&data, property_id, self.handle) {
            return Err(StoreError::NoTransaction(property_id.to_string()));
        }
        data.transactions.remove(property_id);
        Ok(())
    }

    fn rollback(&mut self, property_id: &str) -> StoreResult<()> {
        let mut data = self.data()?;
        if !holds_lock(&data, property_id, self.handle) {
            return Err(StoreError::NoTransaction(property_id.to_string()));
        }
        if let Some(tx) = data.transactions.remove(property_id) {
            data.state.replace_property(property_id, tx.saved);
        }
        Ok(())
    }
}

fn replaceable(event: &GeneratedEvent, property_id: &str, range: &Interval) -> bool {
    event.property_id == property_id
        && event.event_type.is_generated()
        && event.range.overlaps(range)
}

fn holds_lock(data: &MemoryData, property_id: &str, handle: u64) -> bool {
    data.transactions
        .get(property_id)
        .is_some_and(|tx| tx.handle == handle)
}
