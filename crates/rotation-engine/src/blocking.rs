//! Blocking entries: named intervals that veto or truncate turn windows.
//!
//! Exemptions take a period out of the rotation but leave it open for ad hoc
//! requests. Maintenance entries are hard closures. Both trim candidate windows
//! identically; the kind only matters for what gets persisted alongside them.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::generator::{EventStatus, EventType, GeneratedEvent};
use crate::interval::Interval;

/// What a blocking entry represents downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingKind {
    /// Skipped by the rotation, still bookable on request.
    Exemption,
    /// Property closed.
    Maintenance,
}

/// A named blocking interval supplied with each generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingEntry {
    pub name: String,
    pub range: Interval,
    pub kind: BlockingKind,
}

impl BlockingEntry {
    pub fn new(name: impl Into<String>, range: Interval, kind: BlockingKind) -> Self {
        Self {
            name: name.into(),
            range,
            kind,
        }
    }

    pub fn exemption(name: impl Into<String>, range: Interval) -> Self {
        Self::new(name, range, BlockingKind::Exemption)
    }

    pub fn maintenance(name: impl Into<String>, range: Interval) -> Self {
        Self::new(name, range, BlockingKind::Maintenance)
    }
}

/// What is left of a theoretical window after every overlapping blocker ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFate {
    /// No blocker overlapped the window.
    Open(Interval),
    /// One or more blockers narrowed the window; something remains.
    Trimmed(Interval),
    /// A single blocker contained the window.
    Blocked,
    /// Partial blockers narrowed the window down to nothing.
    Consumed,
}

impl WindowFate {
    /// The window a turn should occupy, if any.
    pub fn bookable(&self) -> Option<Interval> {
        match self {
            WindowFate::Open(window) | WindowFate::Trimmed(window) => Some(*window),
            WindowFate::Blocked | WindowFate::Consumed => None,
        }
    }
}

/// The blocking entries for one generation run, held in canonical order.
///
/// Entries are sorted by `(start, end, kind, name)` on construction, so trimming
/// depends on which blockers exist and never on the order the caller listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockingSet {
    entries: Vec<BlockingEntry>,
}

impl BlockingSet {
    /// Normalize every entry to day granularity and sort canonically.
    ///
    /// # Errors
    /// Returns `RotationError::InvalidInterval` for an entry that is empty once
    /// its bounds are floored to the start of their day.
    pub fn new(entries: Vec<BlockingEntry>) -> Result<Self> {
        let mut entries = entries
            .into_iter()
            .map(|entry| {
                Ok(BlockingEntry {
                    range: entry.range.to_day_granularity()?,
                    ..entry
                })
            })
            .collect::<Result<Vec<_>>>()?;

        entries.sort_by(|a, b| {
            (a.range.start, a.range.end, a.kind, &a.name).cmp(&(
                b.range.start,
                b.range.end,
                b.kind,
                &b.name,
            ))
        });

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[BlockingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose range overlaps `window`.
    pub fn overlapping<'a>(
        &'a self,
        window: &'a Interval,
    ) -> impl Iterator<Item = &'a BlockingEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.range.overlaps(window))
    }

    /// Fold every blocker that overlaps the theoretical window over it in turn.
    ///
    /// Each blocker trims the already-trimmed window. The fold stops as soon as a
    /// blocker contains the current window or the window becomes empty.
    pub fn trim_window(&self, window: &Interval) -> WindowFate {
        let mut actual = *window;
        let mut touched = false;

        for entry in self.overlapping(window) {
            touched = true;
            match actual.trim_against(&entry.range) {
                None => return WindowFate::Blocked,
                Some(trimmed) if trimmed.is_empty() => return WindowFate::Consumed,
                Some(trimmed) => actual = trimmed,
            }
        }

        if touched {
            WindowFate::Trimmed(actual)
        } else {
            WindowFate::Open(actual)
        }
    }

    /// One `maintenance` event per maintenance entry, so capacity checks see closures.
    pub fn maintenance_events(&self, property_id: &str) -> Vec<GeneratedEvent> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == BlockingKind::Maintenance)
            .map(|entry| GeneratedEvent {
                property_id: property_id.to_string(),
                member_id: None,
                range: entry.range,
                event_type: EventType::Maintenance,
                status: EventStatus::Confirmed,
            })
            .collect()
    }
}
