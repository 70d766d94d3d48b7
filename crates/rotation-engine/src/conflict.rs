//! Detect overlapping events between two event lists.
//!
//! Adjacent events (one ends exactly when the other starts) are NOT conflicts.

use serde::Serialize;

use crate::generator::GeneratedEvent;

/// A detected overlap between two events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub event_a: GeneratedEvent,
    pub event_b: GeneratedEvent,
    /// Length of the shared part, in whole days.
    pub overlap_days: i64,
}

/// Find all pairwise conflicts between two event lists.
///
/// Pairs are reported in `events_a` order, then `events_b` order. The overlap is
/// `min(a.end, b.end) - max(a.start, b.start)`.
pub fn find_conflicts(events_a: &[GeneratedEvent], events_b: &[GeneratedEvent]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for a in events_a {
        for b in events_b {
            if let Some(shared) = a.range.intersection(&b.range) {
                conflicts.push(Conflict {
                    event_a: a.clone(),
                    event_b: b.clone(),
                    overlap_days: shared.whole_days(),
                });
            }
        }
    }

    conflicts
}
