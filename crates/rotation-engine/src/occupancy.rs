//! Per-day capacity and conflict evaluation over a persisted event set.
//!
//! Pure functions of the events passed in; nothing here is cached between calls.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::generator::{EventType, GeneratedEvent};
use crate::interval::Interval;

/// Occupancy of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayOccupancy {
    pub day: NaiveDate,
    /// `turn` and `request` events overlapping the day.
    pub occupied: usize,
    /// Remaining capacity; always 0 under maintenance.
    pub free: u32,
    pub maintenance: bool,
    /// Maintenance overlaps the day while turns or requests also do.
    pub conflict: bool,
    /// More turns or requests than the property holds.
    pub overbooked: bool,
}

impl DayOccupancy {
    pub fn is_free(&self) -> bool {
        self.free > 0
    }
}

fn day_interval(day: NaiveDate) -> Interval {
    let start: DateTime<Utc> = day.and_time(NaiveTime::MIN).and_utc();
    Interval {
        start,
        end: start + Duration::days(1),
    }
}

/// Evaluate one day against `capacity`.
pub fn day_occupancy(events: &[GeneratedEvent], day: NaiveDate, capacity: u32) -> DayOccupancy {
    let span = day_interval(day);

    let mut occupied = 0usize;
    let mut maintenance = false;
    for event in events.iter().filter(|e| e.range.overlaps(&span)) {
        match event.event_type {
            EventType::Maintenance => maintenance = true,
            EventType::Turn | EventType::Request => occupied += 1,
        }
    }

    let free = if maintenance {
        0
    } else {
        let taken = u32::try_from(occupied).unwrap_or(u32::MAX);
        capacity.saturating_sub(taken)
    };

    DayOccupancy {
        day,
        occupied,
        free,
        maintenance,
        conflict: maintenance && occupied > 0,
        overbooked: occupied > capacity as usize,
    }
}

/// Evaluate every day in `range`.
pub fn occupancy_for_range(
    events: &[GeneratedEvent],
    range: &Interval,
    capacity: u32,
) -> Vec<DayOccupancy> {
    let relevant: Vec<GeneratedEvent> = events
        .iter()
        .filter(|e| e.range.overlaps(range))
        .cloned()
        .collect();

    range
        .days()
        .map(|day| day_occupancy(&relevant, day.date_naive(), capacity))
        .collect()
}
