//! Turn-schedule generation over a half-open target range.
//!
//! The target range is walked in fixed windows of `window_weeks` weeks. Each
//! theoretical window is trimmed against the blocking set; whatever remains is
//! handed to the members the cycle pattern assigns to that window.
//!
//! Two policies shape the walk:
//!
//! - The cadence follows the *theoretical* windows. A blocked or trimmed window
//!   still advances the cursor by a full window and still consumes one tick of
//!   the week counter, so the cycle stays phase-locked to calendar time.
//! - A trailing window that would run past the end of the range is dropped, not
//!   truncated. The walk stops at the first such window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blocking::{BlockingSet, WindowFate};
use crate::cycle::CyclePattern;
use crate::error::{Result, RotationError};
use crate::interval::Interval;

/// Kind of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Assigned by the rotation.
    Turn,
    /// Ad hoc booking made by a member outside the rotation.
    Request,
    /// Property closed.
    Maintenance,
}

impl EventType {
    /// Whether a regeneration run owns events of this type and may replace them.
    ///
    /// Requests belong to the member who made them and are never replaced.
    pub fn is_generated(self) -> bool {
        matches!(self, EventType::Turn | EventType::Maintenance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
}

/// An event produced by a generation run, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedEvent {
    pub property_id: String,
    /// `None` only for maintenance events.
    pub member_id: Option<String>,
    pub range: Interval,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub status: EventStatus,
}

/// One theoretical window of the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateWindow {
    /// Running index of the window since the start of the range.
    pub week_counter: u32,
    pub window: Interval,
}

/// A candidate window together with what the blocking set left of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedWindow {
    pub candidate: CandidateWindow,
    pub fate: WindowFate,
}

/// Iterator over the full-length windows that fit in a target range.
#[derive(Debug, Clone)]
pub struct CandidateWindows {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    week_counter: u32,
}

impl Iterator for CandidateWindows {
    type Item = CandidateWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }

        let window_end = match self.cursor.checked_add_signed(self.step) {
            Some(window_end) if window_end <= self.end => window_end,
            // Trailing partial window: stop the walk entirely.
            _ => {
                self.cursor = self.end;
                return None;
            }
        };

        let candidate = CandidateWindow {
            week_counter: self.week_counter,
            window: Interval {
                start: self.cursor,
                end: window_end,
            },
        };
        self.cursor = window_end;
        self.week_counter = self.week_counter.wrapping_add(1);
        Some(candidate)
    }
}

/// Walk `range` (normalized to day granularity) in windows of `window_weeks` weeks.
///
/// # Errors
/// Returns `RotationError::InvalidWindowWeeks` when `window_weeks` is zero, and
/// `RotationError::InvalidInterval` when the normalized range is empty.
pub fn candidate_windows(range: &Interval, window_weeks: u32) -> Result<CandidateWindows> {
    if window_weeks == 0 {
        return Err(RotationError::InvalidWindowWeeks(0));
    }
    let range = range.to_day_granularity()?;

    Ok(CandidateWindows {
        cursor: range.start,
        end: range.end,
        step: Duration::weeks(i64::from(window_weeks)),
        week_counter: 0,
    })
}

/// Trim every candidate window of the range against the blocking set.
pub fn plan_windows(
    range: &Interval,
    window_weeks: u32,
    blockers: &BlockingSet,
) -> Result<Vec<PlannedWindow>> {
    let planned = candidate_windows(range, window_weeks)?
        .map(|candidate| {
            let fate = blockers.trim_window(&candidate.window);
            match fate {
                WindowFate::Blocked => debug!(
                    week_counter = candidate.week_counter,
                    window = %candidate.window,
                    "window fully blocked"
                ),
                WindowFate::Consumed => debug!(
                    week_counter = candidate.week_counter,
                    window = %candidate.window,
                    "window consumed by partial blockers"
                ),
                WindowFate::Trimmed(actual) => debug!(
                    week_counter = candidate.week_counter,
                    window = %candidate.window,
                    trimmed = %actual,
                    "window trimmed"
                ),
                WindowFate::Open(_) => {}
            }
            PlannedWindow { candidate, fate }
        })
        .collect();

    Ok(planned)
}

/// Generate the rotation's turn events for one property.
///
/// Emits one `turn` event per member assigned to `pattern[week_counter mod
/// length]` for every window that survives trimming, each spanning the trimmed
/// window. Windows that are blocked or consumed emit nothing but still tick the
/// counter. The result depends only on the inputs, so identical calls produce
/// identical lists.
///
/// # Errors
/// Fails fast on `window_weeks == 0` or an empty normalized range, before any
/// window is produced.
pub fn generate(
    property_id: &str,
    range: &Interval,
    window_weeks: u32,
    blockers: &BlockingSet,
    pattern: &CyclePattern,
) -> Result<Vec<GeneratedEvent>> {
    let events: Vec<GeneratedEvent> = plan_windows(range, window_weeks, blockers)?
        .into_iter()
        .filter_map(|planned| {
            planned
                .fate
                .bookable()
                .map(|window| (planned.candidate.week_counter, window))
        })
        .flat_map(|(week_counter, window)| {
            pattern
                .members_for(week_counter)
                .iter()
                .map(move |member_id| GeneratedEvent {
                    property_id: property_id.to_string(),
                    member_id: Some(member_id.clone()),
                    range: window,
                    event_type: EventType::Turn,
                    status: EventStatus::Confirmed,
                })
        })
        .collect();

    debug!(
        property_id,
        range = %range,
        window_weeks,
        turns = events.len(),
        "generated turn schedule"
    );
    Ok(events)
}
