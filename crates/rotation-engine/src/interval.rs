//! Half-open date intervals and the algebra the generator trims with.
//!
//! Every interval is `[start, end)`: the start instant belongs to the interval,
//! the end instant does not. Two intervals that merely touch (`a.end == b.start`)
//! do not overlap, so back-to-back turns never double-count the changeover day.
//!
//! Intervals persist as canonical range literals, e.g.
//! `[2025-01-01T00:00:00Z,2025-01-08T00:00:00Z)`, which is also their serde form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, RotationError};

/// A half-open interval `[start, end)` in UTC.
///
/// [`Interval::new`] rejects `start >= end`. Windows produced by
/// [`Interval::trim_against`] may end up empty after several trims; check
/// [`Interval::is_empty`] before using one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Floor an instant to 00:00:00 UTC on the same calendar day.
pub fn start_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Parse a date or datetime bound into a UTC instant.
///
/// Accepts RFC 3339 (`2025-01-01T00:00:00Z`), a naive datetime interpreted as
/// UTC (`2025-01-01T00:00:00`), the SQL range style (`2025-01-01 00:00:00+00`),
/// and a bare date (`2025-01-01`, midnight UTC).
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%#z") {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ndt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|e| RotationError::InvalidDate(format!("'{}': {}", s, e)))
}

impl Interval {
    /// Create an interval, rejecting zero- and negative-length ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(RotationError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Create an interval after flooring both bounds to the start of their day.
    ///
    /// Validation runs on the normalized bounds, so `[Jan 1 09:00, Jan 1 17:00)`
    /// is rejected: it collapses to an empty day range.
    pub fn normalized(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        Self::new(start_of_day(start), start_of_day(end))
    }

    /// Create a day-aligned interval from calendar dates.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(
            start.and_time(NaiveTime::MIN).and_utc(),
            end.and_time(NaiveTime::MIN).and_utc(),
        )
    }

    /// Re-normalize an existing interval to day granularity.
    pub fn to_day_granularity(&self) -> Result<Self> {
        Self::normalized(self.start, self.end)
    }

    /// True when the interval covers no time at all.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Length in whole days, rounded down. Zero for empty intervals.
    pub fn whole_days(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.duration().num_days()
        }
    }

    /// True iff the two half-open ranges share at least one instant.
    ///
    /// Touching intervals (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Boundary-inclusive containment: `self.start <= inner.start && inner.end <= self.end`.
    ///
    /// A blocker whose bounds coincide exactly with a window's bounds contains it.
    pub fn contains(&self, inner: &Interval) -> bool {
        self.start <= inner.start && inner.end <= self.end
    }

    /// True iff `instant` lies in `[start, end)`.
    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// The shared part of two intervals, if they overlap.
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Interval {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Trim a candidate window against one blocking interval.
    ///
    /// Returns `None` when the blocker contains the window (boundary-inclusive).
    /// Otherwise the start advances to `blocker.end` if that falls strictly inside
    /// the window, and the end retracts to `blocker.start` if that falls strictly
    /// inside the window. Both edges are tested against the window as passed in,
    /// so a blocker sitting strictly inside the window leaves an empty result.
    pub fn trim_against(&self, blocker: &Interval) -> Option<Interval> {
        if blocker.contains(self) {
            return None;
        }

        let mut trimmed = *self;
        if blocker.end > self.start && blocker.end < self.end {
            trimmed.start = blocker.end;
        }
        if blocker.start > self.start && blocker.start < self.end {
            trimmed.end = blocker.start;
        }
        Some(trimmed)
    }

    /// Start of every day in `[start, end)`, in order.
    pub fn days(&self) -> impl Iterator<Item = DateTime<Utc>> {
        let end = self.end;
        std::iter::successors(Some(start_of_day(self.start)), |day| {
            day.checked_add_signed(Duration::days(1))
        })
        .take_while(move |day| *day < end)
    }

    /// Canonical `[start,end)` literal with RFC 3339 bounds.
    pub fn to_range_literal(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{})",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

impl FromStr for Interval {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self> {
        let literal = s.trim();
        let inner = literal
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| {
                RotationError::InvalidRangeLiteral(format!(
                    "expected '[start,end)', got '{}'",
                    literal
                ))
            })?;

        let (start, end) = inner.split_once(',').ok_or_else(|| {
            RotationError::InvalidRangeLiteral(format!("missing ',' in '{}'", literal))
        })?;

        let start = parse_instant(start.trim().trim_matches('"'))?;
        let end = parse_instant(end.trim().trim_matches('"'))?;
        Interval::new(start, end)
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let literal = String::deserialize(deserializer)?;
        literal.parse().map_err(serde::de::Error::custom)
    }
}
