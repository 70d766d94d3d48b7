//! Tests for the per-day capacity and conflict check.

use chrono::{NaiveDate, TimeZone, Utc};
use rotation_engine::{
    day_occupancy, occupancy_for_range, EventStatus, EventType, GeneratedEvent, Interval,
};

fn jan(start_day: u32, end_day: u32) -> Interval {
    Interval::new(
        Utc.with_ymd_and_hms(2025, 1, start_day, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, end_day, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

fn event(member: Option<&str>, event_type: EventType, range: Interval) -> GeneratedEvent {
    GeneratedEvent {
        property_id: "lake-house".to_string(),
        member_id: member.map(str::to_string),
        range,
        event_type,
        status: EventStatus::Confirmed,
    }
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

#[test]
fn day_below_capacity_is_free() {
    let events = vec![event(Some("anna"), EventType::Turn, jan(1, 8))];

    let day = day_occupancy(&events, date(3), 2);

    assert_eq!(day.occupied, 1);
    assert_eq!(day.free, 1);
    assert!(day.is_free());
    assert!(!day.conflict);
}

#[test]
fn turns_and_requests_both_count() {
    let events = vec![
        event(Some("anna"), EventType::Turn, jan(1, 8)),
        event(Some("ben"), EventType::Request, jan(3, 5)),
    ];

    let day = day_occupancy(&events, date(4), 2);

    assert_eq!(day.occupied, 2);
    assert_eq!(day.free, 0);
    assert!(!day.is_free());
    assert!(!day.overbooked);
}

#[test]
fn end_day_is_not_occupied() {
    // [Jan 1, Jan 8) does not include Jan 8.
    let events = vec![event(Some("anna"), EventType::Turn, jan(1, 8))];

    let day = day_occupancy(&events, date(8), 1);

    assert_eq!(day.occupied, 0);
    assert!(day.is_free());
}

#[test]
fn maintenance_zeroes_capacity() {
    let events = vec![event(None, EventType::Maintenance, jan(10, 12))];

    let day = day_occupancy(&events, date(10), 3);

    assert!(day.maintenance);
    assert_eq!(day.free, 0);
    assert!(!day.conflict, "maintenance alone is not a conflict");
}

#[test]
fn maintenance_with_turn_is_a_conflict() {
    let events = vec![
        event(None, EventType::Maintenance, jan(10, 12)),
        event(Some("anna"), EventType::Turn, jan(8, 15)),
    ];

    let day = day_occupancy(&events, date(11), 3);

    assert!(day.conflict);
    assert_eq!(day.free, 0);
    assert_eq!(day.occupied, 1);
}

#[test]
fn more_occupants_than_capacity_is_overbooked() {
    let events = vec![
        event(Some("anna"), EventType::Turn, jan(1, 8)),
        event(Some("ben"), EventType::Request, jan(2, 3)),
    ];

    let day = day_occupancy(&events, date(2), 1);

    assert!(day.overbooked);
    assert_eq!(day.free, 0);
}

#[test]
fn range_reports_every_day() {
    let events = vec![
        event(Some("anna"), EventType::Turn, jan(1, 4)),
        event(None, EventType::Maintenance, jan(5, 6)),
    ];

    let days = occupancy_for_range(&events, &jan(1, 8), 1);

    assert_eq!(days.len(), 7);
    let free: Vec<u32> = days.iter().map(|d| d.free).collect();
    assert_eq!(free, vec![0, 0, 0, 1, 0, 1, 1]);
    assert_eq!(days[4].day, date(5));
    assert!(days[4].maintenance);
}
