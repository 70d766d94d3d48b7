//! Tests for the staged replace transaction, dry run and run outcomes.

use chrono::{DateTime, TimeZone, Utc};
use rotation_engine::request::{BlockerInput, CycleInput, RangeInput};
use rotation_engine::store::StoredBlocker;
use rotation_engine::{
    regenerate, BlockingEntry, BlockingKind, EventStatus, EventType, GeneratedEvent, Interval,
    MemoryStore, ReplacePlan, RotationError, ScheduleRequest, ScheduleStore, Stage, StoreError,
    StoreSnapshot,
};

fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

fn iv(start: (i32, u32, u32), end: (i32, u32, u32)) -> Interval {
    Interval::new(day(start.0, start.1, start.2), day(end.0, end.1, end.2)).unwrap()
}

fn stored_event(
    property: &str,
    member: Option<&str>,
    event_type: EventType,
    range: Interval,
) -> GeneratedEvent {
    GeneratedEvent {
        property_id: property.to_string(),
        member_id: member.map(str::to_string),
        range,
        event_type,
        status: EventStatus::Confirmed,
    }
}

fn stored_blocker(property: &str, name: &str, range: Interval) -> StoredBlocker {
    StoredBlocker {
        property_id: property.to_string(),
        entry: BlockingEntry::exemption(name, range),
    }
}

/// Jan 1 - Mar 1 2025, weekly turns alternating between two members, Jan 8 week closed.
fn request() -> ScheduleRequest {
    ScheduleRequest {
        property_id: "lake-house".to_string(),
        range: RangeInput {
            start: "2025-01-01".to_string(),
            end: "2025-03-01".to_string(),
        },
        window_weeks: Some(1),
        blockers: vec![BlockerInput {
            name: "Boiler".to_string(),
            start: "2025-01-08".to_string(),
            end: "2025-01-15".to_string(),
            kind: BlockingKind::Maintenance,
        }],
        cycle: vec![
            CycleInput {
                week_index: 0,
                member_id: "member-a".to_string(),
            },
            CycleInput {
                week_index: 1,
                member_id: "member-b".to_string(),
            },
        ],
        cycle_length: 2,
    }
}

/// Existing state: an old turn inside the range, a request straddling the start,
/// an event after the range, another property's turn, and three blockers.
fn seeded_store() -> MemoryStore {
    MemoryStore::from_snapshot(StoreSnapshot {
        events: vec![
            stored_event(
                "lake-house",
                Some("old"),
                EventType::Turn,
                iv((2025, 1, 15), (2025, 1, 22)),
            ),
            stored_event(
                "lake-house",
                Some("guest"),
                EventType::Request,
                iv((2024, 12, 28), (2025, 1, 3)),
            ),
            stored_event(
                "lake-house",
                Some("later"),
                EventType::Turn,
                iv((2025, 3, 1), (2025, 3, 8)),
            ),
            stored_event(
                "beach-hut",
                Some("other"),
                EventType::Turn,
                iv((2025, 1, 1), (2025, 1, 8)),
            ),
        ],
        blockers: vec![
            stored_blocker("lake-house", "Inside", iv((2025, 2, 1), (2025, 2, 5))),
            stored_blocker("lake-house", "Straddling", iv((2024, 12, 20), (2025, 1, 5))),
            stored_blocker("beach-hut", "Elsewhere", iv((2025, 2, 1), (2025, 2, 5))),
        ],
    })
}

#[test]
fn apply_replaces_state_in_range() {
    let mut store = seeded_store();
    let plan = ReplacePlan::build(&request(), None).unwrap();

    let summary = plan.apply(&mut store).unwrap();

    assert_eq!(summary.events_deleted, 1, "only the old turn; requests are kept");
    assert_eq!(summary.blockers_deleted, 1, "only the blocker inside the range");
    assert_eq!(summary.blockers_inserted, 1);
    assert_eq!(summary.events_inserted, 8, "seven turns and one maintenance event");

    let events = store.events_for("lake-house").unwrap();
    assert!(events.iter().all(|e| e.member_id.as_deref() != Some("old")));
    assert!(events.iter().any(|e| e.member_id.as_deref() == Some("guest")));
    assert!(events.iter().any(|e| e.member_id.as_deref() == Some("later")));
    assert_eq!(store.events_for("beach-hut").unwrap().len(), 1);
}

#[test]
fn blocker_deletion_matches_bounds_not_overlap() {
    // Turns are deleted by overlap, blockers only when wholly inside the range:
    // the blocker straddling Jan 1 survives the run.
    let mut store = seeded_store();
    let plan = ReplacePlan::build(&request(), None).unwrap();

    plan.apply(&mut store).unwrap();

    let names: Vec<String> = store
        .blockers_for("lake-house")
        .unwrap()
        .into_iter()
        .map(|b| b.entry.name)
        .collect();
    assert!(names.contains(&"Straddling".to_string()));
    assert!(names.contains(&"Boiler".to_string()));
    assert!(!names.contains(&"Inside".to_string()));
    assert_eq!(store.blockers_for("beach-hut").unwrap().len(), 1);
}

#[test]
fn maintenance_blocker_is_persisted_as_blocker_and_event() {
    let mut store = MemoryStore::new();
    ReplacePlan::build(&request(), None)
        .unwrap()
        .apply(&mut store)
        .unwrap();

    let blockers = store.blockers_for("lake-house").unwrap();
    assert_eq!(blockers.len(), 1);
    assert_eq!(blockers[0].entry.kind, BlockingKind::Maintenance);

    let maintenance: Vec<_> = store
        .events_for("lake-house")
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == EventType::Maintenance)
        .collect();
    assert_eq!(maintenance.len(), 1);
    assert_eq!(maintenance[0].range, iv((2025, 1, 8), (2025, 1, 15)));
}

#[test]
fn member_requests_survive_regeneration() {
    let request_range = iv((2025, 1, 3), (2025, 1, 5));
    let mut store = MemoryStore::from_snapshot(StoreSnapshot {
        events: vec![
            stored_event("lake-house", Some("guest"), EventType::Request, request_range),
            stored_event(
                "lake-house",
                None,
                EventType::Maintenance,
                iv((2025, 1, 20), (2025, 1, 21)),
            ),
        ],
        blockers: Vec::new(),
    });
    let plan = ReplacePlan::build(&request(), None).unwrap();

    let summary = plan.apply(&mut store).unwrap();

    assert_eq!(summary.events_deleted, 1, "the old maintenance event only");
    let requests: Vec<GeneratedEvent> = store
        .events_for("lake-house")
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == EventType::Request)
        .collect();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].range, request_range);

    // A second run still leaves the request alone.
    let summary = plan.apply(&mut store).unwrap();
    assert_eq!(summary.events_deleted, 8);
    assert_eq!(
        store
            .events_for("lake-house")
            .unwrap()
            .iter()
            .filter(|e| e.event_type == EventType::Request)
            .count(),
        1
    );
}

#[test]
fn rerunning_same_request_is_stable() {
    let mut store = seeded_store();
    let plan = ReplacePlan::build(&request(), None).unwrap();

    plan.apply(&mut store).unwrap();
    let first = store.snapshot().unwrap();
    let summary = plan.apply(&mut store).unwrap();
    let second = store.snapshot().unwrap();

    assert_eq!(summary.events_deleted, 8);
    assert_eq!(summary.blockers_deleted, 1);
    assert_eq!(first.events.len(), second.events.len());
    assert_eq!(first.blockers.len(), second.blockers.len());
}

#[test]
fn preview_reports_changes_without_writing() {
    let store = seeded_store();
    let before = store.snapshot().unwrap();
    let plan = ReplacePlan::build(&request(), None).unwrap();

    let preview = plan.preview(&store).unwrap();

    assert_eq!(preview.events_to_delete.len(), 1);
    assert!(preview
        .events_to_delete
        .iter()
        .all(|e| e.event_type != EventType::Request));
    assert_eq!(preview.blockers_to_delete.len(), 1);
    assert_eq!(preview.blockers_to_insert.len(), 1);
    assert_eq!(preview.events_to_insert.len(), 8);
    // The guest request (Dec 28 - Jan 3) collides with member-a's first turn.
    assert_eq!(preview.displaced_requests.len(), 1);
    assert_eq!(preview.displaced_requests[0].overlap_days, 2);
    assert_eq!(store.snapshot().unwrap(), before);
}

#[test]
fn failed_insert_rolls_back_transactional_store() {
    let mut store = seeded_store();
    let before = store.snapshot().unwrap();
    store.fail_at(Some(Stage::InsertingEvents)).unwrap();
    let plan = ReplacePlan::build(&request(), None).unwrap();

    let err = plan.apply(&mut store).unwrap_err();

    match err {
        RotationError::Persistence {
            stage, rolled_back, ..
        } => {
            assert_eq!(stage, Stage::InsertingEvents);
            assert!(rolled_back);
        }
        other => panic!("expected persistence error, got {:?}", other),
    }
    let after = store.snapshot().unwrap();
    assert_eq!(after.events.len(), before.events.len());
    assert_eq!(after.blockers.len(), before.blockers.len());
}

#[test]
fn failed_run_releases_the_property_lock() {
    let mut store = seeded_store();
    store.fail_at(Some(Stage::DeletingBlockers)).unwrap();
    let plan = ReplacePlan::build(&request(), None).unwrap();
    assert!(plan.apply(&mut store).is_err());

    store.fail_at(None).unwrap();
    assert!(plan.apply(&mut store).is_ok());
}

#[test]
fn concurrent_run_on_same_property_is_refused() {
    let mut first = seeded_store();
    let mut second = first.connect();
    first.begin("lake-house").unwrap();

    let plan = ReplacePlan::build(&request(), None).unwrap();
    let err = plan.apply(&mut second).unwrap_err();

    assert_eq!(
        err,
        RotationError::Persistence {
            stage: Stage::Locking,
            message: StoreError::Busy("lake-house".to_string()).to_string(),
            rolled_back: true,
        }
    );
    // Other properties are unaffected by the lock.
    assert!(second.begin("beach-hut").is_ok());

    first.commit("lake-house").unwrap();
    assert!(plan.apply(&mut second).is_ok());
}

#[test]
fn commit_from_another_handle_is_refused() {
    let mut first = MemoryStore::new();
    let mut second = first.connect();
    first.begin("lake-house").unwrap();

    assert_eq!(
        second.commit("lake-house").unwrap_err(),
        StoreError::NoTransaction("lake-house".to_string())
    );
}

/// A store without transactions that fails when inserting events.
#[derive(Default)]
struct PlainStore {
    events: Vec<GeneratedEvent>,
    fail_inserts: bool,
}

impl ScheduleStore for PlainStore {
    fn events_overlapping(
        &self,
        property_id: &str,
        range: &Interval,
    ) -> Result<Vec<GeneratedEvent>, StoreError> {
        Ok(self
            .events
            .iter()
            .filter(|e| {
                e.property_id == property_id
                    && e.event_type.is_generated()
                    && e.range.overlaps(range)
            })
            .cloned()
            .collect())
    }

    fn requests_overlapping(
        &self,
        property_id: &str,
        range: &Interval,
    ) -> Result<Vec<GeneratedEvent>, StoreError> {
        Ok(self
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
        _property_id: &str,
        _range: &Interval,
    ) -> Result<Vec<StoredBlocker>, StoreError> {
        Ok(Vec::new())
    }

    fn delete_events_overlapping(
        &mut self,
        property_id: &str,
        range: &Interval,
    ) -> Result<usize, StoreError> {
        let before = self.events.len();
        self.events.retain(|e| {
            !(e.property_id == property_id
                && e.event_type.is_generated()
                && e.range.overlaps(range))
        });
        Ok(before - self.events.len())
    }

    fn delete_blockers_in_range(
        &mut self,
        _property_id: &str,
        _range: &Interval,
    ) -> Result<usize, StoreError> {
        Ok(0)
    }

    fn insert_blockers(
        &mut self,
        _property_id: &str,
        blockers: &[BlockingEntry],
    ) -> Result<usize, StoreError> {
        Ok(blockers.len())
    }

    fn insert_events(&mut self, events: &[GeneratedEvent]) -> Result<usize, StoreError> {
        if self.fail_inserts {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.events.extend_from_slice(events);
        Ok(events.len())
    }
}

#[test]
fn failure_after_delete_on_plain_store_warns_calendar_may_be_cleared() {
    let mut store = PlainStore {
        events: vec![stored_event(
            "lake-house",
            Some("old"),
            EventType::Turn,
            iv((2025, 1, 15), (2025, 1, 22)),
        )],
        fail_inserts: true,
    };

    let outcome = regenerate(&mut store, &request(), None);

    assert!(!outcome.success);
    assert_eq!(outcome.stage, Some(Stage::InsertingEvents));
    assert!(outcome.calendar_may_be_cleared);
    assert!(outcome.message.contains("inserting events"));
    assert!(store.events.is_empty(), "plain store cannot undo the delete");
}

#[test]
fn invalid_request_fails_before_touching_store() {
    let mut store = seeded_store();
    let before = store.snapshot().unwrap();
    let mut req = request();
    req.cycle_length = 0;

    let outcome = regenerate(&mut store, &req, None);

    assert!(!outcome.success);
    assert_eq!(outcome.stage, None);
    assert!(!outcome.calendar_may_be_cleared);
    assert!(outcome.message.contains("cycle length"));
    assert_eq!(store.snapshot().unwrap(), before);
}

#[test]
fn successful_run_outcome_carries_summary() {
    let mut store = seeded_store();

    let outcome = regenerate(&mut store, &request(), None);

    assert!(outcome.success, "{}", outcome.message);
    let summary = outcome.summary.unwrap();
    assert_eq!(summary.events_inserted, 8);

    let json = serde_json::to_value(&regenerate(&mut store, &request(), None)).unwrap();
    assert_eq!(json["success"], serde_json::json!(true));
    assert!(json.get("stage").is_none());
}
