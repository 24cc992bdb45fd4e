use chrono::{Datelike, NaiveDate};
use domain::{AssignmentStatus, CycleStatus, DateWindow};
use mrc_storage::{
    AssignmentRecord, AssignmentStore, AssignmentUpdate, InMemoryAssignmentStore,
    InMemoryMeterReadingStore, InMemoryMeterStore, InMemoryReadingCycleStore,
    InMemoryReminderStore, MeterReadingRecord, MeterReadingStore, MeterRecord, MeterStore,
    MeterUpdate, ReadingCycleRecord, ReadingCycleStore, ReadingCycleUpdate, ReminderRecord,
    ReminderStore,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn cycle(cycle_id: &str, service_id: &str, from: NaiveDate, to: NaiveDate) -> ReadingCycleRecord {
    ReadingCycleRecord {
        cycle_id: cycle_id.to_string(),
        service_id: service_id.to_string(),
        name: format!("{:04}-{:02}", from.year(), from.month()),
        period_from: from,
        period_to: to,
        status: CycleStatus::Open,
        description: None,
        created_by: "manager-1".to_string(),
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

fn assignment(assignment_id: &str, cycle_id: &str, assignee: &str) -> AssignmentRecord {
    AssignmentRecord {
        assignment_id: assignment_id.to_string(),
        cycle_id: cycle_id.to_string(),
        service_id: "svc-electric".to_string(),
        building_id: Some("bldg-a".to_string()),
        floor: Some(3),
        unit_ids: None,
        assigned_to: assignee.to_string(),
        assigned_by: "manager-1".to_string(),
        assigned_at_ms: 1,
        start_date: day(2024, 6, 1),
        end_date: day(2024, 6, 10),
        status: AssignmentStatus::Pending,
        completed_at_ms: None,
        reminder_last_sent: None,
        note: None,
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

fn meter(meter_id: &str, unit_id: &str, code: &str) -> MeterRecord {
    MeterRecord {
        meter_id: meter_id.to_string(),
        unit_id: unit_id.to_string(),
        service_id: "svc-electric".to_string(),
        meter_code: code.to_string(),
        active: true,
        installed_at: day(2024, 1, 1),
        removed_at: None,
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

fn reading(reading_id: &str, meter_id: &str, assignment_id: Option<&str>) -> MeterReadingRecord {
    MeterReadingRecord {
        reading_id: reading_id.to_string(),
        meter_id: meter_id.to_string(),
        unit_id: "unit-101".to_string(),
        assignment_id: assignment_id.map(|id| id.to_string()),
        cycle_id: Some("cycle-1".to_string()),
        reading_date: day(2024, 6, 5),
        prev_index: 100.0,
        curr_index: 150.0,
        note: None,
        reader_id: "staff-1".to_string(),
        photo_file_id: None,
        read_at_ms: 1,
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

#[tokio::test]
async fn cycle_store_round_trip_and_overlap_query() {
    let store = InMemoryReadingCycleStore::new();
    let created = store
        .create_cycle(cycle("cycle-1", "svc-electric", day(2024, 6, 1), day(2024, 6, 15)))
        .await
        .expect("create");
    assert_eq!(created.status, CycleStatus::Open);

    let duplicate = store
        .create_cycle(cycle("cycle-1", "svc-electric", day(2024, 7, 1), day(2024, 7, 15)))
        .await;
    assert!(duplicate.is_err());

    let overlapping = store
        .list_cycles_overlapping(
            "svc-electric",
            DateWindow::new(day(2024, 6, 10), day(2024, 6, 20)),
        )
        .await
        .expect("query");
    assert_eq!(overlapping.len(), 1);

    let disjoint = store
        .list_cycles_overlapping(
            "svc-electric",
            DateWindow::new(day(2024, 6, 16), day(2024, 6, 30)),
        )
        .await
        .expect("query");
    assert!(disjoint.is_empty());

    let other_service = store
        .list_cycles_overlapping(
            "svc-water",
            DateWindow::new(day(2024, 6, 1), day(2024, 6, 15)),
        )
        .await
        .expect("query");
    assert!(other_service.is_empty());
}

#[tokio::test]
async fn cycle_update_changes_status_and_stamp() {
    let store = InMemoryReadingCycleStore::new();
    store
        .create_cycle(cycle("cycle-1", "svc-electric", day(2024, 6, 1), day(2024, 6, 15)))
        .await
        .expect("create");

    let updated = store
        .update_cycle(
            "cycle-1",
            ReadingCycleUpdate {
                status: Some(CycleStatus::InProgress),
                description: Some("first half".to_string()),
                updated_at_ms: Some(42),
            },
        )
        .await
        .expect("update")
        .expect("present");
    assert_eq!(updated.status, CycleStatus::InProgress);
    assert_eq!(updated.description.as_deref(), Some("first half"));
    assert_eq!(updated.updated_at_ms, 42);

    let missing = store
        .update_cycle("cycle-9", ReadingCycleUpdate::default())
        .await
        .expect("update");
    assert!(missing.is_none());
}

#[tokio::test]
async fn assignment_store_filters_by_assignee_and_cycle() {
    let store = InMemoryAssignmentStore::new();
    store
        .create_assignment(assignment("a-1", "cycle-1", "staff-1"))
        .await
        .expect("create");
    store
        .create_assignment(assignment("a-2", "cycle-1", "staff-2"))
        .await
        .expect("create");
    store
        .create_assignment(assignment("a-3", "cycle-2", "staff-1"))
        .await
        .expect("create");

    let by_cycle = store
        .list_assignments_by_cycle("cycle-1")
        .await
        .expect("query");
    assert_eq!(by_cycle.len(), 2);

    let by_assignee = store
        .list_assignments_by_assignee("staff-1")
        .await
        .expect("query");
    assert_eq!(by_assignee.len(), 2);

    let both = store
        .list_assignments_by_assignee_and_cycle("staff-1", "cycle-1")
        .await
        .expect("query");
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].assignment_id, "a-1");
}

#[tokio::test]
async fn assignment_update_sets_completion() {
    let store = InMemoryAssignmentStore::new();
    store
        .create_assignment(assignment("a-1", "cycle-1", "staff-1"))
        .await
        .expect("create");

    let updated = store
        .update_assignment(
            "a-1",
            AssignmentUpdate {
                status: Some(AssignmentStatus::Completed),
                completed_at_ms: Some(99),
                updated_at_ms: Some(99),
                ..AssignmentUpdate::default()
            },
        )
        .await
        .expect("update")
        .expect("present");
    assert_eq!(updated.status, AssignmentStatus::Completed);
    assert_eq!(updated.completed_at_ms, Some(99));
}

#[tokio::test]
async fn meter_store_enforces_id_uniqueness_and_clears_removed_at() {
    let store = InMemoryMeterStore::new();
    store
        .create_meter(meter("m-1", "unit-101", "EL-001"))
        .await
        .expect("create");
    assert!(store.create_meter(meter("m-1", "unit-102", "EL-002")).await.is_err());

    let by_code = store
        .find_meter_by_code("EL-001")
        .await
        .expect("query")
        .expect("present");
    assert_eq!(by_code.meter_id, "m-1");

    let deactivated = store
        .update_meter(
            "m-1",
            MeterUpdate {
                active: Some(false),
                removed_at: Some(Some(day(2024, 6, 30))),
                ..MeterUpdate::default()
            },
        )
        .await
        .expect("update")
        .expect("present");
    assert!(!deactivated.active);
    assert_eq!(deactivated.removed_at, Some(day(2024, 6, 30)));

    let restored = store
        .update_meter(
            "m-1",
            MeterUpdate {
                active: Some(true),
                removed_at: Some(None),
                ..MeterUpdate::default()
            },
        )
        .await
        .expect("update")
        .expect("present");
    assert!(restored.active);
    assert!(restored.removed_at.is_none());
}

#[tokio::test]
async fn reading_store_natural_key_lookup() {
    let store = InMemoryMeterReadingStore::new();
    store
        .create_reading(reading("r-1", "m-1", Some("a-1")))
        .await
        .expect("create");
    store
        .create_reading(reading("r-2", "m-1", None))
        .await
        .expect("create");

    let keyed = store
        .find_reading_by_meter_and_assignment("m-1", "a-1")
        .await
        .expect("query")
        .expect("present");
    assert_eq!(keyed.reading_id, "r-1");

    let by_meter = store.list_readings_by_meter("m-1").await.expect("query");
    assert_eq!(by_meter.len(), 2);

    let by_cycle = store.list_readings_by_cycle("cycle-1").await.expect("query");
    assert_eq!(by_cycle.len(), 2);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn reminder_acknowledge_is_idempotent_and_user_scoped() {
    let store = InMemoryReminderStore::new();
    store
        .create_reminder(ReminderRecord {
            reminder_id: "rem-1".to_string(),
            assignment_id: "a-1".to_string(),
            user_id: "staff-1".to_string(),
            title: "Meter reading due".to_string(),
            message: "due 2024-06-10".to_string(),
            due_date: day(2024, 6, 10),
            kind: "METER_READING_ASSIGNMENT_REMINDER".to_string(),
            acknowledged_at_ms: None,
            created_at_ms: 1,
        })
        .await
        .expect("create");

    // 非归属用户不可见也不可确认
    let other = store
        .acknowledge_reminder("rem-1", "staff-2", 50)
        .await
        .expect("ack");
    assert!(other.is_none());

    let first = store
        .acknowledge_reminder("rem-1", "staff-1", 50)
        .await
        .expect("ack")
        .expect("present");
    assert_eq!(first.acknowledged_at_ms, Some(50));

    let second = store
        .acknowledge_reminder("rem-1", "staff-1", 80)
        .await
        .expect("ack")
        .expect("present");
    assert_eq!(second.acknowledged_at_ms, Some(50));

    let open_only = store
        .list_reminders_by_user("staff-1", false)
        .await
        .expect("query");
    assert!(open_only.is_empty());

    let all = store
        .list_reminders_by_user("staff-1", true)
        .await
        .expect("query");
    assert_eq!(all.len(), 1);
}
