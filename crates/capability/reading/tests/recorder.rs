use std::sync::Arc;

use api_contract::{RecordReadingRequest, UpdateReadingRequest};
use chrono::NaiveDate;
use domain::{ActorContext, AssignmentStatus, CoordinationError, FixedClock};
use mrc_directory::{BuildingInfo, InMemoryDirectory, UnitInfo};
use mrc_reading::{ReadingService, reading_dto};
use mrc_storage::{
    AssignmentRecord, AssignmentStore, CycleLocks, InMemoryAssignmentStore,
    InMemoryMeterReadingStore, InMemoryMeterStore, MeterReadingStore, MeterRecord, MeterStore,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

struct Fixture {
    service: ReadingService,
    readings: Arc<InMemoryMeterReadingStore>,
    assignments: Arc<InMemoryAssignmentStore>,
    meters: Arc<InMemoryMeterStore>,
}

fn fixture() -> Fixture {
    let readings = Arc::new(InMemoryMeterReadingStore::new());
    let meters = Arc::new(InMemoryMeterStore::new());
    let assignments = Arc::new(InMemoryAssignmentStore::new());
    let directory = Arc::new(InMemoryDirectory::with_fixtures(
        vec![BuildingInfo {
            building_id: "bldg-x".to_string(),
            code: "X".to_string(),
            name: "Block X".to_string(),
        }],
        vec![
            UnitInfo {
                unit_id: "unit-301".to_string(),
                code: "X-301".to_string(),
                building_id: "bldg-x".to_string(),
                floor: Some(3),
            },
            UnitInfo {
                unit_id: "unit-401".to_string(),
                code: "X-401".to_string(),
                building_id: "bldg-x".to_string(),
                floor: Some(4),
            },
        ],
        Vec::new(),
    ));
    let clock = Arc::new(FixedClock::at(day(2024, 6, 15)));
    let service = ReadingService::new(
        readings.clone(),
        meters.clone(),
        assignments.clone(),
        directory,
        Arc::new(CycleLocks::new()),
        clock,
    );
    Fixture {
        service,
        readings,
        assignments,
        meters,
    }
}

async fn seed_meter(fx: &Fixture, meter_id: &str, unit_id: &str, code: &str) {
    fx.meters
        .create_meter(MeterRecord {
            meter_id: meter_id.to_string(),
            unit_id: unit_id.to_string(),
            service_id: "svc-electric".to_string(),
            meter_code: code.to_string(),
            active: true,
            installed_at: day(2024, 1, 1),
            removed_at: None,
            created_at_ms: 1,
            updated_at_ms: 1,
        })
        .await
        .expect("seed meter");
}

async fn seed_assignment(fx: &Fixture, assignment_id: &str, floor: Option<i32>) {
    fx.assignments
        .create_assignment(AssignmentRecord {
            assignment_id: assignment_id.to_string(),
            cycle_id: "cycle-jun".to_string(),
            service_id: "svc-electric".to_string(),
            building_id: Some("bldg-x".to_string()),
            floor,
            unit_ids: None,
            assigned_to: "staff-1".to_string(),
            assigned_by: "manager-1".to_string(),
            assigned_at_ms: 1,
            start_date: day(2024, 6, 1),
            end_date: day(2024, 6, 15),
            status: AssignmentStatus::InProgress,
            completed_at_ms: None,
            reminder_last_sent: None,
            note: None,
            created_at_ms: 1,
            updated_at_ms: 1,
        })
        .await
        .expect("seed assignment");
}

fn request(meter_id: &str, curr: f64) -> RecordReadingRequest {
    RecordReadingRequest {
        meter_id: meter_id.to_string(),
        assignment_id: None,
        cycle_id: None,
        reading_date: day(2024, 6, 15),
        prev_index: None,
        curr_index: curr,
        note: None,
        photo_file_id: None,
        reader_id: None,
    }
}

#[tokio::test]
async fn scenario_b_first_reading_defaults_prev_to_zero() {
    let fx = fixture();
    seed_meter(&fx, "m-1", "unit-301", "EL-001").await;
    let ctx = ActorContext::for_user("staff-1");

    let reading = fx
        .service
        .record_reading(&ctx, request("m-1", 120.0))
        .await
        .expect("record");
    assert!((reading.prev_index - 0.0).abs() < f64::EPSILON);
    assert_eq!(reading.reader_id, "staff-1");

    let dto = reading_dto(&reading);
    assert!((dto.usage - 120.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn scenario_c_prev_index_carries_forward_latest_reading() {
    let fx = fixture();
    seed_meter(&fx, "m-1", "unit-301", "EL-001").await;
    let ctx = ActorContext::for_user("staff-1");

    let mut may = request("m-1", 100.0);
    may.reading_date = day(2024, 5, 15);
    fx.service.record_reading(&ctx, may).await.expect("may reading");

    let june = fx
        .service
        .record_reading(&ctx, request("m-1", 150.0))
        .await
        .expect("june reading");
    assert!((june.prev_index - 100.0).abs() < f64::EPSILON);
    assert!((reading_dto(&june).usage - 50.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn negative_usage_is_rejected_without_a_row() {
    let fx = fixture();
    seed_meter(&fx, "m-1", "unit-301", "EL-001").await;
    let ctx = ActorContext::for_user("staff-1");
    fx.service
        .record_reading(&ctx, request("m-1", 100.0))
        .await
        .expect("baseline");

    let err = fx
        .service
        .record_reading(&ctx, {
            let mut req = request("m-1", 80.0);
            req.reading_date = day(2024, 6, 16);
            req
        })
        .await
        .expect_err("going backwards");
    assert!(matches!(err, CoordinationError::Validation(_)));
    assert_eq!(
        fx.readings
            .list_readings_by_meter("m-1")
            .await
            .expect("list")
            .len(),
        1
    );

    // 显式前值同样受校验
    let explicit = fx
        .service
        .record_reading(&ctx, {
            let mut req = request("m-1", 90.0);
            req.prev_index = Some(95.0);
            req
        })
        .await;
    assert!(matches!(explicit, Err(CoordinationError::Validation(_))));
}

#[tokio::test]
async fn same_meter_and_assignment_replaces_in_place() {
    let fx = fixture();
    seed_meter(&fx, "m-1", "unit-301", "EL-001").await;
    seed_assignment(&fx, "a-1", Some(3)).await;
    let ctx = ActorContext::for_user("staff-1");

    let mut first = request("m-1", 120.0);
    first.assignment_id = Some("a-1".to_string());
    let created = fx
        .service
        .record_reading(&ctx, first)
        .await
        .expect("first submit");
    assert_eq!(created.cycle_id.as_deref(), Some("cycle-jun"));

    let mut second = request("m-1", 125.0);
    second.assignment_id = Some("a-1".to_string());
    second.note = Some("corrected after re-check".to_string());
    let replaced = fx
        .service
        .record_reading(&ctx, second)
        .await
        .expect("second submit");

    assert_eq!(replaced.reading_id, created.reading_id);
    assert!((replaced.curr_index - 125.0).abs() < f64::EPSILON);
    assert_eq!(replaced.note.as_deref(), Some("corrected after re-check"));
    assert_eq!(
        fx.readings
            .list_readings_by_assignment("a-1")
            .await
            .expect("list")
            .len(),
        1
    );
    // 覆盖时前值推导排除被覆盖的行,不会把自己的止度当作前值
    assert!((replaced.prev_index - 0.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn out_of_scope_meter_is_rejected() {
    let fx = fixture();
    seed_meter(&fx, "m-4", "unit-401", "EL-004").await;
    seed_assignment(&fx, "a-floor3", Some(3)).await;
    let ctx = ActorContext::for_user("staff-1");

    let mut req = request("m-4", 10.0);
    req.assignment_id = Some("a-floor3".to_string());
    let err = fx
        .service
        .record_reading(&ctx, req)
        .await
        .expect_err("floor 4 meter on a floor 3 assignment");
    assert!(matches!(err, CoordinationError::Validation(_)));
}

#[tokio::test]
async fn unknown_meter_or_assignment_is_not_found() {
    let fx = fixture();
    let ctx = ActorContext::for_user("staff-1");

    let missing_meter = fx.service.record_reading(&ctx, request("m-none", 1.0)).await;
    assert!(matches!(
        missing_meter,
        Err(CoordinationError::NotFound { .. })
    ));

    seed_meter(&fx, "m-1", "unit-301", "EL-001").await;
    let mut req = request("m-1", 1.0);
    req.assignment_id = Some("a-none".to_string());
    let missing_assignment = fx.service.record_reading(&ctx, req).await;
    assert!(matches!(
        missing_assignment,
        Err(CoordinationError::NotFound { .. })
    ));
}

#[tokio::test]
async fn update_reading_revalidates_index_order() {
    let fx = fixture();
    seed_meter(&fx, "m-1", "unit-301", "EL-001").await;
    let ctx = ActorContext::for_user("staff-1");
    let created = fx
        .service
        .record_reading(&ctx, request("m-1", 120.0))
        .await
        .expect("record");

    let err = fx
        .service
        .update_reading(
            &ctx,
            &created.reading_id,
            UpdateReadingRequest {
                reading_date: None,
                prev_index: Some(130.0),
                curr_index: None,
                note: None,
                photo_file_id: None,
            },
        )
        .await
        .expect_err("prev above curr");
    assert!(matches!(err, CoordinationError::Validation(_)));

    let updated = fx
        .service
        .update_reading(
            &ctx,
            &created.reading_id,
            UpdateReadingRequest {
                reading_date: None,
                prev_index: None,
                curr_index: Some(140.0),
                note: Some("re-read".to_string()),
                photo_file_id: None,
            },
        )
        .await
        .expect("valid correction");
    assert!((updated.curr_index - 140.0).abs() < f64::EPSILON);
    assert_eq!(updated.note.as_deref(), Some("re-read"));
}

#[tokio::test]
async fn list_by_cycle_filters_by_unit() {
    let fx = fixture();
    seed_meter(&fx, "m-1", "unit-301", "EL-001").await;
    seed_meter(&fx, "m-4", "unit-401", "EL-004").await;
    seed_assignment(&fx, "a-1", None).await;
    let ctx = ActorContext::for_user("staff-1");

    for (meter_id, curr) in [("m-1", 10.0), ("m-4", 20.0)] {
        let mut req = request(meter_id, curr);
        req.assignment_id = Some("a-1".to_string());
        fx.service.record_reading(&ctx, req).await.expect("record");
    }

    let all = fx
        .service
        .list_by_cycle("cycle-jun", None)
        .await
        .expect("list");
    assert_eq!(all.len(), 2);
    let filtered = fx
        .service
        .list_by_cycle("cycle-jun", Some("unit-401"))
        .await
        .expect("list");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].unit_id, "unit-401");
}
