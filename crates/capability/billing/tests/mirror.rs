use std::sync::Arc;

use chrono::NaiveDate;
use domain::CycleStatus;
use mrc_billing::{
    BillingMirror, BillingMirrorConfig, MirrorOutcome, RecordingBillingClient,
};
use mrc_directory::{BuildingInfo, InMemoryDirectory, InMemoryServiceCatalog, ServiceInfo, UnitInfo};
use mrc_storage::{
    InMemoryMeterReadingStore, InMemoryMeterStore, InMemoryReadingCycleStore, MeterReadingRecord,
    MeterReadingStore, MeterRecord, MeterStore, ReadingCycleRecord, ReadingCycleStore,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn cycle(cycle_id: &str) -> ReadingCycleRecord {
    ReadingCycleRecord {
        cycle_id: cycle_id.to_string(),
        service_id: "svc-electric".to_string(),
        name: "2024-06".to_string(),
        period_from: day(2024, 6, 1),
        period_to: day(2024, 6, 15),
        status: CycleStatus::Open,
        description: None,
        created_by: "manager-1".to_string(),
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

fn reading(reading_id: &str, meter_id: &str, unit_id: &str, prev: f64, curr: f64) -> MeterReadingRecord {
    MeterReadingRecord {
        reading_id: reading_id.to_string(),
        meter_id: meter_id.to_string(),
        unit_id: unit_id.to_string(),
        assignment_id: None,
        cycle_id: Some("cycle-1".to_string()),
        reading_date: day(2024, 6, 10),
        prev_index: prev,
        curr_index: curr,
        note: None,
        reader_id: "staff-1".to_string(),
        photo_file_id: None,
        read_at_ms: 1,
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

struct Fixture {
    mirror: Arc<BillingMirror>,
    client: Arc<RecordingBillingClient>,
    cycles: Arc<InMemoryReadingCycleStore>,
    readings: Arc<InMemoryMeterReadingStore>,
    meters: Arc<InMemoryMeterStore>,
}

fn fixture() -> Fixture {
    let client = Arc::new(RecordingBillingClient::new());
    let cycles = Arc::new(InMemoryReadingCycleStore::new());
    let readings = Arc::new(InMemoryMeterReadingStore::new());
    let meters = Arc::new(InMemoryMeterStore::new());
    let directory = Arc::new(InMemoryDirectory::with_fixtures(
        vec![BuildingInfo {
            building_id: "bldg-a".to_string(),
            code: "A".to_string(),
            name: "Block A".to_string(),
        }],
        vec![UnitInfo {
            unit_id: "unit-301".to_string(),
            code: "A-301".to_string(),
            building_id: "bldg-a".to_string(),
            floor: Some(3),
        }],
        vec![("unit-301".to_string(), "resident-1".to_string())],
    ));
    let catalog = Arc::new(InMemoryServiceCatalog::with_services(vec![ServiceInfo {
        service_id: "svc-electric".to_string(),
        code: "ELECTRIC".to_string(),
        name: "Electricity".to_string(),
        metered: true,
        active: true,
    }]));
    let mirror = Arc::new(BillingMirror::new(
        client.clone(),
        cycles.clone(),
        readings.clone(),
        meters.clone(),
        directory,
        catalog,
        BillingMirrorConfig {
            max_retries: 1,
            retry_backoff_ms: 1,
        },
    ));
    Fixture {
        mirror,
        client,
        cycles,
        readings,
        meters,
    }
}

#[tokio::test]
async fn push_cycle_is_idempotent() {
    let fx = fixture();
    let cycle = cycle("cycle-1");

    let first = fx.mirror.push_cycle(&cycle).await.expect("push");
    let second = fx.mirror.push_cycle(&cycle).await.expect("push again");

    assert_eq!(first, MirrorOutcome::Created);
    assert_eq!(second, MirrorOutcome::Skipped);
    let periods = fx.client.created_periods();
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0].external_cycle_id, "cycle-1");
    assert_eq!(periods[0].name, "2024-06 • ELECTRIC");
    assert_eq!(periods[0].start_date, day(2024, 6, 1));
    assert_eq!(periods[0].end_date, day(2024, 6, 24));
}

#[tokio::test]
async fn push_retries_transient_failures() {
    let fx = fixture();
    fx.client.fail_next_creates(1);

    let outcome = fx.mirror.push_cycle(&cycle("cycle-1")).await.expect("push");
    assert_eq!(outcome, MirrorOutcome::Created);
    assert_eq!(fx.client.created_periods().len(), 1);
}

#[tokio::test]
async fn push_fails_after_retries_exhausted() {
    let fx = fixture();
    fx.client.fail_next_creates(5);

    let outcome = fx.mirror.push_cycle(&cycle("cycle-1")).await;
    assert!(outcome.is_err());
    assert!(fx.client.created_periods().is_empty());
}

#[tokio::test]
async fn sync_creates_missing_periods_only() {
    let fx = fixture();
    fx.cycles.create_cycle(cycle("cycle-1")).await.expect("seed");
    let mut other = cycle("cycle-2");
    other.name = "2024-07".to_string();
    other.period_from = day(2024, 7, 1);
    other.period_to = day(2024, 7, 15);
    fx.cycles.create_cycle(other).await.expect("seed");
    fx.mirror
        .push_cycle(&cycle("cycle-1"))
        .await
        .expect("pre-push");

    let report = fx.mirror.sync_cycles().await.expect("sync");
    assert_eq!(report.scanned, 2);
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(fx.client.created_periods().len(), 2);
}

#[tokio::test]
async fn export_skips_negative_usage_and_keeps_valid_rows() {
    let fx = fixture();
    fx.cycles.create_cycle(cycle("cycle-1")).await.expect("seed");
    fx.meters
        .create_meter(meter("m-1", "unit-301", "EL-001"))
        .await
        .expect("seed");
    fx.readings
        .create_reading(reading("r-1", "m-1", "unit-301", 100.0, 150.0))
        .await
        .expect("seed");
    fx.readings
        .create_reading(reading("r-2", "m-1", "unit-301", 200.0, 150.0))
        .await
        .expect("seed");

    let summary = fx
        .mirror
        .export_cycle_readings("cycle-1", None)
        .await
        .expect("export");
    assert_eq!(summary.accepted, 1);

    let batches = fx.client.imported_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    let row = &batches[0][0];
    assert_eq!(row.external_reading_id, "r-1");
    assert_eq!(row.payer_id.as_deref(), Some("resident-1"));
    assert_eq!(row.service_code, "ELECTRIC");
    assert!((row.usage - 50.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn export_with_no_rows_skips_collaborator_call() {
    let fx = fixture();
    fx.cycles.create_cycle(cycle("cycle-1")).await.expect("seed");

    let summary = fx
        .mirror
        .export_cycle_readings("cycle-1", None)
        .await
        .expect("export");
    assert_eq!(summary.accepted, 0);
    assert!(fx.client.imported_batches().is_empty());
}
