use api_contract::{
    AssignmentProgressDto, CreateAssignmentRequest, CreateCycleRequest, MeterReadingDto,
    RecordReadingRequest, ReadingCycleDto,
};
use chrono::NaiveDate;
use domain::{AssignmentStatus, CycleStatus};
use serde_json::Value;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn cycle_dto_is_camel_case() {
    let dto = ReadingCycleDto {
        cycle_id: "cycle-1".to_string(),
        service_id: "svc-electric".to_string(),
        name: "2024-06".to_string(),
        period_from: day(2024, 6, 1),
        period_to: day(2024, 6, 15),
        status: CycleStatus::Open,
        description: None,
        created_by: "manager-1".to_string(),
        created_at_ms: 1_717_200_000_000,
        updated_at_ms: 1_717_200_000_000,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert!(value.get("cycleId").is_some());
    assert!(value.get("periodFrom").is_some());
    assert!(value.get("createdAtMs").is_some());
    assert!(value.get("cycle_id").is_none());
    assert!(value.get("period_from").is_none());
    assert_eq!(value["status"], "OPEN");
}

#[test]
fn cycle_request_accepts_camel_case() {
    let payload = r#"{
        "serviceId": "svc-water",
        "periodFrom": "2024-07-01",
        "periodTo": "2024-07-31",
        "description": "july round"
    }"#;
    let req: CreateCycleRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.service_id, "svc-water");
    assert_eq!(req.period_from, day(2024, 7, 1));
    assert_eq!(req.period_to, day(2024, 7, 31));
}

#[test]
fn assignment_request_optional_fields_default_to_none() {
    let payload = r#"{
        "cycleId": "cycle-1",
        "serviceId": "svc-electric",
        "assignedTo": "staff-1"
    }"#;
    let req: CreateAssignmentRequest = serde_json::from_str(payload).expect("parse");
    assert!(req.building_id.is_none());
    assert!(req.floor.is_none());
    assert!(req.unit_ids.is_none());
    assert!(req.start_date.is_none());
    assert!(req.end_date.is_none());
}

#[test]
fn reading_request_parses_indexes_as_numbers() {
    let payload = r#"{
        "meterId": "m-1",
        "assignmentId": "a-1",
        "readingDate": "2024-06-05",
        "currIndex": 1543.5
    }"#;
    let req: RecordReadingRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.curr_index, 1543.5);
    assert!(req.prev_index.is_none());
    assert!(req.reader_id.is_none());
}

#[test]
fn reading_dto_carries_computed_usage() {
    let dto = MeterReadingDto {
        reading_id: "r-1".to_string(),
        meter_id: "m-1".to_string(),
        unit_id: "unit-101".to_string(),
        assignment_id: Some("a-1".to_string()),
        cycle_id: Some("cycle-1".to_string()),
        reading_date: day(2024, 6, 5),
        prev_index: 1200.0,
        curr_index: 1543.5,
        usage: 343.5,
        note: None,
        reader_id: "staff-1".to_string(),
        photo_file_id: None,
        read_at_ms: 1_717_570_800_000,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value["usage"], 343.5);
    assert!(matches!(value.get("currIndex"), Some(Value::Number(_))));
}

#[test]
fn progress_dto_is_camel_case() {
    let dto = AssignmentProgressDto {
        assignment_id: "a-1".to_string(),
        total_meters: 8,
        completed_meters: 3,
        remaining_meters: 5,
        percent: 37.5,
        completed: false,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value["totalMeters"], 8);
    assert_eq!(value["percent"], 37.5);
    assert_eq!(value["completed"], false);
}

#[test]
fn status_values_are_upper_snake() {
    assert_eq!(
        serde_json::to_value(CycleStatus::InProgress).expect("serialize"),
        "IN_PROGRESS"
    );
    let parsed: AssignmentStatus = serde_json::from_str("\"OVERDUE\"").expect("parse");
    assert_eq!(parsed, AssignmentStatus::Overdue);
}
