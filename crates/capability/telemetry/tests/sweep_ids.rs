use mrc_telemetry::{metrics, new_sweep_ids, record_reading_recorded};

#[test]
fn sweep_ids_non_empty() {
    let ids = new_sweep_ids();
    assert!(!ids.sweep_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.sweep_id, ids.trace_id);
}

#[test]
fn counters_accumulate_in_snapshot() {
    record_reading_recorded();
    record_reading_recorded();
    let snapshot = metrics().snapshot();
    assert!(snapshot.readings_recorded >= 2);
}
