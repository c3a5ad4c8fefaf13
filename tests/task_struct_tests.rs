use chrono::NaiveDate;
use mx_tracker::{
    ComplianceRecord, ComplianceStatus, MaintenanceTask, SourceType, TaskDriver, UsageUnit,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn dataframe_row_round_trip_preserves_all_fields() {
    let mut task = MaintenanceTask::new(42, "Fuel pump overhaul")
        .with_driver(TaskDriver::threshold(UsageUnit::Hours, 500.0))
        .with_driver(TaskDriver::repeat(UsageUnit::Hours, 100.0))
        .with_window_pct(10.0)
        .repetitive();
    task.source_type = SourceType::ServiceBulletin;
    task.source_ref = Some("SB 28-1042".to_string());
    task.ata_chapter = Some("28".to_string());
    task.task_notes = Some("Check impeller wear limits".to_string());
    task.usage_hours = Some(480.0);
    task.usage_cycles = Some(310);
    task.usage_as_of = Some(d(2025, 6, 1));
    task.in_service_date = Some(d(2020, 3, 15));
    task.last_compliance = Some(ComplianceRecord::new(400.0, 260, d(2025, 1, 10)));
    task.status = Some(ComplianceStatus::Ok);
    task.controlling_unit = Some(UsageUnit::Hours);
    task.remaining = Some(20.0);
    task.fraction_remaining = Some(0.2);
    task.projected_due_date = Some(d(2025, 9, 1));

    let df = task.to_dataframe_row().unwrap();
    assert_eq!(df.height(), 1);
    let restored = MaintenanceTask::from_dataframe_row(&df, 0).unwrap();
    assert_eq!(restored, task);
}

#[test]
fn dataframe_row_round_trip_with_minimal_task() {
    let task = MaintenanceTask::new(1, "Placard check")
        .with_driver(TaskDriver::threshold(UsageUnit::Days, 365.0));

    let df = task.to_dataframe_row().unwrap();
    let restored = MaintenanceTask::from_dataframe_row(&df, 0).unwrap();
    assert_eq!(restored, task);
    assert_eq!(restored.source_type, SourceType::Operator);
    assert!(restored.usage_hours.is_none());
    assert!(restored.status.is_none());
}

#[test]
fn usage_snapshot_requires_all_usage_columns() {
    let mut task = MaintenanceTask::new(2, "Partial usage")
        .with_driver(TaskDriver::threshold(UsageUnit::Hours, 100.0));
    assert!(task.usage_snapshot().is_none());

    task.usage_hours = Some(50.0);
    task.usage_cycles = Some(20);
    assert!(task.usage_snapshot().is_none());

    task.usage_as_of = Some(d(2025, 6, 1));
    let snapshot = task.usage_snapshot().unwrap();
    assert_eq!(snapshot.hours, 50.0);
    assert_eq!(snapshot.cycles, 20);
    assert_eq!(snapshot.as_of_date, d(2025, 6, 1));
}

#[test]
fn json_serialization_uses_wire_names() {
    let task = MaintenanceTask::new(3, "AD compliance")
        .with_driver(TaskDriver::repeat(UsageUnit::Cycles, 250.0))
        .repetitive();
    let json = serde_json::to_value(&task).unwrap();
    assert_eq!(json["drivers"][0]["unit"], "CYC");
    assert_eq!(json["drivers"][0]["kind"], "repeat");
    assert_eq!(json["source_type"], "operator");
    // Unset optional columns stay off the wire.
    assert!(json.get("status").is_none());
    assert!(json.get("usage_hours").is_none());
}
