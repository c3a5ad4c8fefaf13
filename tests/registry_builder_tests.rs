use chrono::NaiveDate;
use mx_tracker::{
    ComplianceRecord, ComplianceRegistry, ComplianceStatus, MaintenanceTask, ProgramMetadata,
    TaskDriver, UsageUnit,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn seeded_registry() -> ComplianceRegistry {
    let mut registry = ComplianceRegistry::new();
    registry
        .upsert_task_record(
            MaintenanceTask::new(1, "Engine borescope")
                .with_driver(TaskDriver::threshold(UsageUnit::Hours, 500.0))
                .with_driver(TaskDriver::repeat(UsageUnit::Hours, 100.0))
                .with_window_pct(10.0)
                .repetitive(),
        )
        .unwrap();
    registry
        .upsert_task_record(
            MaintenanceTask::new(2, "Gear retraction check")
                .with_driver(TaskDriver::repeat(UsageUnit::Cycles, 200.0))
                .repetitive(),
        )
        .unwrap();
    registry
        .upsert_task_record(
            MaintenanceTask::new(3, "One-time mod")
                .with_driver(TaskDriver::threshold(UsageUnit::Hours, 300.0)),
        )
        .unwrap();
    registry
}

#[test]
fn upsert_rejects_invalid_definitions() {
    let mut registry = ComplianceRegistry::new();
    let no_drivers = MaintenanceTask::new(1, "Empty");
    assert!(registry.upsert_task_record(no_drivers).is_err());

    let bad_window = MaintenanceTask::new(1, "Wide window")
        .with_driver(TaskDriver::threshold(UsageUnit::Hours, 100.0))
        .with_window_pct(75.0);
    assert!(registry.upsert_task_record(bad_window).is_err());
    assert_eq!(registry.dataframe().height(), 0);
}

#[test]
fn refresh_leaves_tasks_without_usage_unassessed() {
    let mut registry = seeded_registry();
    let summary = registry.refresh().unwrap();

    assert_eq!(summary.task_count, 3);
    assert_eq!(summary.unassessed_count, 3);
    assert_eq!(summary.overdue_count, 0);

    let task = registry.find_task(1).unwrap().unwrap();
    assert!(task.status.is_none());
}

#[test]
fn refresh_computes_status_columns_from_recorded_usage() {
    let mut registry = seeded_registry();
    registry.record_usage(1, 495.0, 300, d(2025, 6, 1)).unwrap();
    registry.record_usage(2, 495.0, 190, d(2025, 6, 1)).unwrap();
    registry.record_usage(3, 320.0, 210, d(2025, 6, 1)).unwrap();

    let summary = registry.refresh().unwrap();
    assert_eq!(summary.task_count, 3);
    assert_eq!(summary.due_soon_count, 1);
    assert_eq!(summary.on_track_count, 1);
    assert_eq!(summary.overdue_count, 1);
    assert_eq!(summary.overdue_ids, vec![3]);

    let borescope = registry.find_task(1).unwrap().unwrap();
    assert_eq!(borescope.status, Some(ComplianceStatus::DueSoon));
    assert_eq!(borescope.remaining, Some(5.0));
    assert_eq!(borescope.controlling_unit, Some(UsageUnit::Hours));

    let gear = registry.find_task(2).unwrap().unwrap();
    assert_eq!(gear.status, Some(ComplianceStatus::Ok));
    assert_eq!(gear.remaining, Some(10.0));
}

#[test]
fn refresh_counts_completed_non_repetitive_tasks() {
    let mut registry = seeded_registry();
    registry.record_usage(3, 320.0, 210, d(2025, 6, 1)).unwrap();
    registry
        .record_compliance(3, ComplianceRecord::new(320.0, 210, d(2025, 6, 1)))
        .unwrap();

    let summary = registry.refresh().unwrap();
    assert_eq!(summary.completed_count, 1);
    assert_eq!(summary.overdue_count, 0);

    let task = registry.find_task(3).unwrap().unwrap();
    assert!(task.status.is_none());
    assert!(task.remaining.is_none());
}

#[test]
fn record_compliance_advances_lagging_usage_columns() {
    let mut registry = seeded_registry();
    registry.record_usage(1, 480.0, 290, d(2025, 5, 1)).unwrap();
    registry
        .record_compliance(1, ComplianceRecord::new(500.0, 305, d(2025, 6, 15)))
        .unwrap();

    let task = registry.find_task(1).unwrap().unwrap();
    assert_eq!(task.usage_hours, Some(500.0));
    assert_eq!(task.usage_cycles, Some(305));
    assert_eq!(task.usage_as_of, Some(d(2025, 6, 15)));

    let summary = registry.refresh().unwrap();
    assert_eq!(summary.overdue_count, 0);
    let task = registry.find_task(1).unwrap().unwrap();
    // Next due at 600 hours with 500 on the clock.
    assert_eq!(task.remaining, Some(100.0));
    assert_eq!(task.status, Some(ComplianceStatus::Ok));
}

#[test]
fn delete_task_removes_the_row() {
    let mut registry = seeded_registry();
    assert!(registry.delete_task(2).unwrap());
    assert!(!registry.delete_task(2).unwrap());
    assert_eq!(registry.dataframe().height(), 2);
    assert!(registry.find_task(2).unwrap().is_none());
}

#[test]
fn earliest_due_date_tracks_calendar_drivers() {
    let mut registry = ComplianceRegistry::new();
    registry
        .upsert_task_record(
            MaintenanceTask::new(1, "Annual inspection")
                .with_driver(TaskDriver::repeat(UsageUnit::Days, 365.0))
                .repetitive(),
        )
        .unwrap();
    registry.set_in_service_date(1, d(2024, 6, 1)).unwrap();
    registry.record_usage(1, 100.0, 60, d(2025, 6, 1)).unwrap();
    registry
        .record_compliance(1, ComplianceRecord::new(100.0, 60, d(2025, 6, 1)))
        .unwrap();

    let summary = registry.refresh().unwrap();
    assert_eq!(summary.earliest_due_date, Some(d(2026, 6, 1)));
}

#[test]
fn watch_list_orders_by_urgency() {
    let mut registry = seeded_registry();
    let mut gear = registry.find_task(2).unwrap().unwrap();
    gear.window_pct = 5.0;
    registry.upsert_task_record(gear).unwrap();

    registry.record_usage(1, 505.0, 300, d(2025, 6, 1)).unwrap();
    registry.record_usage(2, 505.0, 195, d(2025, 6, 1)).unwrap();
    registry.record_usage(3, 100.0, 80, d(2025, 6, 1)).unwrap();
    registry.refresh().unwrap();

    let flagged = registry.watch_list().unwrap();
    let ids: Vec<i32> = flagged.iter().map(|t| t.id).collect();
    // Task 1 is overdue, task 2 sits inside its window; task 3 is far out.
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn watch_list_includes_tasks_due_within_horizon() {
    let mut metadata = ProgramMetadata::default();
    metadata.review_horizon_days = 60;
    let mut registry = ComplianceRegistry::new_with_metadata(metadata);
    registry
        .upsert_task_record(
            MaintenanceTask::new(1, "Pitot-static check")
                .with_driver(TaskDriver::repeat(UsageUnit::Days, 90.0))
                .repetitive(),
        )
        .unwrap();
    registry.set_in_service_date(1, d(2025, 1, 1)).unwrap();
    registry.record_usage(1, 50.0, 40, d(2025, 6, 1)).unwrap();
    registry
        .record_compliance(1, ComplianceRecord::new(50.0, 40, d(2025, 6, 1)))
        .unwrap();
    registry.refresh().unwrap();

    // Due 90 days out with a 60-day horizon: off the list.
    assert!(registry.watch_list().unwrap().is_empty());

    registry.set_review_horizon_days(120).unwrap();
    let flagged = registry.watch_list().unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].id, 1);
}

#[test]
fn days_task_without_in_service_date_cannot_record_usage() {
    let mut registry = seeded_registry();
    registry
        .upsert_task_record(
            MaintenanceTask::new(4, "Calendar check")
                .with_driver(TaskDriver::threshold(UsageUnit::Days, 365.0)),
        )
        .unwrap();
    registry.record_usage(1, 480.0, 290, d(2025, 6, 1)).unwrap();

    // Usage on a calendar task with no in-service date is rejected at write
    // time, so the row stays unassessed instead of failing the whole board.
    let err = registry.record_usage(4, 480.0, 290, d(2025, 6, 1)).unwrap_err();
    assert!(err.to_string().contains("in-service date"));

    let summary = registry.refresh().unwrap();
    assert_eq!(summary.task_count, 4);
    assert_eq!(summary.unassessed_count, 3);

    registry.set_in_service_date(4, d(2024, 6, 1)).unwrap();
    registry.record_usage(4, 480.0, 290, d(2025, 6, 1)).unwrap();
    registry.refresh().unwrap();
    let task = registry.find_task(4).unwrap().unwrap();
    assert_eq!(task.projected_due_date, Some(d(2025, 6, 1)));
}

#[test]
fn negative_review_horizon_is_rejected() {
    let mut registry = ComplianceRegistry::new();
    assert!(registry.set_review_horizon_days(-5).is_err());
    assert_eq!(registry.review_horizon_days(), 30);
}

#[test]
fn record_usage_below_compliance_is_rejected() {
    let mut registry = seeded_registry();
    registry.record_usage(1, 510.0, 300, d(2025, 6, 1)).unwrap();
    registry
        .record_compliance(1, ComplianceRecord::new(510.0, 300, d(2025, 6, 1)))
        .unwrap();

    let result = registry.record_usage(1, 490.0, 310, d(2025, 6, 10));
    assert!(result.is_err());
    // The failed update leaves the stored row untouched.
    let task = registry.find_task(1).unwrap().unwrap();
    assert_eq!(task.usage_hours, Some(510.0));
}
