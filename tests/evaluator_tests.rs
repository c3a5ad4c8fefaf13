use chrono::NaiveDate;
use mx_tracker::{
    ComplianceRecord, ComplianceStatus, EvaluationError, MaintenanceTask, TaskDriver, UsageSnapshot,
    UsageUnit, next_due,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn borescope_task() -> MaintenanceTask {
    // First due at 500 flight hours, every 100 hours after that, with a 10%
    // early-compliance window.
    MaintenanceTask::new(1, "Engine borescope")
        .with_driver(TaskDriver::threshold(UsageUnit::Hours, 500.0))
        .with_driver(TaskDriver::repeat(UsageUnit::Hours, 100.0))
        .with_window_pct(10.0)
        .repetitive()
}

#[test]
fn threshold_task_on_track_before_window() {
    let task = borescope_task();
    let usage = UsageSnapshot::new(480.0, 120, d(2025, 6, 1));

    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.status, ComplianceStatus::Ok);
    assert_eq!(estimate.controlling_unit, UsageUnit::Hours);
    assert_eq!(estimate.remaining(), 20.0);
    // Margin normalizes against the repeat interval, not the threshold.
    assert!((estimate.fraction_remaining() - 0.20).abs() < 1e-12);
}

#[test]
fn threshold_task_due_soon_inside_window() {
    let task = borescope_task();
    let usage = UsageSnapshot::new(495.0, 120, d(2025, 6, 1));

    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.status, ComplianceStatus::DueSoon);
    assert_eq!(estimate.remaining(), 5.0);
}

#[test]
fn threshold_task_overdue_past_due_point() {
    let task = borescope_task();
    let usage = UsageSnapshot::new(505.0, 120, d(2025, 6, 1));

    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.status, ComplianceStatus::Overdue);
    assert_eq!(estimate.remaining(), -5.0);
    assert!(estimate.fraction_remaining() < 0.0);
}

#[test]
fn window_boundary_is_inclusive() {
    let task = borescope_task();

    // Exactly at the window edge: remaining 10 of 100 with a 10% window.
    let usage = UsageSnapshot::new(490.0, 120, d(2025, 6, 1));
    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.status, ComplianceStatus::DueSoon);

    // A hair outside the window stays Ok.
    let usage = UsageSnapshot::new(489.99, 120, d(2025, 6, 1));
    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.status, ComplianceStatus::Ok);

    // Exactly at the due point is DueSoon, not Overdue.
    let usage = UsageSnapshot::new(500.0, 120, d(2025, 6, 1));
    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.status, ComplianceStatus::DueSoon);
    assert_eq!(estimate.remaining(), 0.0);
}

#[test]
fn compliance_resets_the_interval() {
    let task = borescope_task();
    let usage = UsageSnapshot::new(510.0, 130, d(2025, 7, 1))
        .with_last_compliance(ComplianceRecord::new(505.0, 128, d(2025, 6, 15)));

    // Due point moves to 505 + 100 = 605; the threshold is consumed.
    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.status, ComplianceStatus::Ok);
    assert_eq!(estimate.remaining(), 95.0);
}

#[test]
fn compliance_exactly_at_due_point_restores_full_interval() {
    let task = borescope_task();
    let usage = UsageSnapshot::new(500.0, 120, d(2025, 6, 20))
        .with_last_compliance(ComplianceRecord::new(500.0, 120, d(2025, 6, 20)));

    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.remaining(), 100.0);
    assert!((estimate.fraction_remaining() - 1.0).abs() < 1e-12);
    assert_eq!(estimate.status, ComplianceStatus::Ok);
}

#[test]
fn repeat_only_task_first_occurrence_measures_from_asset_zero() {
    let task = MaintenanceTask::new(2, "Lubrication")
        .with_driver(TaskDriver::repeat(UsageUnit::Cycles, 200.0))
        .repetitive();
    let usage = UsageSnapshot::new(300.0, 150, d(2025, 6, 1));

    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.controlling_unit, UsageUnit::Cycles);
    assert_eq!(estimate.remaining(), 50.0);
}

#[test]
fn remaining_decreases_as_usage_accumulates() {
    let task = borescope_task();
    let base = d(2025, 6, 1);
    let mut previous = f64::INFINITY;
    for hours in [100.0, 250.0, 400.0, 480.0, 499.0, 520.0] {
        let usage = UsageSnapshot::new(hours, 100, base);
        let estimate = next_due(&task, &usage).unwrap();
        assert!(
            estimate.remaining() < previous,
            "remaining should shrink as hours grow"
        );
        previous = estimate.remaining();
    }
}

#[test]
fn controlling_unit_is_the_tightest_normalized_margin() {
    let task = MaintenanceTask::new(3, "Landing gear check")
        .with_driver(TaskDriver::repeat(UsageUnit::Hours, 1000.0))
        .with_driver(TaskDriver::repeat(UsageUnit::Cycles, 500.0))
        .repetitive();
    // Hours fraction 900/1000 = 0.9, cycles fraction 100/500 = 0.2.
    let usage = UsageSnapshot::new(100.0, 400, d(2025, 6, 1));

    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.controlling_unit, UsageUnit::Cycles);
    assert_eq!(estimate.remaining(), 100.0);
    assert_eq!(estimate.margins.len(), 2);
}

#[test]
fn hours_win_normalized_margin_ties_over_cycles() {
    let task = MaintenanceTask::new(4, "Dual-unit check")
        .with_driver(TaskDriver::repeat(UsageUnit::Hours, 100.0))
        .with_driver(TaskDriver::repeat(UsageUnit::Cycles, 50.0))
        .repetitive();
    // Both fractions are exactly 0.5.
    let usage = UsageSnapshot::new(50.0, 25, d(2025, 6, 1));

    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.controlling_unit, UsageUnit::Hours);
}

#[test]
fn days_driver_projects_a_calendar_due_date() {
    let task = MaintenanceTask::new(5, "Annual inspection")
        .with_driver(TaskDriver::repeat(UsageUnit::Days, 365.0))
        .repetitive();
    let usage = UsageSnapshot::new(1200.0, 800, d(2025, 6, 1))
        .with_last_compliance(ComplianceRecord::new(1100.0, 750, d(2025, 1, 1)));

    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.controlling_unit, UsageUnit::Days);
    assert_eq!(estimate.projected_due_date, Some(d(2026, 1, 1)));
    // 2025-06-01 to 2026-01-01 is 214 days.
    assert_eq!(estimate.remaining(), 214.0);
}

#[test]
fn days_from_asset_zero_requires_in_service_date() {
    let task = MaintenanceTask::new(6, "Calendar check")
        .with_driver(TaskDriver::threshold(UsageUnit::Days, 730.0));
    let usage = UsageSnapshot::new(100.0, 50, d(2025, 6, 1));

    let err = next_due(&task, &usage).unwrap_err();
    assert!(matches!(err, EvaluationError::InvalidUsage(_)));

    let usage = usage.with_in_service_date(d(2024, 6, 1));
    let estimate = next_due(&task, &usage).unwrap();
    assert_eq!(estimate.projected_due_date, Some(d(2026, 6, 1)));
    assert_eq!(estimate.remaining(), 365.0);
}

#[test]
fn days_margin_ignores_hours_and_cycles() {
    let task = MaintenanceTask::new(7, "Corrosion inspection")
        .with_driver(TaskDriver::repeat(UsageUnit::Days, 180.0))
        .repetitive();
    let base =
        UsageSnapshot::new(0.0, 0, d(2025, 6, 1)).with_last_compliance(ComplianceRecord::new(
            0.0,
            0,
            d(2025, 3, 1),
        ));
    let heavy = UsageSnapshot::new(5000.0, 3000, d(2025, 6, 1)).with_last_compliance(
        ComplianceRecord::new(0.0, 0, d(2025, 3, 1)),
    );

    let a = next_due(&task, &base).unwrap();
    let b = next_due(&task, &heavy).unwrap();
    assert_eq!(a.remaining(), b.remaining());
    assert_eq!(a.projected_due_date, b.projected_due_date);
}

#[test]
fn task_without_drivers_is_rejected() {
    let task = MaintenanceTask::new(8, "Empty");
    let usage = UsageSnapshot::new(10.0, 5, d(2025, 6, 1));

    let err = next_due(&task, &usage).unwrap_err();
    assert!(matches!(err, EvaluationError::InvalidDefinition(_)));
}

#[test]
fn zero_repeat_interval_is_rejected() {
    let task = MaintenanceTask::new(9, "Bad interval")
        .with_driver(TaskDriver::repeat(UsageUnit::Hours, 0.0))
        .repetitive();
    let usage = UsageSnapshot::new(10.0, 5, d(2025, 6, 1));

    let err = next_due(&task, &usage).unwrap_err();
    assert!(matches!(err, EvaluationError::InvalidDriver(_)));
}

#[test]
fn duplicate_unit_and_kind_is_rejected() {
    let task = MaintenanceTask::new(10, "Double hours")
        .with_driver(TaskDriver::threshold(UsageUnit::Hours, 100.0))
        .with_driver(TaskDriver::threshold(UsageUnit::Hours, 200.0));
    let usage = UsageSnapshot::new(10.0, 5, d(2025, 6, 1));

    let err = next_due(&task, &usage).unwrap_err();
    assert!(matches!(err, EvaluationError::InvalidDefinition(_)));
}

#[test]
fn window_pct_outside_range_is_rejected() {
    let task = MaintenanceTask::new(11, "Wide window")
        .with_driver(TaskDriver::threshold(UsageUnit::Hours, 100.0))
        .with_window_pct(60.0);
    let usage = UsageSnapshot::new(10.0, 5, d(2025, 6, 1));

    let err = next_due(&task, &usage).unwrap_err();
    assert!(matches!(err, EvaluationError::InvalidDriver(_)));
}

#[test]
fn usage_regression_below_compliance_is_rejected() {
    let task = borescope_task();
    let usage = UsageSnapshot::new(490.0, 120, d(2025, 7, 1))
        .with_last_compliance(ComplianceRecord::new(505.0, 128, d(2025, 6, 15)));

    let err = next_due(&task, &usage).unwrap_err();
    assert!(matches!(err, EvaluationError::InvalidUsage(_)));
}

#[test]
fn negative_usage_is_rejected() {
    let task = borescope_task();
    let usage = UsageSnapshot::new(-1.0, 120, d(2025, 6, 1));

    let err = next_due(&task, &usage).unwrap_err();
    assert!(matches!(err, EvaluationError::InvalidUsage(_)));
}

#[test]
fn non_repetitive_task_after_compliance_has_no_applicable_driver() {
    let task = MaintenanceTask::new(12, "One-time mod")
        .with_driver(TaskDriver::threshold(UsageUnit::Hours, 300.0));
    let usage = UsageSnapshot::new(320.0, 200, d(2025, 6, 1))
        .with_last_compliance(ComplianceRecord::new(310.0, 195, d(2025, 5, 1)));

    let err = next_due(&task, &usage).unwrap_err();
    assert!(matches!(err, EvaluationError::InvalidDefinition(_)));
}

#[test]
fn evaluation_is_deterministic() {
    let task = borescope_task();
    let usage = UsageSnapshot::new(480.0, 120, d(2025, 6, 1));

    let a = next_due(&task, &usage).unwrap();
    let b = next_due(&task, &usage).unwrap();
    assert_eq!(a, b);
}
