use crate::driver::{DriverKind, UsageUnit};
use crate::evaluator::EvaluationError;
use crate::task::MaintenanceTask;
use crate::usage::UsageSnapshot;
use std::collections::HashSet;

/// Checks the driver invariants of a task definition: at least one driver,
/// unique unit/kind pairs, in-domain values, and a driver mix consistent with
/// the repetitive flag.
pub fn validate_definition(task: &MaintenanceTask) -> Result<(), EvaluationError> {
    if task.drivers.is_empty() {
        return Err(EvaluationError::InvalidDefinition(format!(
            "task {} has no drivers",
            task.id
        )));
    }

    let mut seen: HashSet<(UsageUnit, DriverKind)> = HashSet::with_capacity(task.drivers.len());
    for driver in &task.drivers {
        if !driver.value.is_finite() || driver.value < 0.0 {
            return Err(EvaluationError::InvalidDriver(format!(
                "task {} has {} {} driver with invalid value {}",
                task.id, driver.unit, driver.kind, driver.value
            )));
        }
        if driver.kind == DriverKind::Repeat && driver.value == 0.0 {
            return Err(EvaluationError::InvalidDriver(format!(
                "task {} has a zero-value repeat interval in {}",
                task.id, driver.unit
            )));
        }
        if !seen.insert((driver.unit, driver.kind)) {
            return Err(EvaluationError::InvalidDefinition(format!(
                "task {} has more than one {} driver in {}",
                task.id, driver.kind, driver.unit
            )));
        }
    }

    // A zero threshold with no repeat in the same unit would make the task
    // due at asset zero with a zero-width interval.
    for driver in &task.drivers {
        if driver.kind == DriverKind::Threshold
            && driver.value == 0.0
            && !seen.contains(&(driver.unit, DriverKind::Repeat))
        {
            return Err(EvaluationError::InvalidDriver(format!(
                "task {} has a zero-value threshold in {} and no repeat interval to normalize against",
                task.id, driver.unit
            )));
        }
    }

    let has_repeat = task.drivers.iter().any(|d| d.kind == DriverKind::Repeat);
    let has_threshold = task.drivers.iter().any(|d| d.kind == DriverKind::Threshold);
    if task.is_repetitive && !has_repeat {
        return Err(EvaluationError::InvalidDefinition(format!(
            "task {} is marked repetitive but defines no repeat driver",
            task.id
        )));
    }
    if !task.is_repetitive && !has_threshold {
        return Err(EvaluationError::InvalidDefinition(format!(
            "task {} is not repetitive but defines no threshold driver",
            task.id
        )));
    }

    if !task.window_pct.is_finite() || task.window_pct < 0.0 || task.window_pct > 50.0 {
        return Err(EvaluationError::InvalidDriver(format!(
            "task {} has window_pct {} outside [0, 50]",
            task.id, task.window_pct
        )));
    }

    Ok(())
}

/// Checks a usage snapshot: non-negative values and no regression below the
/// last recorded compliance.
pub fn validate_usage(usage: &UsageSnapshot) -> Result<(), EvaluationError> {
    if !usage.hours.is_finite() || usage.hours < 0.0 {
        return Err(EvaluationError::InvalidUsage(format!(
            "usage has invalid hours {}",
            usage.hours
        )));
    }
    if usage.cycles < 0 {
        return Err(EvaluationError::InvalidUsage(format!(
            "usage has negative cycles {}",
            usage.cycles
        )));
    }

    if let Some(record) = &usage.last_compliance {
        if !record.hours.is_finite() || record.hours < 0.0 || record.cycles < 0 {
            return Err(EvaluationError::InvalidUsage(format!(
                "last compliance has invalid values ({} hours, {} cycles)",
                record.hours, record.cycles
            )));
        }
        if usage.as_of_date < record.date {
            return Err(EvaluationError::InvalidUsage(format!(
                "usage as-of date {} precedes last compliance date {}",
                usage.as_of_date, record.date
            )));
        }
        if usage.hours < record.hours {
            return Err(EvaluationError::InvalidUsage(format!(
                "usage hours {} regressed below last compliance hours {}",
                usage.hours, record.hours
            )));
        }
        if usage.cycles < record.cycles {
            return Err(EvaluationError::InvalidUsage(format!(
                "usage cycles {} regressed below last compliance cycles {}",
                usage.cycles, record.cycles
            )));
        }
    }

    Ok(())
}

/// Registry-level check: definition invariants plus whatever usage has been
/// recorded on the row so far.
pub fn validate_task(task: &MaintenanceTask) -> Result<(), EvaluationError> {
    validate_definition(task)?;
    if let Some(snapshot) = task.usage_snapshot() {
        validate_usage(&snapshot)?;
        // A DAYS driver with no compliance on record anchors at asset zero,
        // which needs the in-service date to resolve to a calendar date.
        // Rejecting the row here keeps one bad task from failing a whole
        // registry refresh later.
        if snapshot.last_compliance.is_none()
            && snapshot.in_service_date.is_none()
            && task.drivers.iter().any(|d| d.unit == UsageUnit::Days)
        {
            return Err(EvaluationError::InvalidUsage(format!(
                "task {} has a DAYS driver anchored at asset zero but no in-service date recorded",
                task.id
            )));
        }
    }
    Ok(())
}

pub fn validate_task_collection(tasks: &[MaintenanceTask]) -> Result<(), EvaluationError> {
    let mut seen_ids = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen_ids.insert(task.id) {
            return Err(EvaluationError::InvalidDefinition(format!(
                "duplicate task id {}",
                task.id
            )));
        }
        validate_task(task)?;
    }
    Ok(())
}
