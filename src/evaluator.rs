use crate::driver::{DriverKind, UsageUnit};
use crate::task::MaintenanceTask;
use crate::task_validation;
use crate::usage::{ComplianceRecord, UsageSnapshot};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error taxonomy for the evaluator. All failures come back as values; the
/// evaluator never logs, retries, or panics on bad data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// No drivers, duplicate unit/kind pairs, or a driver set that leaves
    /// nothing to evaluate.
    InvalidDefinition(String),
    /// A driver value outside its domain (negative, non-finite, zero repeat)
    /// or an out-of-range compliance window.
    InvalidDriver(String),
    /// Negative or non-monotonic usage, or a missing in-service date where a
    /// DAYS driver needs one.
    InvalidUsage(String),
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationError::InvalidDefinition(msg) => write!(f, "invalid definition: {msg}"),
            EvaluationError::InvalidDriver(msg) => write!(f, "invalid driver: {msg}"),
            EvaluationError::InvalidUsage(msg) => write!(f, "invalid usage: {msg}"),
        }
    }
}

impl std::error::Error for EvaluationError {}

/// Compliance state of a task, derived from the controlling unit's
/// normalized remaining margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Ok,
    DueSoon,
    Overdue,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Ok => "ok",
            ComplianceStatus::DueSoon => "due_soon",
            ComplianceStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Ok(ComplianceStatus::Ok),
            "due_soon" => Ok(ComplianceStatus::DueSoon),
            "overdue" => Ok(ComplianceStatus::Overdue),
            _ => Err(()),
        }
    }
}

/// Remaining margin in one unit, in that unit's native measurement, together
/// with the interval the margin is normalized against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitMargin {
    pub unit: UsageUnit,
    pub remaining: f64,
    pub interval: f64,
}

impl UnitMargin {
    pub fn fraction_remaining(&self) -> f64 {
        self.remaining / self.interval
    }
}

/// Result of evaluating one task against one usage snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueEstimate {
    pub status: ComplianceStatus,
    pub controlling_unit: UsageUnit,
    /// Margin per unit with an applicable driver, in HRS/CYC/DAYS order.
    pub margins: Vec<UnitMargin>,
    /// Calendar due date, present when a DAYS driver applies.
    pub projected_due_date: Option<NaiveDate>,
}

impl DueEstimate {
    pub fn margin_for(&self, unit: UsageUnit) -> Option<&UnitMargin> {
        self.margins.iter().find(|m| m.unit == unit)
    }

    pub fn controlling_margin(&self) -> &UnitMargin {
        self.margin_for(self.controlling_unit)
            .expect("controlling unit always has a margin")
    }

    /// Remaining value in the controlling unit's native measurement.
    pub fn remaining(&self) -> f64 {
        self.controlling_margin().remaining
    }

    pub fn fraction_remaining(&self) -> f64 {
        self.controlling_margin().fraction_remaining()
    }
}

#[derive(Clone, Copy)]
enum Anchor {
    AssetZero,
    Compliance(ComplianceRecord),
}

/// Computes whether a task is due, overdue, or not yet due, and the remaining
/// margin in every unit the task defines a driver for.
///
/// Pure and deterministic: no I/O, no clock reads, no hidden state. Safe to
/// call once per task per asset per dashboard refresh from any number of
/// threads.
pub fn next_due(
    task: &MaintenanceTask,
    usage: &UsageSnapshot,
) -> Result<DueEstimate, EvaluationError> {
    task_validation::validate_definition(task)?;
    task_validation::validate_usage(usage)?;

    let mut margins: Vec<UnitMargin> = Vec::with_capacity(UsageUnit::PRIORITY.len());
    let mut projected_due_date: Option<NaiveDate> = None;

    for unit in UsageUnit::PRIORITY {
        let threshold = driver_value(task, unit, DriverKind::Threshold);
        let repeat = driver_value(task, unit, DriverKind::Repeat);
        if threshold.is_none() && repeat.is_none() {
            continue;
        }

        // A repeat-only driver with no prior compliance is due one full
        // interval from asset zero.
        let last = usage.last_compliance.as_ref();
        let (due_offset, anchor, interval) = match (last, threshold, repeat) {
            (Some(record), _, Some(repeat)) => (repeat, Anchor::Compliance(*record), repeat),
            (Some(_), Some(_), None) => continue, // threshold consumed
            (None, Some(threshold), repeat) => {
                (threshold, Anchor::AssetZero, repeat.unwrap_or(threshold))
            }
            (None, None, Some(repeat)) => (repeat, Anchor::AssetZero, repeat),
            // Units with neither driver were skipped above.
            (_, None, None) => unreachable!(),
        };

        let remaining = match unit {
            UsageUnit::Hours => {
                let base = match anchor {
                    Anchor::Compliance(record) => record.hours,
                    Anchor::AssetZero => 0.0,
                };
                base + due_offset - usage.hours
            }
            UsageUnit::Cycles => {
                let base = match anchor {
                    Anchor::Compliance(record) => record.cycles as f64,
                    Anchor::AssetZero => 0.0,
                };
                base + due_offset - usage.cycles as f64
            }
            UsageUnit::Days => {
                let base_date = match anchor {
                    Anchor::Compliance(record) => record.date,
                    Anchor::AssetZero => usage.in_service_date.ok_or_else(|| {
                        EvaluationError::InvalidUsage(format!(
                            "task {} has a DAYS driver anchored at asset zero but the usage snapshot carries no in-service date",
                            task.id
                        ))
                    })?,
                };
                let due_date = base_date + Duration::days(due_offset.round() as i64);
                projected_due_date = Some(due_date);
                (due_date - usage.as_of_date).num_days() as f64
            }
        };

        margins.push(UnitMargin {
            unit,
            remaining,
            interval,
        });
    }

    if margins.is_empty() {
        return Err(EvaluationError::InvalidDefinition(format!(
            "task {} has no applicable drivers for the given usage",
            task.id
        )));
    }

    // Smallest fraction of interval remaining controls; strict comparison
    // keeps the earlier unit in HRS > CYC > DAYS order on ties.
    let mut controlling = margins[0];
    for margin in &margins[1..] {
        if margin.fraction_remaining() < controlling.fraction_remaining() {
            controlling = *margin;
        }
    }

    let r = controlling.fraction_remaining();
    let status = if r < 0.0 {
        ComplianceStatus::Overdue
    } else if r <= task.window_pct / 100.0 {
        ComplianceStatus::DueSoon
    } else {
        ComplianceStatus::Ok
    };

    Ok(DueEstimate {
        status,
        controlling_unit: controlling.unit,
        margins,
        projected_due_date,
    })
}

fn driver_value(task: &MaintenanceTask, unit: UsageUnit, kind: DriverKind) -> Option<f64> {
    task.drivers
        .iter()
        .find(|d| d.unit == unit && d.kind == kind)
        .map(|d| d.value)
}
