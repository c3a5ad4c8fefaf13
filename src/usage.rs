use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Usage values recorded at the moment a task was last performed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub hours: f64,
    pub cycles: i64,
    pub date: NaiveDate,
}

impl ComplianceRecord {
    pub fn new(hours: f64, cycles: i64, date: NaiveDate) -> Self {
        Self {
            hours,
            cycles,
            date,
        }
    }
}

/// Current state of the asset a task is evaluated against. Produced by
/// flight-control and component records outside this crate; the evaluator
/// consumes it but owns nothing here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Accumulated flight hours since asset zero.
    pub hours: f64,
    /// Accumulated flight cycles since asset zero.
    pub cycles: i64,
    /// Calendar date the snapshot was taken.
    pub as_of_date: NaiveDate,
    /// Date the asset entered service. Required to anchor DAYS drivers that
    /// measure from asset zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_service_date: Option<NaiveDate>,
    /// Usage at the last compliance with the task, when one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_compliance: Option<ComplianceRecord>,
}

impl UsageSnapshot {
    pub fn new(hours: f64, cycles: i64, as_of_date: NaiveDate) -> Self {
        Self {
            hours,
            cycles,
            as_of_date,
            in_service_date: None,
            last_compliance: None,
        }
    }

    pub fn with_in_service_date(mut self, date: NaiveDate) -> Self {
        self.in_service_date = Some(date);
        self
    }

    pub fn with_last_compliance(mut self, record: ComplianceRecord) -> Self {
        self.last_compliance = Some(record);
        self
    }
}
