use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Measurement dimension a maintenance driver is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageUnit {
    #[serde(rename = "HRS")]
    Hours,
    #[serde(rename = "CYC")]
    Cycles,
    #[serde(rename = "DAYS")]
    Days,
}

impl UsageUnit {
    /// Evaluation order; earlier units win normalized-margin ties.
    pub const PRIORITY: [UsageUnit; 3] = [UsageUnit::Hours, UsageUnit::Cycles, UsageUnit::Days];

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageUnit::Hours => "HRS",
            UsageUnit::Cycles => "CYC",
            UsageUnit::Days => "DAYS",
        }
    }
}

impl fmt::Display for UsageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HRS" => Ok(UsageUnit::Hours),
            "CYC" => Ok(UsageUnit::Cycles),
            "DAYS" => Ok(UsageUnit::Days),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// One-time trigger measured from asset zero.
    Threshold,
    /// Recurring interval applied after the first compliance.
    Repeat,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Threshold => "threshold",
            DriverKind::Repeat => "repeat",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threshold" => Ok(DriverKind::Threshold),
            "repeat" => Ok(DriverKind::Repeat),
            _ => Err(()),
        }
    }
}

/// One scheduling rule for a maintenance task: a magnitude in a single unit,
/// either the initial threshold or the repeat interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskDriver {
    pub unit: UsageUnit,
    pub kind: DriverKind,
    pub value: f64,
}

impl TaskDriver {
    pub fn new(unit: UsageUnit, kind: DriverKind, value: f64) -> Self {
        Self { unit, kind, value }
    }

    pub fn threshold(unit: UsageUnit, value: f64) -> Self {
        Self::new(unit, DriverKind::Threshold, value)
    }

    pub fn repeat(unit: UsageUnit, value: f64) -> Self {
        Self::new(unit, DriverKind::Repeat, value)
    }
}
