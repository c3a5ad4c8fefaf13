use crate::driver::{TaskDriver, UsageUnit};
use crate::evaluator::{ComplianceStatus, DueEstimate};
use crate::usage::{ComplianceRecord, UsageSnapshot};
use chrono::{Duration, NaiveDate};
use polars::prelude::PlSmallStr;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Origin of a maintenance task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    /// Airworthiness directive issued by the regulator.
    #[serde(rename = "ad")]
    AirworthinessDirective,
    /// Manufacturer service bulletin.
    #[serde(rename = "sb")]
    ServiceBulletin,
    /// Maintenance planning document / MRB report item.
    #[serde(rename = "mpd")]
    MaintenancePlanning,
    /// Operator-defined task.
    #[serde(rename = "operator")]
    Operator,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::AirworthinessDirective => "ad",
            SourceType::ServiceBulletin => "sb",
            SourceType::MaintenancePlanning => "mpd",
            SourceType::Operator => "operator",
        }
    }

    pub fn variants() -> [(&'static str, &'static str); 4] {
        [
            ("ad", "Airworthiness directive"),
            ("sb", "Service bulletin"),
            ("mpd", "Maintenance planning document"),
            ("operator", "Operator-defined task"),
        ]
    }
}

impl Default for SourceType {
    fn default() -> Self {
        SourceType::Operator
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ad" => Ok(SourceType::AirworthinessDirective),
            "sb" => Ok(SourceType::ServiceBulletin),
            "mpd" => Ok(SourceType::MaintenancePlanning),
            "operator" => Ok(SourceType::Operator),
            _ => Err(()),
        }
    }
}

/// A tracked maintenance task: the definition authored by planning staff,
/// the latest usage of the component it applies to, and the compliance
/// columns the registry refresh writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ata_chapter: Option<String>,
    #[serde(default)]
    pub is_repetitive: bool,
    pub drivers: Vec<TaskDriver>,
    /// Early-compliance grace band, percent of the applicable interval.
    pub window_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_notes: Option<String>,

    // Latest usage of the tracked component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_cycles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_as_of: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_service_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_compliance: Option<ComplianceRecord>,

    // Computed by ComplianceRegistry::refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ComplianceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controlling_unit: Option<UsageUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction_remaining: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_due_date: Option<NaiveDate>,
}

impl MaintenanceTask {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            source_type: SourceType::default(),
            source_ref: None,
            ata_chapter: None,
            is_repetitive: false,
            drivers: Vec::new(),
            window_pct: 0.0,
            task_notes: None,
            usage_hours: None,
            usage_cycles: None,
            usage_as_of: None,
            in_service_date: None,
            last_compliance: None,
            status: None,
            controlling_unit: None,
            remaining: None,
            fraction_remaining: None,
            projected_due_date: None,
        }
    }

    pub fn with_driver(mut self, driver: TaskDriver) -> Self {
        self.drivers.push(driver);
        self
    }

    pub fn with_window_pct(mut self, window_pct: f64) -> Self {
        self.window_pct = window_pct;
        self
    }

    pub fn repetitive(mut self) -> Self {
        self.is_repetitive = true;
        self
    }

    /// Latest usage as an evaluator input, when one has been recorded.
    pub fn usage_snapshot(&self) -> Option<UsageSnapshot> {
        let as_of_date = self.usage_as_of?;
        let hours = self.usage_hours?;
        let cycles = self.usage_cycles?;
        Some(UsageSnapshot {
            hours,
            cycles,
            as_of_date,
            in_service_date: self.in_service_date,
            last_compliance: self.last_compliance,
        })
    }

    pub fn apply_estimate(&mut self, estimate: &DueEstimate) {
        self.status = Some(estimate.status);
        self.controlling_unit = Some(estimate.controlling_unit);
        self.remaining = Some(estimate.remaining());
        self.fraction_remaining = Some(estimate.fraction_remaining());
        self.projected_due_date = estimate.projected_due_date;
    }

    pub fn clear_estimate(&mut self) {
        self.status = None;
        self.controlling_unit = None;
        self.remaining = None;
        self.fraction_remaining = None;
        self.projected_due_date = None;
    }

    pub fn to_dataframe_row(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(19);

        let id_data: [i32; 1] = [self.id];
        columns.push(Series::new(PlSmallStr::from_static("id"), id_data).into_column());

        let name_data: [&str; 1] = [self.name.as_str()];
        columns.push(Series::new(PlSmallStr::from_static("name"), name_data).into_column());

        let source_type: [&str; 1] = [self.source_type.as_str()];
        columns
            .push(Series::new(PlSmallStr::from_static("source_type"), source_type).into_column());

        let source_ref: [Option<&str>; 1] = [self.source_ref.as_deref()];
        columns.push(Series::new(PlSmallStr::from_static("source_ref"), source_ref).into_column());

        let ata: [Option<&str>; 1] = [self.ata_chapter.as_deref()];
        columns.push(Series::new(PlSmallStr::from_static("ata_chapter"), ata).into_column());

        let repetitive: [bool; 1] = [self.is_repetitive];
        columns
            .push(Series::new(PlSmallStr::from_static("is_repetitive"), repetitive).into_column());

        let drivers_json = serde_json::to_string(&self.drivers)
            .map_err(|err| PolarsError::ComputeError(err.to_string().into()))?;
        let drivers: [&str; 1] = [drivers_json.as_str()];
        columns.push(Series::new(PlSmallStr::from_static("drivers"), drivers).into_column());

        let window: [f64; 1] = [self.window_pct];
        columns.push(Series::new(PlSmallStr::from_static("window_pct"), window).into_column());

        let notes: [Option<&str>; 1] = [self.task_notes.as_deref()];
        columns.push(Series::new(PlSmallStr::from_static("task_notes"), notes).into_column());

        let usage_hours: [Option<f64>; 1] = [self.usage_hours];
        columns
            .push(Series::new(PlSmallStr::from_static("usage_hours"), usage_hours).into_column());

        let usage_cycles: [Option<i64>; 1] = [self.usage_cycles];
        columns
            .push(Series::new(PlSmallStr::from_static("usage_cycles"), usage_cycles).into_column());

        columns.push(Self::series_from_date("usage_as_of", self.usage_as_of)?.into_column());
        columns
            .push(Self::series_from_date("in_service_date", self.in_service_date)?.into_column());

        let compliance_json = match &self.last_compliance {
            Some(record) => Some(
                serde_json::to_string(record)
                    .map_err(|err| PolarsError::ComputeError(err.to_string().into()))?,
            ),
            None => None,
        };
        let compliance: [Option<&str>; 1] = [compliance_json.as_deref()];
        columns.push(
            Series::new(PlSmallStr::from_static("last_compliance"), compliance).into_column(),
        );

        let status: [Option<&str>; 1] = [self.status.map(|s| s.as_str())];
        columns.push(Series::new(PlSmallStr::from_static("status"), status).into_column());

        let controlling: [Option<&str>; 1] = [self.controlling_unit.map(|u| u.as_str())];
        columns.push(
            Series::new(PlSmallStr::from_static("controlling_unit"), controlling).into_column(),
        );

        let remaining: [Option<f64>; 1] = [self.remaining];
        columns.push(Series::new(PlSmallStr::from_static("remaining"), remaining).into_column());

        let fraction: [Option<f64>; 1] = [self.fraction_remaining];
        columns.push(
            Series::new(PlSmallStr::from_static("fraction_remaining"), fraction).into_column(),
        );

        columns.push(
            Self::series_from_date("projected_due_date", self.projected_due_date)?.into_column(),
        );

        DataFrame::new(columns)
    }

    pub fn from_dataframe_row(df: &DataFrame, row_idx: usize) -> PolarsResult<Self> {
        let id = df
            .column("id")?
            .i32()?
            .get(row_idx)
            .ok_or_else(|| PolarsError::ComputeError("task row missing id".into()))?;

        let name = df
            .column("name")?
            .str()?
            .get(row_idx)
            .unwrap_or("")
            .to_string();

        let source_type = df
            .column("source_type")?
            .str()?
            .get(row_idx)
            .and_then(|s| SourceType::from_str(s).ok())
            .unwrap_or_default();

        let drivers_json = df.column("drivers")?.str()?.get(row_idx).unwrap_or("[]");
        let drivers: Vec<TaskDriver> = serde_json::from_str(drivers_json)
            .map_err(|err| PolarsError::ComputeError(err.to_string().into()))?;

        let last_compliance = match df.column("last_compliance")?.str()?.get(row_idx) {
            Some(json) if !json.is_empty() => Some(
                serde_json::from_str::<ComplianceRecord>(json)
                    .map_err(|err| PolarsError::ComputeError(err.to_string().into()))?,
            ),
            _ => None,
        };

        Ok(Self {
            id,
            name,
            source_type,
            source_ref: df
                .column("source_ref")?
                .str()?
                .get(row_idx)
                .map(ToOwned::to_owned),
            ata_chapter: df
                .column("ata_chapter")?
                .str()?
                .get(row_idx)
                .map(ToOwned::to_owned),
            is_repetitive: df
                .column("is_repetitive")?
                .bool()?
                .get(row_idx)
                .unwrap_or(false),
            drivers,
            window_pct: df.column("window_pct")?.f64()?.get(row_idx).unwrap_or(0.0),
            task_notes: df
                .column("task_notes")?
                .str()?
                .get(row_idx)
                .map(ToOwned::to_owned),
            usage_hours: df.column("usage_hours")?.f64()?.get(row_idx),
            usage_cycles: df.column("usage_cycles")?.i64()?.get(row_idx),
            usage_as_of: Self::date_from_series(df.column("usage_as_of")?.date()?, row_idx),
            in_service_date: Self::date_from_series(df.column("in_service_date")?.date()?, row_idx),
            last_compliance,
            status: df
                .column("status")?
                .str()?
                .get(row_idx)
                .and_then(|s| ComplianceStatus::from_str(s).ok()),
            controlling_unit: df
                .column("controlling_unit")?
                .str()?
                .get(row_idx)
                .and_then(|s| UsageUnit::from_str(s).ok()),
            remaining: df.column("remaining")?.f64()?.get(row_idx),
            fraction_remaining: df.column("fraction_remaining")?.f64()?.get(row_idx),
            projected_due_date: Self::date_from_series(
                df.column("projected_due_date")?.date()?,
                row_idx,
            ),
        })
    }

    fn series_from_date(name: &str, date: Option<NaiveDate>) -> PolarsResult<Series> {
        let data: [Option<i32>; 1] = [date.map(Self::date_to_i32)];
        Series::new(name.into(), data).cast(&DataType::Date)
    }

    fn date_from_series(chunked: &DateChunked, row_idx: usize) -> Option<NaiveDate> {
        chunked.get(row_idx).map(Self::date_from_i32)
    }

    fn date_to_i32(date: NaiveDate) -> i32 {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        (date - epoch).num_days() as i32
    }

    fn date_from_i32(days: i32) -> NaiveDate {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        epoch + Duration::days(days as i64)
    }
}
