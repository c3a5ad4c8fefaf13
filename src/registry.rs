use crate::evaluator::{self, ComplianceStatus, EvaluationError};
use crate::metadata::ProgramMetadata;
use crate::task::MaintenanceTask;
use crate::task_validation;
use crate::usage::ComplianceRecord;
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters produced by a registry refresh, for dashboards and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSummary {
    pub task_count: usize,
    pub overdue_count: usize,
    pub due_soon_count: usize,
    pub on_track_count: usize,
    /// Non-repetitive tasks already complied with.
    pub completed_count: usize,
    /// Tasks with no usage recorded yet.
    pub unassessed_count: usize,
    pub earliest_due_date: Option<NaiveDate>,
    /// Overdue task ids, most urgent first.
    pub overdue_ids: Vec<i32>,
}

impl FleetSummary {
    pub fn to_cli_summary(&self) -> String {
        let mut parts = Vec::new();
        parts.push(format!("tasks={}", self.task_count));
        if self.overdue_count > 0 {
            parts.push(format!("overdue={}", self.overdue_count));
        }
        if self.due_soon_count > 0 {
            parts.push(format!("due_soon={}", self.due_soon_count));
        }
        parts.push(format!("ok={}", self.on_track_count));
        if self.completed_count > 0 {
            parts.push(format!("completed={}", self.completed_count));
        }
        if self.unassessed_count > 0 {
            parts.push(format!("unassessed={}", self.unassessed_count));
        }
        if let Some(date) = self.earliest_due_date {
            parts.push(format!("next_due={}", date));
        }
        if !self.overdue_ids.is_empty() {
            let chain = self
                .overdue_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("->");
            parts.push(format!("overdue_ids={}", chain));
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone)]
pub enum RegistryMetadataError {
    NegativeHorizon { days: i64 },
    Computation(String),
}

impl fmt::Display for RegistryMetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryMetadataError::NegativeHorizon { days } => write!(
                f,
                "review horizon must be non-negative, got {days} days"
            ),
            RegistryMetadataError::Computation(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for RegistryMetadataError {}

/// Fleet-wide collection of maintenance tasks, one DataFrame row per task.
/// The evaluator's results are written back as computed columns on refresh;
/// consumers read those columns and never re-derive status themselves.
#[derive(Debug)]
pub struct ComplianceRegistry {
    df: DataFrame,
    metadata: ProgramMetadata,
}

impl ComplianceRegistry {
    pub(crate) fn from_parts(metadata: ProgramMetadata) -> Self {
        let schema = Self::default_schema();
        Self {
            df: DataFrame::empty_with_schema(&schema),
            metadata,
        }
    }

    pub fn new() -> Self {
        Self::from_parts(ProgramMetadata::default())
    }

    pub fn new_with_metadata(metadata: ProgramMetadata) -> Self {
        Self::from_parts(metadata)
    }

    fn validate_metadata(metadata: &ProgramMetadata) -> Result<(), RegistryMetadataError> {
        if metadata.review_horizon_days < 0 {
            return Err(RegistryMetadataError::NegativeHorizon {
                days: metadata.review_horizon_days,
            });
        }
        Ok(())
    }

    pub fn set_metadata(&mut self, metadata: ProgramMetadata) -> Result<(), RegistryMetadataError> {
        Self::validate_metadata(&metadata)?;
        self.metadata = metadata;
        Ok(())
    }

    fn update_metadata_with<F>(&mut self, mutator: F) -> Result<(), RegistryMetadataError>
    where
        F: FnOnce(&mut ProgramMetadata),
    {
        let mut metadata = self.metadata.clone();
        mutator(&mut metadata);
        self.set_metadata(metadata)
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn metadata(&self) -> &ProgramMetadata {
        &self.metadata
    }

    pub fn program_name(&self) -> &str {
        &self.metadata.program_name
    }

    pub fn program_description(&self) -> &str {
        &self.metadata.program_description
    }

    pub fn review_horizon_days(&self) -> i64 {
        self.metadata.review_horizon_days
    }

    pub fn set_program_name(&mut self, name: impl Into<String>) {
        self.metadata.program_name = name.into();
    }

    pub fn set_program_description(&mut self, description: impl Into<String>) {
        self.metadata.program_description = description.into();
    }

    pub fn set_review_horizon_days(&mut self, days: i64) -> Result<(), RegistryMetadataError> {
        self.update_metadata_with(|metadata| {
            metadata.review_horizon_days = days;
        })
    }

    pub fn tasks(&self) -> Result<Vec<MaintenanceTask>, PolarsError> {
        let df = self.dataframe();
        let mut tasks = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            tasks.push(MaintenanceTask::from_dataframe_row(df, idx)?);
        }
        Ok(tasks)
    }

    pub fn find_task(&self, task_id: i32) -> Result<Option<MaintenanceTask>, PolarsError> {
        if self.df.height() == 0 {
            return Ok(None);
        }
        let ids = self.df.column("id")?.i32()?;
        for (idx, id_opt) in ids.into_iter().enumerate() {
            if id_opt == Some(task_id) {
                let task = MaintenanceTask::from_dataframe_row(self.dataframe(), idx)?;
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    pub fn delete_task(&mut self, task_id: i32) -> Result<bool, PolarsError> {
        if self.df.height() == 0 {
            return Ok(false);
        }
        let mut tasks = self.tasks()?;
        let before = tasks.len();
        tasks.retain(|task| task.id != task_id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.rebuild(tasks)?;
        Ok(true)
    }

    pub fn upsert_task_record(&mut self, task: MaintenanceTask) -> Result<(), PolarsError> {
        task_validation::validate_task(&task).map_err(Self::validation_error)?;
        let id_exists = if self.df.height() == 0 {
            false
        } else {
            self.df
                .column("id")?
                .i32()?
                .into_iter()
                .any(|v| v == Some(task.id))
        };

        if id_exists {
            let mut tasks = self.tasks()?;
            for slot in tasks.iter_mut() {
                if slot.id == task.id {
                    *slot = task;
                    break;
                }
            }
            return self.rebuild(tasks);
        }

        let new_row = task.to_dataframe_row()?;
        self.df = self.df.vstack(&new_row)?;
        Ok(())
    }

    /// Records the latest flight-log usage for the component a task tracks.
    pub fn record_usage(
        &mut self,
        task_id: i32,
        hours: f64,
        cycles: i64,
        as_of: NaiveDate,
    ) -> Result<(), PolarsError> {
        let mut task = self.require_task(task_id)?;
        task.usage_hours = Some(hours);
        task.usage_cycles = Some(cycles);
        task.usage_as_of = Some(as_of);
        self.upsert_task_record(task)
    }

    pub fn set_in_service_date(
        &mut self,
        task_id: i32,
        date: NaiveDate,
    ) -> Result<(), PolarsError> {
        let mut task = self.require_task(task_id)?;
        task.in_service_date = Some(date);
        self.upsert_task_record(task)
    }

    /// Records that the task was performed at the given usage. The usage
    /// columns advance to the compliance values when they lag behind, since
    /// compliance implies the asset has reached that usage.
    pub fn record_compliance(
        &mut self,
        task_id: i32,
        record: ComplianceRecord,
    ) -> Result<(), PolarsError> {
        let mut task = self.require_task(task_id)?;
        task.last_compliance = Some(record);
        match task.usage_hours {
            Some(hours) if hours >= record.hours => {}
            _ => task.usage_hours = Some(record.hours),
        }
        match task.usage_cycles {
            Some(cycles) if cycles >= record.cycles => {}
            _ => task.usage_cycles = Some(record.cycles),
        }
        match task.usage_as_of {
            Some(as_of) if as_of >= record.date => {}
            _ => task.usage_as_of = Some(record.date),
        }
        self.upsert_task_record(task)
    }

    /// Re-evaluates every task against its recorded usage, writes the
    /// computed columns back, and summarizes the fleet.
    pub fn refresh(&mut self) -> Result<FleetSummary, PolarsError> {
        let tasks = self.tasks()?;

        // One evaluator call per row; rows are independent.
        let evaluated: Result<Vec<(MaintenanceTask, RowState)>, EvaluationError> = tasks
            .into_par_iter()
            .map(|mut task| {
                let Some(usage) = task.usage_snapshot() else {
                    task.clear_estimate();
                    return Ok((task, RowState::Unassessed));
                };
                if !task.is_repetitive && task.last_compliance.is_some() {
                    task.clear_estimate();
                    return Ok((task, RowState::Completed));
                }
                let estimate = evaluator::next_due(&task, &usage)?;
                task.apply_estimate(&estimate);
                Ok((task, RowState::Assessed))
            })
            .collect();
        let evaluated = evaluated.map_err(Self::validation_error)?;

        let task_count = evaluated.len();
        let mut overdue_count = 0usize;
        let mut due_soon_count = 0usize;
        let mut on_track_count = 0usize;
        let mut completed_count = 0usize;
        let mut unassessed_count = 0usize;
        let mut earliest_due_date: Option<NaiveDate> = None;
        let mut overdue: Vec<(f64, i32)> = Vec::new();

        for (task, state) in &evaluated {
            match state {
                RowState::Unassessed => unassessed_count += 1,
                RowState::Completed => completed_count += 1,
                RowState::Assessed => {
                    match task.status {
                        Some(ComplianceStatus::Overdue) => {
                            overdue_count += 1;
                            overdue.push((task.fraction_remaining.unwrap_or(0.0), task.id));
                        }
                        Some(ComplianceStatus::DueSoon) => due_soon_count += 1,
                        Some(ComplianceStatus::Ok) | None => on_track_count += 1,
                    }
                    if let Some(due_date) = task.projected_due_date {
                        earliest_due_date = Some(match earliest_due_date {
                            Some(current) if current <= due_date => current,
                            _ => due_date,
                        });
                    }
                }
            }
        }

        overdue.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1)));
        let overdue_ids = overdue.into_iter().map(|(_, id)| id).collect();

        self.rebuild(evaluated.into_iter().map(|(task, _)| task).collect())?;

        Ok(FleetSummary {
            task_count,
            overdue_count,
            due_soon_count,
            on_track_count,
            completed_count,
            unassessed_count,
            earliest_due_date,
            overdue_ids,
        })
    }

    /// Tasks needing attention: overdue, due soon, or projected due within
    /// the review horizon of their usage as-of date. Most urgent first.
    pub fn watch_list(&self) -> Result<Vec<MaintenanceTask>, PolarsError> {
        let horizon = self.metadata.review_horizon_days;
        let mut flagged: Vec<MaintenanceTask> = self
            .tasks()?
            .into_iter()
            .filter(|task| match task.status {
                Some(ComplianceStatus::Overdue) | Some(ComplianceStatus::DueSoon) => true,
                Some(ComplianceStatus::Ok) => match (task.projected_due_date, task.usage_as_of) {
                    (Some(due), Some(as_of)) => due - as_of <= Duration::days(horizon),
                    _ => false,
                },
                None => false,
            })
            .collect();
        flagged.sort_by(|a, b| {
            let fa = a.fraction_remaining.unwrap_or(f64::MAX);
            let fb = b.fraction_remaining.unwrap_or(f64::MAX);
            fa.partial_cmp(&fb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(flagged)
    }

    fn require_task(&self, task_id: i32) -> Result<MaintenanceTask, PolarsError> {
        self.find_task(task_id)?.ok_or_else(|| {
            PolarsError::ComputeError(format!("task {task_id} not found").into())
        })
    }

    fn rebuild(&mut self, tasks: Vec<MaintenanceTask>) -> Result<(), PolarsError> {
        self.df = DataFrame::empty_with_schema(&Self::default_schema());
        for task in tasks {
            let row = task.to_dataframe_row()?;
            self.df = self.df.vstack(&row)?;
        }
        Ok(())
    }

    fn validation_error(err: EvaluationError) -> PolarsError {
        PolarsError::ComputeError(err.to_string().into())
    }

    fn default_schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("id".into(), DataType::Int32),
            Field::new("name".into(), DataType::String),
            Field::new("source_type".into(), DataType::String),
            Field::new("source_ref".into(), DataType::String),
            Field::new("ata_chapter".into(), DataType::String),
            Field::new("is_repetitive".into(), DataType::Boolean),
            Field::new("drivers".into(), DataType::String),
            Field::new("window_pct".into(), DataType::Float64),
            Field::new("task_notes".into(), DataType::String),
            Field::new("usage_hours".into(), DataType::Float64),
            Field::new("usage_cycles".into(), DataType::Int64),
            Field::new("usage_as_of".into(), DataType::Date),
            Field::new("in_service_date".into(), DataType::Date),
            Field::new("last_compliance".into(), DataType::String),
            Field::new("status".into(), DataType::String),
            Field::new("controlling_unit".into(), DataType::String),
            Field::new("remaining".into(), DataType::Float64),
            Field::new("fraction_remaining".into(), DataType::Float64),
            Field::new("projected_due_date".into(), DataType::Date),
        ])
    }

    // Column setters for CLI editing.
    #[cfg(feature = "cli_api")]
    pub fn set_task_notes(&mut self, task_id: i32, notes: &str) -> Result<(), PolarsError> {
        let mut task = self.require_task(task_id)?;
        task.task_notes = Some(notes.to_string());
        self.upsert_task_record(task)
    }

    #[cfg(feature = "cli_api")]
    pub fn set_source(
        &mut self,
        task_id: i32,
        source_type: crate::task::SourceType,
        source_ref: Option<String>,
    ) -> Result<(), PolarsError> {
        let mut task = self.require_task(task_id)?;
        task.source_type = source_type;
        task.source_ref = source_ref;
        self.upsert_task_record(task)
    }

    #[cfg(feature = "cli_api")]
    pub fn set_window_pct(&mut self, task_id: i32, window_pct: f64) -> Result<(), PolarsError> {
        let mut task = self.require_task(task_id)?;
        task.window_pct = window_pct;
        self.upsert_task_record(task)
    }

    #[cfg(feature = "cli_api")]
    pub fn set_ata_chapter(&mut self, task_id: i32, chapter: &str) -> Result<(), PolarsError> {
        let mut task = self.require_task(task_id)?;
        task.ata_chapter = Some(chapter.to_string());
        self.upsert_task_record(task)
    }
}

impl Default for ComplianceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

enum RowState {
    Assessed,
    Completed,
    Unassessed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{TaskDriver, UsageUnit};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn default_schema_contains_expected_columns() {
        let schema = ComplianceRegistry::default_schema();
        let expected = vec![
            "id",
            "name",
            "source_type",
            "source_ref",
            "ata_chapter",
            "is_repetitive",
            "drivers",
            "window_pct",
            "task_notes",
            "usage_hours",
            "usage_cycles",
            "usage_as_of",
            "in_service_date",
            "last_compliance",
            "status",
            "controlling_unit",
            "remaining",
            "fraction_remaining",
            "projected_due_date",
        ];
        for name in expected {
            assert!(schema.contains(name.into()), "missing column {name}");
        }
    }

    #[test]
    fn upsert_task_record_inserts_and_updates() {
        let mut registry = ComplianceRegistry::new();
        let task = MaintenanceTask::new(1, "Engine borescope")
            .with_driver(TaskDriver::threshold(UsageUnit::Hours, 500.0));
        registry.upsert_task_record(task).unwrap();
        assert_eq!(registry.dataframe().height(), 1);

        let mut updated = registry.find_task(1).unwrap().unwrap();
        updated.name = "Engine borescope inspection".to_string();
        updated.window_pct = 10.0;
        registry.upsert_task_record(updated).unwrap();

        assert_eq!(registry.dataframe().height(), 1);
        let task = registry.find_task(1).unwrap().unwrap();
        assert_eq!(task.name, "Engine borescope inspection");
        assert_eq!(task.window_pct, 10.0);
    }

    #[test]
    fn refresh_flags_overdue_threshold_task() {
        let mut registry = ComplianceRegistry::new();
        let task = MaintenanceTask::new(7, "Gear overhaul")
            .with_driver(TaskDriver::threshold(UsageUnit::Hours, 100.0));
        registry.upsert_task_record(task).unwrap();
        registry.record_usage(7, 150.0, 40, d(2025, 3, 1)).unwrap();

        let summary = registry.refresh().unwrap();
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.overdue_ids, vec![7]);

        let task = registry.find_task(7).unwrap().unwrap();
        assert_eq!(task.status, Some(ComplianceStatus::Overdue));
        assert_eq!(task.remaining, Some(-50.0));
    }
}
