use super::{PersistenceError, PersistenceResult};
use crate::driver::{TaskDriver, UsageUnit};
use crate::evaluator::ComplianceStatus;
use crate::task::SourceType;
use crate::usage::ComplianceRecord;
use crate::{ComplianceRegistry, MaintenanceTask, ProgramMetadata};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

#[derive(Serialize, Deserialize)]
struct RegistrySnapshot {
    metadata: ProgramMetadata,
    tasks: Vec<MaintenanceTask>,
}

impl RegistrySnapshot {
    fn from_registry(registry: &ComplianceRegistry) -> PersistenceResult<Self> {
        let df = registry.dataframe();
        let mut tasks = Vec::with_capacity(df.height());
        for row_idx in 0..df.height() {
            tasks.push(MaintenanceTask::from_dataframe_row(df, row_idx)?);
        }
        super::validate_tasks(&tasks)?;
        Ok(Self {
            metadata: registry.metadata().clone(),
            tasks,
        })
    }

    fn into_registry(self) -> PersistenceResult<ComplianceRegistry> {
        super::validate_tasks(&self.tasks)?;
        let mut registry = ComplianceRegistry::new_with_metadata(self.metadata);
        for task in self.tasks {
            registry.upsert_task_record(task)?;
        }
        Ok(registry)
    }
}

pub fn save_registry_to_json<P: AsRef<Path>>(
    registry: &ComplianceRegistry,
    path: P,
) -> PersistenceResult<()> {
    let snapshot = RegistrySnapshot::from_registry(registry)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    Ok(())
}

pub fn load_registry_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<ComplianceRegistry> {
    let file = File::open(path)?;
    let snapshot: RegistrySnapshot = serde_json::from_reader(file)?;
    snapshot.into_registry()
}

#[derive(Default, Serialize, Deserialize)]
struct TaskCsvRecord {
    id: i32,
    name: String,
    source_type: String,
    source_ref: String,
    ata_chapter: String,
    is_repetitive: String,
    drivers: String,
    window_pct: String,
    task_notes: String,
    usage_hours: String,
    usage_cycles: String,
    usage_as_of: String,
    in_service_date: String,
    last_compliance: String,
    status: String,
    controlling_unit: String,
    remaining: String,
    fraction_remaining: String,
    projected_due_date: String,
    #[serde(default)]
    metadata_json: String,
}

impl From<&MaintenanceTask> for TaskCsvRecord {
    fn from(task: &MaintenanceTask) -> Self {
        let mut record = TaskCsvRecord::default();
        record.id = task.id;
        record.name = task.name.clone();
        record.source_type = task.source_type.as_str().to_string();
        record.source_ref = task.source_ref.clone().unwrap_or_default();
        record.ata_chapter = task.ata_chapter.clone().unwrap_or_default();
        record.is_repetitive = task.is_repetitive.to_string();
        record.drivers = serde_json::to_string(&task.drivers).unwrap_or_else(|_| "[]".to_string());
        record.window_pct = task.window_pct.to_string();
        record.task_notes = task.task_notes.clone().unwrap_or_default();
        record.usage_hours = format_option_f64(task.usage_hours);
        record.usage_cycles = format_option_i64(task.usage_cycles);
        record.usage_as_of = format_date(task.usage_as_of);
        record.in_service_date = format_date(task.in_service_date);
        record.last_compliance = task
            .last_compliance
            .as_ref()
            .and_then(|r| serde_json::to_string(r).ok())
            .unwrap_or_default();
        record.status = task
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        record.controlling_unit = task
            .controlling_unit
            .map(|u| u.as_str().to_string())
            .unwrap_or_default();
        record.remaining = format_option_f64(task.remaining);
        record.fraction_remaining = format_option_f64(task.fraction_remaining);
        record.projected_due_date = format_date(task.projected_due_date);
        record
    }
}

impl TaskCsvRecord {
    fn metadata_row(registry: &ComplianceRegistry) -> PersistenceResult<Self> {
        let metadata_json = serde_json::to_string(registry.metadata())?;
        let mut record = TaskCsvRecord::default();
        record.name = "__metadata__".to_string();
        record.metadata_json = metadata_json;
        Ok(record)
    }

    fn is_metadata_row(&self) -> bool {
        !self.metadata_json.trim().is_empty()
    }

    fn into_task(self) -> PersistenceResult<MaintenanceTask> {
        if self.is_metadata_row() {
            return Err(PersistenceError::InvalidData(
                "metadata row cannot be converted to task".into(),
            ));
        }
        let mut task = MaintenanceTask::new(self.id, self.name);
        task.source_type = SourceType::from_str(self.source_type.trim()).map_err(|_| {
            PersistenceError::InvalidData(format!("invalid source_type '{}'", self.source_type))
        })?;
        task.source_ref = parse_string_option(self.source_ref);
        task.ata_chapter = parse_string_option(self.ata_chapter);
        task.is_repetitive = parse_bool(&self.is_repetitive)?.unwrap_or(false);
        task.drivers = if self.drivers.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<Vec<TaskDriver>>(&self.drivers)
                .map_err(|err| PersistenceError::InvalidData(format!("invalid drivers: {err}")))?
        };
        task.window_pct = parse_f64(&self.window_pct)?.unwrap_or(0.0);
        task.task_notes = parse_string_option(self.task_notes);
        task.usage_hours = parse_f64(&self.usage_hours)?;
        task.usage_cycles = parse_i64(&self.usage_cycles)?;
        task.usage_as_of = parse_date(&self.usage_as_of)?;
        task.in_service_date = parse_date(&self.in_service_date)?;
        task.last_compliance = if self.last_compliance.trim().is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<ComplianceRecord>(&self.last_compliance).map_err(|err| {
                    PersistenceError::InvalidData(format!("invalid last_compliance: {err}"))
                })?,
            )
        };
        task.status = match self.status.trim() {
            "" => None,
            other => Some(ComplianceStatus::from_str(other).map_err(|_| {
                PersistenceError::InvalidData(format!("invalid status '{other}'"))
            })?),
        };
        task.controlling_unit = match self.controlling_unit.trim() {
            "" => None,
            other => Some(UsageUnit::from_str(other).map_err(|_| {
                PersistenceError::InvalidData(format!("invalid controlling_unit '{other}'"))
            })?),
        };
        task.remaining = parse_f64(&self.remaining)?;
        task.fraction_remaining = parse_f64(&self.fraction_remaining)?;
        task.projected_due_date = parse_date(&self.projected_due_date)?;
        Ok(task)
    }
}

pub fn save_registry_to_csv<P: AsRef<Path>>(
    registry: &ComplianceRegistry,
    path: P,
) -> PersistenceResult<()> {
    super::validate_registry(registry)?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.serialize(TaskCsvRecord::metadata_row(registry)?)?;
    let df = registry.dataframe();
    for row_idx in 0..df.height() {
        let task = MaintenanceTask::from_dataframe_row(df, row_idx)?;
        writer.serialize(TaskCsvRecord::from(&task))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_registry_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<ComplianceRegistry> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut tasks = Vec::new();
    let mut metadata: Option<ProgramMetadata> = None;
    for record in reader.deserialize::<TaskCsvRecord>() {
        let record = record?;
        if record.is_metadata_row() {
            if metadata.is_some() {
                return Err(PersistenceError::InvalidData(
                    "CSV file contained multiple metadata rows".into(),
                ));
            }
            metadata = Some(serde_json::from_str(&record.metadata_json).map_err(|err| {
                PersistenceError::InvalidData(format!("invalid metadata json: {err}"))
            })?);
            continue;
        }
        tasks.push(record.into_task()?);
    }

    if tasks.is_empty() {
        return Err(PersistenceError::InvalidData(
            "CSV file contained no tasks".into(),
        ));
    }

    super::validate_tasks(&tasks)?;

    let mut registry = match metadata {
        Some(metadata) => ComplianceRegistry::new_with_metadata(metadata),
        None => ComplianceRegistry::new(),
    };
    for task in tasks {
        registry.upsert_task_record(task)?;
    }
    Ok(registry)
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_date(input: &str) -> PersistenceResult<Option<NaiveDate>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn format_option_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_f64(input: &str) -> PersistenceResult<Option<f64>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid float '{input}': {e}")))
}

fn format_option_i64(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_i64(input: &str) -> PersistenceResult<Option<i64>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid integer '{input}': {e}")))
}

fn parse_bool(input: &str) -> PersistenceResult<Option<bool>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    match input.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        other => Err(PersistenceError::InvalidData(format!(
            "invalid boolean '{other}'"
        ))),
    }
}

fn parse_string_option(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
