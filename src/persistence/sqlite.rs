use super::{PersistenceError, PersistenceResult, RegistryStore};
use crate::driver::{TaskDriver, UsageUnit};
use crate::evaluator::ComplianceStatus;
use crate::task::SourceType;
use crate::usage::ComplianceRecord;
use crate::{ComplianceRegistry, MaintenanceTask, ProgramMetadata};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use std::str::FromStr;
use std::sync::Mutex;

/// SQLite-backed registry store. Tasks are stored in typed columns mirroring
/// the registry schema; only the driver list and the compliance record,
/// which are structured values, go in as JSON text. Dates are ISO-8601 text.
pub struct SqliteRegistryStore {
    connection: Mutex<Connection>,
}

impl SqliteRegistryStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS program_metadata (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                program_name TEXT NOT NULL,
                program_description TEXT NOT NULL,
                review_horizon_days INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                source_type TEXT NOT NULL,
                source_ref TEXT,
                ata_chapter TEXT,
                is_repetitive INTEGER NOT NULL,
                drivers TEXT NOT NULL,
                window_pct REAL NOT NULL,
                task_notes TEXT,
                usage_hours REAL,
                usage_cycles INTEGER,
                usage_as_of TEXT,
                in_service_date TEXT,
                last_compliance TEXT,
                status TEXT,
                controlling_unit TEXT,
                remaining REAL,
                fraction_remaining REAL,
                projected_due_date TEXT
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn save_metadata(
        &self,
        tx: &rusqlite::Transaction,
        metadata: &ProgramMetadata,
    ) -> PersistenceResult<()> {
        tx.execute("DELETE FROM program_metadata", [])?;
        tx.execute(
            "INSERT INTO program_metadata (id, program_name, program_description, review_horizon_days) \
             VALUES (1, ?1, ?2, ?3)",
            params![
                metadata.program_name,
                metadata.program_description,
                metadata.review_horizon_days
            ],
        )?;
        Ok(())
    }

    fn save_tasks(
        &self,
        tx: &rusqlite::Transaction,
        registry: &ComplianceRegistry,
    ) -> PersistenceResult<()> {
        tx.execute("DELETE FROM tasks", [])?;
        let df = registry.dataframe();
        let mut stmt = tx.prepare(
            "INSERT INTO tasks (id, name, source_type, source_ref, ata_chapter, is_repetitive, \
             drivers, window_pct, task_notes, usage_hours, usage_cycles, usage_as_of, \
             in_service_date, last_compliance, status, controlling_unit, remaining, \
             fraction_remaining, projected_due_date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        )?;
        for row_idx in 0..df.height() {
            let task = MaintenanceTask::from_dataframe_row(df, row_idx)?;
            let drivers_json = serde_json::to_string(&task.drivers)?;
            let compliance_json = task
                .last_compliance
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            stmt.execute(params![
                task.id,
                task.name,
                task.source_type.as_str(),
                task.source_ref,
                task.ata_chapter,
                task.is_repetitive,
                drivers_json,
                task.window_pct,
                task.task_notes,
                task.usage_hours,
                task.usage_cycles,
                task.usage_as_of.map(date_to_text),
                task.in_service_date.map(date_to_text),
                compliance_json,
                task.status.map(|s| s.as_str()),
                task.controlling_unit.map(|u| u.as_str()),
                task.remaining,
                task.fraction_remaining,
                task.projected_due_date.map(date_to_text),
            ])?;
        }
        Ok(())
    }
}

impl RegistryStore for SqliteRegistryStore {
    fn save_registry(&self, registry: &ComplianceRegistry) -> PersistenceResult<()> {
        super::validate_registry(registry)?;
        let mut conn = self.connection.lock().expect("sqlite mutex poisoned");
        let tx = conn.transaction()?;
        self.save_metadata(&tx, registry.metadata())?;
        self.save_tasks(&tx, registry)?;
        tx.commit()?;
        Ok(())
    }

    fn load_registry(&self) -> PersistenceResult<Option<ComplianceRegistry>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");

        let mut stmt = conn.prepare(
            "SELECT program_name, program_description, review_horizon_days \
             FROM program_metadata WHERE id = 1",
        )?;
        let metadata = stmt
            .query_row([], |row| {
                Ok(ProgramMetadata {
                    program_name: row.get(0)?,
                    program_description: row.get(1)?,
                    review_horizon_days: row.get(2)?,
                })
            })
            .optional()?;

        let Some(metadata) = metadata else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, name, source_type, source_ref, ata_chapter, is_repetitive, drivers, \
             window_pct, task_notes, usage_hours, usage_cycles, usage_as_of, in_service_date, \
             last_compliance, status, controlling_unit, remaining, fraction_remaining, \
             projected_due_date FROM tasks ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| TaskRow::from_row(row))?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }

        super::validate_tasks(&tasks)?;

        let mut registry = ComplianceRegistry::new_with_metadata(metadata);
        for task in tasks {
            registry.upsert_task_record(task)?;
        }

        Ok(Some(registry))
    }
}

struct TaskRow {
    id: i32,
    name: String,
    source_type: String,
    source_ref: Option<String>,
    ata_chapter: Option<String>,
    is_repetitive: bool,
    drivers: String,
    window_pct: f64,
    task_notes: Option<String>,
    usage_hours: Option<f64>,
    usage_cycles: Option<i64>,
    usage_as_of: Option<String>,
    in_service_date: Option<String>,
    last_compliance: Option<String>,
    status: Option<String>,
    controlling_unit: Option<String>,
    remaining: Option<f64>,
    fraction_remaining: Option<f64>,
    projected_due_date: Option<String>,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            source_type: row.get(2)?,
            source_ref: row.get(3)?,
            ata_chapter: row.get(4)?,
            is_repetitive: row.get(5)?,
            drivers: row.get(6)?,
            window_pct: row.get(7)?,
            task_notes: row.get(8)?,
            usage_hours: row.get(9)?,
            usage_cycles: row.get(10)?,
            usage_as_of: row.get(11)?,
            in_service_date: row.get(12)?,
            last_compliance: row.get(13)?,
            status: row.get(14)?,
            controlling_unit: row.get(15)?,
            remaining: row.get(16)?,
            fraction_remaining: row.get(17)?,
            projected_due_date: row.get(18)?,
        })
    }

    fn into_task(self) -> PersistenceResult<MaintenanceTask> {
        let mut task = MaintenanceTask::new(self.id, self.name);
        task.source_type = SourceType::from_str(&self.source_type).map_err(|_| {
            PersistenceError::InvalidData(format!("invalid source_type '{}'", self.source_type))
        })?;
        task.source_ref = self.source_ref;
        task.ata_chapter = self.ata_chapter;
        task.is_repetitive = self.is_repetitive;
        task.drivers = serde_json::from_str::<Vec<TaskDriver>>(&self.drivers)?;
        task.window_pct = self.window_pct;
        task.task_notes = self.task_notes;
        task.usage_hours = self.usage_hours;
        task.usage_cycles = self.usage_cycles;
        task.usage_as_of = parse_date_text(self.usage_as_of.as_deref())?;
        task.in_service_date = parse_date_text(self.in_service_date.as_deref())?;
        task.last_compliance = match self.last_compliance {
            Some(json) => Some(serde_json::from_str::<ComplianceRecord>(&json)?),
            None => None,
        };
        task.status = match self.status {
            Some(s) => Some(ComplianceStatus::from_str(&s).map_err(|_| {
                PersistenceError::InvalidData(format!("invalid status '{s}'"))
            })?),
            None => None,
        };
        task.controlling_unit = match self.controlling_unit {
            Some(s) => Some(UsageUnit::from_str(&s).map_err(|_| {
                PersistenceError::InvalidData(format!("invalid controlling_unit '{s}'"))
            })?),
            None => None,
        };
        task.remaining = self.remaining;
        task.fraction_remaining = self.fraction_remaining;
        task.projected_due_date = parse_date_text(self.projected_due_date.as_deref())?;
        Ok(task)
    }
}

fn date_to_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date_text(text: Option<&str>) -> PersistenceResult<Option<NaiveDate>> {
    match text {
        None => Ok(None),
        Some(t) => NaiveDate::parse_from_str(t, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{t}': {e}"))),
    }
}
