pub mod driver;
pub mod evaluator;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod metadata;
pub mod persistence;
pub mod registry;
pub mod task;
pub(crate) mod task_validation;
pub mod usage;

pub use driver::{DriverKind, TaskDriver, UsageUnit};
pub use evaluator::{ComplianceStatus, DueEstimate, EvaluationError, UnitMargin, next_due};
pub use metadata::ProgramMetadata;
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteRegistryStore;
pub use persistence::{
    PersistenceError, RegistryStore, load_registry_from_csv, load_registry_from_json,
    save_registry_to_csv, save_registry_to_json, validate_registry, validate_tasks,
};
pub use registry::{ComplianceRegistry, FleetSummary, RegistryMetadataError};
pub use task::{MaintenanceTask, SourceType};
pub use usage::{ComplianceRecord, UsageSnapshot};
