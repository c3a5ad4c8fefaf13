use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::evaluator;
use crate::usage::ComplianceRecord;
use crate::{ComplianceRegistry, FleetSummary, MaintenanceTask, ProgramMetadata};

#[derive(Clone)]
pub struct AppState {
    registry: Arc<RwLock<ComplianceRegistry>>,
}

impl AppState {
    pub fn new(registry: ComplianceRegistry) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
        }
    }

    pub fn with_shared(registry: Arc<RwLock<ComplianceRegistry>>) -> Self {
        Self { registry }
    }

    fn registry(&self) -> Arc<RwLock<ComplianceRegistry>> {
        self.registry.clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    hours: f64,
    cycles: i64,
    as_of: NaiveDate,
    in_service_date: Option<NaiveDate>,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<polars::prelude::PolarsError> for ApiError {
    fn from(value: polars::prelude::PolarsError) -> Self {
        ApiError::Invalid(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                let body = Json(ErrorBody {
                    error: "not_found",
                    message,
                });
                (StatusCode::NOT_FOUND, body).into_response()
            }
            ApiError::Conflict(message) => {
                let body = Json(ErrorBody {
                    error: "conflict",
                    message,
                });
                (StatusCode::CONFLICT, body).into_response()
            }
            ApiError::Invalid(message) => {
                let body = Json(ErrorBody {
                    error: "invalid_request",
                    message,
                });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::Internal(message) => {
                let body = Json(ErrorBody {
                    error: "internal_error",
                    message,
                });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metadata", get(get_metadata).put(update_metadata))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/:id/usage", post(record_usage))
        .route("/tasks/:id/compliance", post(record_compliance))
        .route("/tasks/:id/status", get(task_status))
        .route("/watch", get(watch_list))
        .route("/refresh", post(refresh_registry))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, registry: ComplianceRegistry) -> std::io::Result<()> {
    let state = AppState::new(registry);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_metadata(State(state): State<AppState>) -> Json<ProgramMetadata> {
    let registry = state.registry();
    let metadata = {
        let guard = registry.read();
        guard.metadata().clone()
    };
    Json(metadata)
}

async fn update_metadata(
    State(state): State<AppState>,
    Json(metadata): Json<ProgramMetadata>,
) -> Result<Json<ProgramMetadata>, ApiError> {
    let registry = state.registry();
    {
        let mut guard = registry.write();
        guard
            .set_metadata(metadata.clone())
            .map_err(|err| ApiError::invalid(err.to_string()))?;
        guard.refresh().map_err(ApiError::from)?;
    }
    let current = {
        let guard = registry.read();
        guard.metadata().clone()
    };
    Ok(Json(current))
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<MaintenanceTask>>, ApiError> {
    let registry = state.registry();
    let tasks = {
        let guard = registry.read();
        guard.tasks()?
    };
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
) -> Result<Json<MaintenanceTask>, ApiError> {
    let registry = state.registry();
    let result = {
        let guard = registry.read();
        guard.find_task(task_id)?
    };
    match result {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::not_found(format!("task {task_id} not found"))),
    }
}

async fn create_task(
    State(state): State<AppState>,
    Json(task): Json<MaintenanceTask>,
) -> Result<(StatusCode, Json<MaintenanceTask>), ApiError> {
    let registry = state.registry();
    {
        let mut guard = registry.write();
        if guard.find_task(task.id)?.is_some() {
            return Err(ApiError::Conflict(format!(
                "task {} already exists",
                task.id
            )));
        }
        guard
            .upsert_task_record(task.clone())
            .map_err(ApiError::from)?;
        guard.refresh().map_err(ApiError::from)?;
    }
    let created = {
        let guard = registry.read();
        guard
            .find_task(task.id)?
            .ok_or_else(|| ApiError::internal("task not found after creation"))?
    };
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
    Json(task): Json<MaintenanceTask>,
) -> Result<Json<MaintenanceTask>, ApiError> {
    if task.id != task_id {
        return Err(ApiError::invalid(
            "task id in payload does not match path parameter",
        ));
    }
    let registry = state.registry();
    {
        let mut guard = registry.write();
        if guard.find_task(task_id)?.is_none() {
            return Err(ApiError::not_found(format!("task {task_id} not found")));
        }
        guard
            .upsert_task_record(task.clone())
            .map_err(ApiError::from)?;
        guard.refresh().map_err(ApiError::from)?;
    }
    let updated = {
        let guard = registry.read();
        guard
            .find_task(task_id)?
            .ok_or_else(|| ApiError::internal("task not found after update"))?
    };
    Ok(Json(updated))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let registry = state.registry();
    let removed = {
        let mut guard = registry.write();
        guard.delete_task(task_id)?
    };
    if !removed {
        return Err(ApiError::not_found(format!("task {task_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn record_usage(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
    Json(payload): Json<UsagePayload>,
) -> Result<Json<MaintenanceTask>, ApiError> {
    let registry = state.registry();
    {
        let mut guard = registry.write();
        if guard.find_task(task_id)?.is_none() {
            return Err(ApiError::not_found(format!("task {task_id} not found")));
        }
        // The in-service date anchors calendar drivers, so it must land
        // before the usage row is validated.
        if let Some(date) = payload.in_service_date {
            guard
                .set_in_service_date(task_id, date)
                .map_err(ApiError::from)?;
        }
        guard
            .record_usage(task_id, payload.hours, payload.cycles, payload.as_of)
            .map_err(ApiError::from)?;
        guard.refresh().map_err(ApiError::from)?;
    }
    let updated = {
        let guard = registry.read();
        guard
            .find_task(task_id)?
            .ok_or_else(|| ApiError::internal("task not found after usage update"))?
    };
    Ok(Json(updated))
}

async fn record_compliance(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
    Json(record): Json<ComplianceRecord>,
) -> Result<Json<MaintenanceTask>, ApiError> {
    let registry = state.registry();
    {
        let mut guard = registry.write();
        if guard.find_task(task_id)?.is_none() {
            return Err(ApiError::not_found(format!("task {task_id} not found")));
        }
        guard
            .record_compliance(task_id, record)
            .map_err(ApiError::from)?;
        guard.refresh().map_err(ApiError::from)?;
    }
    let updated = {
        let guard = registry.read();
        guard
            .find_task(task_id)?
            .ok_or_else(|| ApiError::internal("task not found after compliance update"))?
    };
    Ok(Json(updated))
}

async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let registry = state.registry();
    let task = {
        let guard = registry.read();
        guard
            .find_task(task_id)?
            .ok_or_else(|| ApiError::not_found(format!("task {task_id} not found")))?
    };
    // A one-time task already complied with has nothing left to evaluate;
    // report it the same way refresh counts it.
    if !task.is_repetitive && task.last_compliance.is_some() {
        return Ok(Json(json!({ "status": "completed" })));
    }
    let usage = task.usage_snapshot().ok_or_else(|| {
        ApiError::invalid(format!("task {task_id} has no usage recorded"))
    })?;
    let estimate =
        evaluator::next_due(&task, &usage).map_err(|err| ApiError::invalid(err.to_string()))?;
    serde_json::to_value(&estimate)
        .map(Json)
        .map_err(|err| ApiError::internal(err.to_string()))
}

async fn watch_list(
    State(state): State<AppState>,
) -> Result<Json<Vec<MaintenanceTask>>, ApiError> {
    let registry = state.registry();
    let flagged = {
        let guard = registry.read();
        guard.watch_list()?
    };
    Ok(Json(flagged))
}

async fn refresh_registry(State(state): State<AppState>) -> Result<Json<FleetSummary>, ApiError> {
    let registry = state.registry();
    let summary = {
        let mut guard = registry.write();
        guard.refresh().map_err(ApiError::from)?
    };
    Ok(Json(summary))
}
