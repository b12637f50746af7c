//! Read-only status handlers.
//!
//! Every handler observes the task store and the output directory;
//! nothing here writes. Task mutation belongs to the pipeline workers.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use beatcut_models::{Task, TaskId};
use beatcut_store::TaskRef;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, TaskEntry};

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub task_count: usize,
    pub output_count: usize,
}

/// Health check endpoint (liveness probe).
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let task_count = state.store.list_tasks().await?.len();
    let output_count = std::fs::read_dir(state.store.output_dir())
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0);

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        task_count,
        output_count,
    }))
}

/// List every known task, corrupt descriptors included.
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<Vec<TaskEntry>>> {
    Ok(Json(state.list_tasks().await?))
}

/// Fetch a single task by id.
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let id = TaskId::from_string(id);
    let path = state.store.descriptor_path(&id);
    if !path.exists() {
        return Err(ApiError::not_found(format!("task '{id}' does not exist")));
    }

    let task = state.store.load(&TaskRef { id, path }).await?;
    Ok(Json(task))
}

/// Metadata for one output artifact.
#[derive(Serialize)]
pub struct OutputEntry {
    pub name: String,
    pub size: u64,
    pub modified: Option<String>,
}

/// List output artifact metadata.
pub async fn list_outputs(State(state): State<AppState>) -> ApiResult<Json<Vec<OutputEntry>>> {
    let mut outputs = Vec::new();
    let entries = std::fs::read_dir(state.store.output_dir())
        .map_err(|e| ApiError::internal(format!("output dir unreadable: {e}")))?;

    for entry in entries.filter_map(|e| e.ok()) {
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        outputs.push(OutputEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: meta.len(),
            modified: meta
                .modified()
                .ok()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
        });
    }
    outputs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(outputs))
}

/// Serve one output artifact's bytes.
pub async fn get_output(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    // Plain file names only; the output directory is flat.
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ApiError::bad_request("invalid artifact name"));
    }

    let path = state.store.output_dir().join(&name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found(format!("artifact '{name}' does not exist")))?;

    let content_type = if name.ends_with(".mp4") {
        "video/mp4"
    } else {
        "application/octet-stream"
    };
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
