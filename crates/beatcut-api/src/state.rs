//! Application state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use beatcut_models::{Task, TaskId};
use beatcut_store::TaskStore;

use crate::config::ApiConfig;

/// How long a task listing stays cached. The workers rewrite
/// descriptors every few seconds; serving a slightly stale list keeps
/// polling dashboards from hammering the directory.
const LIST_CACHE_TTL: Duration = Duration::from_secs(3);

/// One entry of the task listing. Corrupt descriptors are reported, not
/// hidden, so the dashboard can show stuck tasks.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum TaskEntry {
    Ok(Box<Task>),
    Corrupt { id: TaskId, error: String },
}

/// Shared application state. Strictly read-only over the store.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: TaskStore,
    list_cache: Arc<Mutex<Option<(Instant, Vec<TaskEntry>)>>>,
}

impl AppState {
    pub fn new(config: ApiConfig) -> Result<Self, beatcut_store::StoreError> {
        let store = TaskStore::open(&config.root)?;
        Ok(Self {
            config,
            store,
            list_cache: Arc::new(Mutex::new(None)),
        })
    }

    /// Current task listing, served from the short-lived cache.
    pub async fn list_tasks(&self) -> Result<Vec<TaskEntry>, beatcut_store::StoreError> {
        let mut cache = self.list_cache.lock().await;
        if let Some((at, entries)) = cache.as_ref() {
            if at.elapsed() < LIST_CACHE_TTL {
                return Ok(entries.clone());
            }
        }

        let mut entries = Vec::new();
        for task_ref in self.store.list_tasks().await? {
            match self.store.load(&task_ref).await {
                Ok(task) => entries.push(TaskEntry::Ok(Box::new(task))),
                Err(e) if e.is_corrupt() => entries.push(TaskEntry::Corrupt {
                    id: task_ref.id.clone(),
                    error: "corrupt".to_string(),
                }),
                Err(e) => return Err(e),
            }
        }

        *cache = Some((Instant::now(), entries.clone()));
        Ok(entries)
    }
}
