//! Directory-backed task descriptor store.
//!
//! Tasks live as `task_*.json` files in a single directory. Descriptors
//! are created externally (by the intake API); the pipeline workers load,
//! mutate and persist them here. `save` is atomic (temp file + rename in
//! the same directory) so a concurrent reader never observes a partially
//! written descriptor. There is no cross-process lock: writers must
//! tolerate last-writer-wins.

mod error;

pub use error::{StoreError, StoreResult};

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use beatcut_models::{Task, TaskId};

/// Reference to a task descriptor on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub id: TaskId,
    pub path: PathBuf,
}

/// Directory-backed repository of task descriptors.
#[derive(Debug, Clone)]
pub struct TaskStore {
    tasks_dir: PathBuf,
    output_dir: PathBuf,
    previews_dir: PathBuf,
}

impl TaskStore {
    /// Open a store rooted at `root`, creating the layout if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        let store = Self {
            tasks_dir: root.join("tasks"),
            output_dir: root.join("output"),
            previews_dir: root.join("previews"),
        };
        for dir in [&store.tasks_dir, &store.output_dir, &store.previews_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(store)
    }

    pub fn tasks_dir(&self) -> &Path {
        &self.tasks_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn previews_dir(&self) -> &Path {
        &self.previews_dir
    }

    /// Descriptor path for a task id.
    pub fn descriptor_path(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir.join(format!("{id}.json"))
    }

    /// Plan sidecar path for a task id. The `_plan.json` suffix keeps the
    /// sidecar out of `list_tasks`.
    pub fn plan_sidecar_path(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir.join(format!("{id}_plan.json"))
    }

    /// Deterministic artifact path for a task id, e.g. suffix
    /// `"_render.mp4"`. Re-running a stage overwrites rather than
    /// duplicates.
    pub fn output_path(&self, id: &TaskId, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{id}{suffix}"))
    }

    /// Enumerate all task descriptors, sorted by file name.
    ///
    /// Only files matching the `task_*.json` naming convention are
    /// returned; derived sidecars (`*_plan.json`) are excluded.
    pub async fn list_tasks(&self) -> StoreResult<Vec<TaskRef>> {
        let mut refs = Vec::new();
        let mut entries = fs::read_dir(&self.tasks_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with("task_") || !name.ends_with(".json") {
                continue;
            }
            if name.ends_with("_plan.json") {
                continue;
            }
            let stem = name.trim_end_matches(".json");
            refs.push(TaskRef {
                id: TaskId::from_string(stem),
                path,
            });
        }
        refs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(refs)
    }

    /// Load a descriptor. A missing `id` field is filled in from the file
    /// stem; unparseable JSON is reported as [`StoreError::Corrupt`].
    pub async fn load(&self, task_ref: &TaskRef) -> StoreResult<Task> {
        let text = fs::read_to_string(&task_ref.path).await?;
        parse_descriptor(&text, task_ref)
    }

    /// Load a descriptor, attempting a one-shot sanitization when the raw
    /// bytes fail to parse: invalid control bytes are stripped and the
    /// text re-parsed once. A successful recovery rewrites the cleaned
    /// descriptor; a second failure is [`StoreError::Corrupt`] and the
    /// file is left untouched.
    pub async fn load_sanitized(&self, task_ref: &TaskRef) -> StoreResult<Task> {
        let raw = fs::read(&task_ref.path).await?;
        let text = String::from_utf8_lossy(&raw);

        match parse_descriptor(&text, task_ref) {
            Ok(task) => Ok(task),
            Err(first) if first.is_corrupt() => {
                let cleaned = strip_control_bytes(&text);
                let task = parse_descriptor(&cleaned, task_ref)?;
                warn!(task_id = %task.id, "sanitized corrupt descriptor");
                // Rewrite in place: the embedded id may differ from the
                // file stem, and recovery must never fork the descriptor
                // into a second file.
                write_json_atomic(&task_ref.path, &task).await?;
                Ok(task)
            }
            Err(e) => Err(e),
        }
    }

    /// Atomically persist a descriptor: write a temp file in the same
    /// directory, then rename over the target. Readers see either the
    /// pre- or post-write content, never a truncated file.
    pub async fn save(&self, task: &Task) -> StoreResult<()> {
        let path = self.descriptor_path(&task.id);
        write_json_atomic(&path, task).await?;
        debug!(task_id = %task.id, status = %task.status, "descriptor saved");
        Ok(())
    }

    /// Atomically write an arbitrary JSON sidecar (e.g. the plan file).
    pub async fn write_sidecar<T: Serialize>(&self, path: &Path, value: &T) -> StoreResult<()> {
        write_json_atomic(path, value).await
    }
}

/// Parse descriptor text, deriving the id from the file stem if absent.
fn parse_descriptor(text: &str, task_ref: &TaskRef) -> StoreResult<Task> {
    let mut value: serde_json::Value = serde_json::from_str(text.trim())
        .map_err(|e| StoreError::corrupt(&task_ref.path, e))?;

    if let Some(obj) = value.as_object_mut() {
        if !obj.contains_key("id") {
            obj.insert(
                "id".to_string(),
                serde_json::Value::String(task_ref.id.to_string()),
            );
        }
    }

    serde_json::from_value(value).map_err(|e| StoreError::corrupt(&task_ref.path, e))
}

/// Strip C0 control bytes that commonly corrupt interrupted writes,
/// keeping the whitespace JSON allows.
fn strip_control_bytes(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| StoreError::persistence(path, std::io::Error::other(e)))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("descriptor.json");
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let result = async {
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::persistence(path, e));
    }
    Ok(())
}
