//! The task descriptor, one unit of pipeline work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::{AudioAnalysis, PlanBlock, RenderMode, Scene, TaskStatus};

/// Unique identifier for a task. Derived from the descriptor file stem
/// when the JSON carries no `id` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(format!("task_{}", Uuid::new_v4().simple()))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable task inputs, set at descriptor creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default)]
    pub videos: Vec<String>,
}

/// Attempted status transition violated the pipeline order.
#[derive(Debug, Error)]
#[error("invalid status transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// The persisted task descriptor.
///
/// Mutated exclusively through atomic rewrite by the stage runner, render
/// supervisor and resume worker; consumers (the status API) read it
/// read-only. `notes` is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub inputs: TaskInputs,

    #[serde(default)]
    pub render_mode: RenderMode,

    /// Written once by the analyze stage, read-only thereafter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AudioAnalysis>,

    /// Scene intervals from the select stage
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,

    /// Preview clip paths derived from the scenes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clips: Vec<String>,

    /// Edit plan; immutable once rendering begins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<PlanBlock>>,

    /// Plan sidecar file written next to the descriptor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_path: Option<String>,

    /// Primary rendered artifact. Never silently replaced once verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Repaired artifact path; set only when a repair succeeds, keeping
    /// `output` intact for audit history
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered_output: Option<String>,

    #[serde(default)]
    pub repair_attempts: u32,

    /// Append-only log of human-readable progress markers
    #[serde(default)]
    pub notes: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a fresh pending task.
    pub fn new(id: TaskId, inputs: TaskInputs) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Pending,
            inputs,
            render_mode: RenderMode::default(),
            analysis: None,
            scenes: Vec::new(),
            clips: Vec::new(),
            plan: None,
            plan_path: None,
            output: None,
            recovered_output: None,
            repair_attempts: 0,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the status, enforcing monotonic pipeline order.
    pub fn advance(&mut self, next: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append a timestamped progress note. Notes are never rewritten.
    pub fn note(&mut self, msg: impl Into<String>) {
        self.notes
            .push(format!("[{}] {}", Utc::now().to_rfc3339(), msg.into()));
        self.updated_at = Utc::now();
    }

    /// Terminal failure: record the cause and stop processing this task.
    pub fn fail(&mut self, cause: impl Into<String>) {
        self.note(cause);
        // Error is reachable from every non-terminal state, so this only
        // misses when the task already completed.
        if self.status.can_transition_to(TaskStatus::Error) {
            self.status = TaskStatus::Error;
            self.updated_at = Utc::now();
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The effective playable artifact: the repaired path when present,
    /// otherwise the primary output.
    pub fn effective_output(&self) -> Option<&str> {
        self.recovered_output
            .as_deref()
            .or(self.output.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(
            TaskId::from_string("task_t1"),
            TaskInputs {
                audio: Some("a.wav".into()),
                videos: vec![],
            },
        )
    }

    #[test]
    fn test_advance_enforces_order() {
        let mut t = task();
        t.advance(TaskStatus::Analyzing).unwrap();
        t.advance(TaskStatus::Planning).unwrap();
        let err = t.advance(TaskStatus::Pending).unwrap_err();
        assert_eq!(err.from, TaskStatus::Planning);
        assert_eq!(err.to, TaskStatus::Pending);
    }

    #[test]
    fn test_notes_are_append_only() {
        let mut t = task();
        t.note("first");
        t.note("second");
        assert_eq!(t.notes.len(), 2);
        assert!(t.notes[0].contains("first"));
        assert!(t.notes[1].contains("second"));
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut t = task();
        t.fail("analyzer exploded");
        assert_eq!(t.status, TaskStatus::Error);
        assert!(t.is_terminal());
        assert!(t.notes.last().unwrap().contains("analyzer exploded"));

        // Failing again keeps the status and only appends the note.
        t.fail("again");
        assert_eq!(t.status, TaskStatus::Error);
        assert_eq!(t.notes.len(), 2);
    }

    #[test]
    fn test_effective_output_prefers_recovered() {
        let mut t = task();
        assert!(t.effective_output().is_none());
        t.output = Some("out/render.mp4".into());
        assert_eq!(t.effective_output(), Some("out/render.mp4"));
        t.recovered_output = Some("out/recover.mp4".into());
        assert_eq!(t.effective_output(), Some("out/recover.mp4"));
    }

    #[test]
    fn test_descriptor_roundtrip_with_missing_fields() {
        // Descriptors created externally may carry only the inputs.
        let json = r#"{"id":"task_t9","inputs":{"audio":"a.wav"}}"#;
        let t: Task = serde_json::from_str(json).unwrap();
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.inputs.audio.as_deref(), Some("a.wav"));
        assert!(t.plan.is_none());
        assert_eq!(t.repair_attempts, 0);
    }

    #[test]
    fn test_descriptor_with_retired_fields_still_parses() {
        // Older descriptors carried an unrecoverable marker; unknown
        // fields must never break loading.
        let json = r#"{"id":"task_t9","status":"error","unrecoverable":true}"#;
        let t: Task = serde_json::from_str(json).unwrap();
        assert_eq!(t.status, TaskStatus::Error);
    }
}
