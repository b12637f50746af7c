//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline position of a task.
///
/// Statuses only move forward in pipeline order, with one permitted
/// lateral loop: `verifying -> repairing -> completed|error`. A completed
/// task may also re-enter `repairing` when its artifact disappears after
/// the fact (post-completion audit repair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Descriptor exists but no stage has run yet
    #[default]
    Pending,
    /// Audio analysis has run (or is running)
    Analyzing,
    /// Scene selection done, plan generation next
    Planning,
    /// Plan exists, render next
    Rendering,
    /// Render recorded, awaiting verification
    Verifying,
    /// Verification failed, bounded repair in flight
    Repairing,
    /// Output verified
    Completed,
    /// Terminal failure
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Analyzing => "analyzing",
            TaskStatus::Planning => "planning",
            TaskStatus::Rendering => "rendering",
            TaskStatus::Verifying => "verifying",
            TaskStatus::Repairing => "repairing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    /// Position in pipeline order, used to enforce monotonic progression.
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Analyzing => 1,
            TaskStatus::Planning => 2,
            TaskStatus::Rendering => 3,
            TaskStatus::Verifying => 4,
            TaskStatus::Repairing => 5,
            TaskStatus::Completed => 6,
            TaskStatus::Error => 7,
        }
    }

    /// No further stage work is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }

    /// Whether a transition to `next` is permitted.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if *self == next {
            return false;
        }
        match (*self, next) {
            // Post-completion audit repair is the only backward move.
            (TaskStatus::Completed, TaskStatus::Repairing) => true,
            (TaskStatus::Repairing, TaskStatus::Completed | TaskStatus::Error) => true,
            // Error is a sink reachable from any non-terminal state.
            (s, TaskStatus::Error) => !s.is_terminal(),
            (s, n) => !s.is_terminal() && n.rank() > s.rank(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_progression_allowed() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Analyzing));
        assert!(TaskStatus::Analyzing.can_transition_to(TaskStatus::Planning));
        assert!(TaskStatus::Planning.can_transition_to(TaskStatus::Rendering));
        assert!(TaskStatus::Rendering.can_transition_to(TaskStatus::Verifying));
        assert!(TaskStatus::Verifying.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_backward_moves_rejected() {
        assert!(!TaskStatus::Rendering.can_transition_to(TaskStatus::Analyzing));
        assert!(!TaskStatus::Verifying.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Rendering));
    }

    #[test]
    fn test_repair_loop() {
        assert!(TaskStatus::Verifying.can_transition_to(TaskStatus::Repairing));
        assert!(TaskStatus::Repairing.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Repairing.can_transition_to(TaskStatus::Error));
        // Audit path for artifacts that vanish after completion.
        assert!(TaskStatus::Completed.can_transition_to(TaskStatus::Repairing));
    }

    #[test]
    fn test_terminal_states_are_sinks() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(!TaskStatus::Error.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Error.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Error));
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&TaskStatus::Analyzing).unwrap();
        assert_eq!(json, "\"analyzing\"");
        let status: TaskStatus = serde_json::from_str("\"repairing\"").unwrap();
        assert_eq!(status, TaskStatus::Repairing);
    }
}
