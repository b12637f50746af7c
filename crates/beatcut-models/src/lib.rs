//! Shared data models for the beatcut pipeline.
//!
//! Everything that crosses a process boundary lives here: the task
//! descriptor and its status machine, the audio analysis result, and the
//! edit plan. Workers communicate exclusively through these types
//! persisted as JSON descriptors; none of them holds process state.

mod analysis;
mod plan;
mod status;
mod task;

pub use analysis::{AudioAnalysis, EditStyle, Mood, SubMood};
pub use plan::{PlanBlock, RenderMode, Scene};
pub use status::TaskStatus;
pub use task::{Task, TaskId, TaskInputs, TransitionError};
