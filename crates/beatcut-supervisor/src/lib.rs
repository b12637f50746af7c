//! Worker process supervision.
//!
//! Launches the pipeline workers as independent processes, restarts
//! crashed ones with a bounded backoff, and sheds load by pausing the
//! heaviest worker when the system is under pressure.

pub mod config;
pub mod error;
pub mod policy;
pub mod registry;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use error::{SupervisorError, SupervisorResult};
pub use policy::{HealthRecord, RestartDecision, WorkerSpec};
pub use registry::{Liveness, WorkerRegistry};
pub use supervisor::{default_workers, ProcessSupervisor};
