//! Pipeline workers.
//!
//! Three cooperating loops share this crate: the orchestrator (advances
//! tasks stage by stage), the render supervisor (verification and
//! bounded repair) and the resume worker (crash-recovery sweeps). They
//! coordinate only through atomically written task descriptors.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod render_supervisor;
pub mod resume;
pub mod stages;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use orchestrator::PipelineOrchestrator;
pub use render_supervisor::{RenderSupervisor, Verdict};
pub use resume::ResumeWorker;
pub use stages::{Stage, StageRunner};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with colored output for dev, JSON for production.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("beatcut=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
