//! Render verification and bounded repair.
//!
//! The render supervisor owns the tail of the pipeline: it judges the
//! rendered artifact by size floor, completes tasks that pass, and runs
//! at most one fallback render per verification cycle for tasks that do
//! not. It also audits completed tasks whose artifact later disappears
//! and repairs them the same way.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use beatcut_media::Renderer;
use beatcut_models::{RenderMode, Task, TaskStatus};
use beatcut_store::{TaskRef, TaskStore};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

/// Outcome of judging a rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    /// Artifact exists but is below the size floor for its render mode.
    LowQuality,
    /// No artifact path recorded, or the file is gone.
    Missing,
}

pub struct RenderSupervisor {
    store: TaskStore,
    renderer: Arc<dyn Renderer>,
    config: WorkerConfig,
}

impl RenderSupervisor {
    pub fn new(config: WorkerConfig, store: TaskStore, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            store,
            renderer,
            config,
        }
    }

    fn size_floor(&self, mode: RenderMode) -> u64 {
        match mode {
            RenderMode::Demo => self.config.demo_min_bytes,
            RenderMode::Fusion => self.config.fusion_min_bytes,
        }
    }

    /// Judge an artifact path against a size floor.
    fn judge(path: Option<&str>, floor: u64) -> Verdict {
        let Some(path) = path else {
            return Verdict::Missing;
        };
        match std::fs::metadata(Path::new(path)) {
            Ok(meta) if meta.len() >= floor => Verdict::Ok,
            Ok(_) => Verdict::LowQuality,
            Err(_) => Verdict::Missing,
        }
    }

    /// One polling pass over the task directory.
    pub async fn tick(&self) -> WorkerResult<usize> {
        let refs = self.store.list_tasks().await?;
        let mut handled = 0;

        for task_ref in &refs {
            match self.step_task(task_ref).await {
                Ok(true) => handled += 1,
                Ok(false) => {}
                Err(e) => warn!(task_id = %task_ref.id, "task skipped: {e}"),
            }
        }
        Ok(handled)
    }

    async fn step_task(&self, task_ref: &TaskRef) -> WorkerResult<bool> {
        let task = self.store.load(task_ref).await?;
        match task.status {
            TaskStatus::Verifying => self.verify(task).await.map(|_| true),
            TaskStatus::Completed => self.audit(task).await,
            // A task persisted mid-repair (crash) resumes its repair here.
            TaskStatus::Repairing => self.repair(task).await.map(|_| true),
            _ => Ok(false),
        }
    }

    /// Judge a freshly rendered task. Passing artifacts complete the
    /// task; anything else enters the single-attempt repair path.
    async fn verify(&self, mut task: Task) -> WorkerResult<()> {
        let verdict = Self::judge(task.output.as_deref(), self.size_floor(task.render_mode));
        info!(task_id = %task.id, mode = %task.render_mode, ?verdict, "artifact judged");

        match verdict {
            Verdict::Ok => {
                task.note("Verification passed");
                task.advance(TaskStatus::Completed)?;
                self.store.save(&task).await?;
                Ok(())
            }
            Verdict::LowQuality | Verdict::Missing => {
                task.note(format!("Verification failed: {verdict:?}"));
                task.advance(TaskStatus::Repairing)?;
                self.store.save(&task).await?;
                self.repair(task).await
            }
        }
    }

    /// Audit a completed task: if its playable artifact disappeared,
    /// re-enter repair. Returns whether the task needed action.
    async fn audit(&self, mut task: Task) -> WorkerResult<bool> {
        let present = task
            .effective_output()
            .map(|p| Path::new(p).exists())
            .unwrap_or(false);
        if present {
            return Ok(false);
        }

        warn!(task_id = %task.id, "completed artifact missing, repairing");
        task.note("Completed artifact missing; attempting repair");
        task.advance(TaskStatus::Repairing)?;
        self.store.save(&task).await?;
        self.repair(task).await?;
        Ok(true)
    }

    /// One fallback render attempt. Success completes the task with a
    /// `recovered_output`; failure is terminal.
    async fn repair(&self, mut task: Task) -> WorkerResult<()> {
        let recover = self.store.output_path(&task.id, "_recover.mp4");
        task.repair_attempts += 1;

        let rendered = self.renderer.fallback_render(&recover).await;
        // The fallback render is demo-grade material regardless of the
        // task's original mode, so it is judged against the demo floor.
        let verdict = match rendered {
            Ok(()) => Self::judge(recover.to_str(), self.config.demo_min_bytes),
            Err(e) => {
                error!(task_id = %task.id, "fallback render failed: {e}");
                Verdict::Missing
            }
        };

        match verdict {
            Verdict::Ok => {
                task.recovered_output = Some(recover.to_string_lossy().into_owned());
                task.note(format!("Repair succeeded: {}", recover.display()));
                task.advance(TaskStatus::Completed)?;
            }
            Verdict::LowQuality | Verdict::Missing => {
                task.fail(format!(
                    "Repair attempt {} failed: {verdict:?}",
                    task.repair_attempts
                ));
            }
        }
        self.store.save(&task).await?;
        Ok(())
    }

    /// Run the polling loop until ctrl-c.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            root = %self.config.root.display(),
            interval_secs = self.config.poll_interval.as_secs(),
            "render supervisor started"
        );
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }
            if let Err(e) = self.tick().await {
                error!("tick failed: {e}");
            }
        }
    }
}
