//! The pipeline orchestrator loop.
//!
//! Polls the task directory, advances each non-terminal task by exactly
//! one stage per tick, and persists atomically before the task is
//! considered handled. A stage failure is terminal for the task, never
//! for the loop; a persistence failure leaves the descriptor at its
//! prior state so the next tick retries.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};

use beatcut_media::{AudioAnalyzer, Renderer};
use beatcut_store::{TaskRef, TaskStore};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::stages::{Stage, StageRunner};

pub struct PipelineOrchestrator {
    store: TaskStore,
    runner: StageRunner,
    config: WorkerConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        config: WorkerConfig,
        store: TaskStore,
        analyzer: Arc<dyn AudioAnalyzer>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let runner = StageRunner::new(config.clone(), store.clone(), analyzer, renderer);
        Self {
            store,
            runner,
            config,
        }
    }

    /// One polling pass: advance every actionable task by one stage.
    /// Returns the number of tasks that made progress.
    pub async fn tick(&self) -> WorkerResult<usize> {
        let refs = self.store.list_tasks().await?;
        let mut progressed = 0;

        for task_ref in &refs {
            match self.step_task(task_ref).await {
                Ok(true) => progressed += 1,
                Ok(false) => {}
                Err(e) => {
                    // Corrupt or unreadable descriptors are skipped; the
                    // resume worker owns their recovery.
                    warn!(task_id = %task_ref.id, "task skipped: {e}");
                }
            }
        }
        Ok(progressed)
    }

    /// Advance one task by one stage. Returns whether it progressed.
    async fn step_task(&self, task_ref: &TaskRef) -> WorkerResult<bool> {
        let task = self.store.load(task_ref).await?;

        let Some((stage, next_status)) = Stage::for_status(task.status) else {
            return Ok(false);
        };

        info!(task_id = %task.id, status = %task.status, stage = %stage, "running stage");

        match self.runner.run(stage, task).await {
            Ok(mut task) => {
                task.advance(next_status)?;
                // Persist before reporting progress; a failed save leaves
                // the prior descriptor so the stage re-runs next tick.
                self.store.save(&task).await?;
                Ok(true)
            }
            Err(e) if e.is_persistence() => Err(e),
            Err(e) => {
                error!(task_id = %task_ref.id, stage = %stage, "stage failed: {e}");
                let mut task = self.store.load(task_ref).await?;
                task.fail(format!("Stage {stage} failed: {e}"));
                self.store.save(&task).await?;
                Ok(true)
            }
        }
    }

    /// Run the polling loop until ctrl-c.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            root = %self.config.root.display(),
            interval_secs = self.config.poll_interval.as_secs(),
            "orchestrator started"
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.sleep_duration()) => {}
            }

            match self.tick().await {
                Ok(0) => {}
                Ok(n) => info!(progressed = n, "tick done"),
                Err(e) => error!("tick failed: {e}"),
            }
        }
    }

    fn sleep_duration(&self) -> Duration {
        let jitter_ms = self.config.poll_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_ms)
        };
        self.config.poll_interval + Duration::from_millis(jitter)
    }
}
