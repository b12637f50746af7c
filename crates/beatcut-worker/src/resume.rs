//! Crash-recovery sweeps over the task directory.
//!
//! The resume worker makes interrupted work resumable without redoing
//! it: corrupt descriptors get one sanitization attempt, missing plan
//! sidecars are rewritten from the descriptor, and tasks that lost their
//! rendered artifact get a deterministic resume artifact. Every repair is
//! additive. Status never regresses, fields are never cleared, and a
//! descriptor that stays unreadable is skipped in memory rather than
//! deleted.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use beatcut_media::Renderer;
use beatcut_models::{Task, TaskId, TaskStatus};
use beatcut_store::{StoreError, TaskRef, TaskStore};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

pub struct ResumeWorker {
    store: TaskStore,
    renderer: Arc<dyn Renderer>,
    config: WorkerConfig,
    /// Descriptors that failed parsing even after sanitization. Tracked
    /// in memory only; the files stay on disk for inspection.
    unrecoverable: HashSet<TaskId>,
}

impl ResumeWorker {
    pub fn new(config: WorkerConfig, store: TaskStore, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            store,
            renderer,
            config,
            unrecoverable: HashSet::new(),
        }
    }

    /// One sweep over every descriptor. Returns the number repaired.
    pub async fn sweep(&mut self) -> WorkerResult<usize> {
        let refs = self.store.list_tasks().await?;
        let mut repaired = 0;

        for task_ref in &refs {
            if self.unrecoverable.contains(&task_ref.id) {
                continue;
            }
            match self.resume_task(task_ref).await {
                Ok(true) => repaired += 1,
                Ok(false) => {}
                Err(e) if e.is_corrupt() => {
                    warn!(task_id = %task_ref.id, "descriptor unrecoverable, skipping: {e}");
                    self.unrecoverable.insert(task_ref.id.clone());
                }
                Err(e) => warn!(task_id = %task_ref.id, "resume check failed: {e}"),
            }
        }
        Ok(repaired)
    }

    /// Inspect one task and apply whatever additive repairs it needs.
    /// Returns whether anything was repaired.
    async fn resume_task(&self, task_ref: &TaskRef) -> Result<bool, StoreError> {
        let mut task = self.store.load_sanitized(task_ref).await?;
        let mut dirty = false;

        if self.restore_plan(&mut task).await? {
            dirty = true;
        }
        if self.restore_output(&mut task).await? {
            dirty = true;
        }

        if dirty {
            self.store.save(&task).await?;
            info!(task_id = %task.id, status = %task.status, "task repaired");
        }
        Ok(dirty)
    }

    /// Restore the edit plan for tasks past the planning stage.
    ///
    /// A descriptor that lost its plan gets it regenerated from the clip
    /// list (plan building is deterministic per task id, so this
    /// reproduces the original blocks); a descriptor that kept its plan
    /// but lost the sidecar gets the sidecar rewritten.
    async fn restore_plan(&self, task: &mut Task) -> Result<bool, StoreError> {
        if !matches!(
            task.status,
            TaskStatus::Rendering
                | TaskStatus::Verifying
                | TaskStatus::Repairing
                | TaskStatus::Completed
        ) {
            return Ok(false);
        }

        let sidecar = self.store.plan_sidecar_path(&task.id);
        let plan = match &task.plan {
            Some(plan) => {
                if sidecar.exists() {
                    return Ok(false);
                }
                let plan = plan.clone();
                task.note("Plan sidecar restored from descriptor");
                plan
            }
            None if !task.clips.is_empty() => {
                let plan = crate::stages::build_plan(&self.config, task);
                task.note(format!("Plan regenerated: {} blocks", plan.len()));
                task.plan = Some(plan.clone());
                plan
            }
            None => return Ok(false),
        };

        self.store.write_sidecar(&sidecar, &plan).await?;
        task.plan_path = Some(sidecar.to_string_lossy().into_owned());
        Ok(true)
    }

    /// Restore the rendered artifact for tasks past the render stage.
    ///
    /// A task that never recorded an output gets one at the resume path;
    /// a task whose recorded output vanished keeps it for audit history
    /// and gets a `recovered_output` instead.
    async fn restore_output(&self, task: &mut Task) -> Result<bool, StoreError> {
        if !matches!(
            task.status,
            TaskStatus::Verifying | TaskStatus::Repairing | TaskStatus::Completed
        ) {
            return Ok(false);
        }

        let resume = self.store.output_path(&task.id, "_resume.mp4");
        match &task.output {
            None => {
                if let Err(e) = self.renderer.fallback_render(&resume).await {
                    warn!(task_id = %task.id, "resume render failed: {e}");
                    return Ok(false);
                }
                task.output = Some(resume.to_string_lossy().into_owned());
                task.note(format!("Resume artifact created: {}", resume.display()));
                Ok(true)
            }
            Some(output) if !Path::new(output).exists() => {
                // A recovered artifact that still exists needs no action.
                if task
                    .recovered_output
                    .as_deref()
                    .map(|p| Path::new(p).exists())
                    .unwrap_or(false)
                {
                    return Ok(false);
                }
                if let Err(e) = self.renderer.fallback_render(&resume).await {
                    warn!(task_id = %task.id, "resume render failed: {e}");
                    return Ok(false);
                }
                task.recovered_output = Some(resume.to_string_lossy().into_owned());
                task.note(format!("Lost artifact replaced: {}", resume.display()));
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// Run the sweep loop until ctrl-c.
    pub async fn run(&mut self) -> WorkerResult<()> {
        info!(
            root = %self.config.root.display(),
            interval_secs = self.config.poll_interval.as_secs(),
            "resume worker started"
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
            match self.sweep().await {
                Ok(0) => {}
                Ok(n) => info!(repaired = n, "sweep done"),
                Err(e) => warn!("sweep failed: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::StubRenderer;
    use beatcut_models::{PlanBlock, TaskInputs};
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn setup(renderer: StubRenderer) -> (TempDir, Arc<StubRenderer>, ResumeWorker) {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let config = WorkerConfig {
            root: dir.path().to_path_buf(),
            ..WorkerConfig::default()
        };
        let renderer = Arc::new(renderer);
        let worker = ResumeWorker::new(config, store, renderer.clone());
        (dir, renderer, worker)
    }

    fn block(clip: &str) -> PlanBlock {
        PlanBlock {
            clip: clip.to_string(),
            start: 0.0,
            end: 4.0,
            effect: "soft_glow".into(),
            transition: "cross_flash".into(),
            mood_fx: "light_sweep".into(),
            beat_sync: 120,
        }
    }

    async fn seed(worker: &ResumeWorker, id: &str, status: TaskStatus) -> TaskRef {
        let mut task = Task::new(TaskId::from_string(id), TaskInputs::default());
        task.status = status;
        worker.store.save(&task).await.unwrap();
        worker
            .store
            .list_tasks()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.id.as_str() == id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_healthy_tasks_untouched() {
        let (_dir, renderer, mut worker) = setup(StubRenderer::writing(6_000));
        seed(&worker, "task_a", TaskStatus::Pending).await;
        seed(&worker, "task_b", TaskStatus::Error).await;

        assert_eq!(worker.sweep().await.unwrap(), 0);
        assert_eq!(renderer.fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_plan_sidecar_restored() {
        let (_dir, _renderer, mut worker) = setup(StubRenderer::writing(6_000));
        let r = seed(&worker, "task_a", TaskStatus::Rendering).await;
        let mut task = worker.store.load(&r).await.unwrap();
        task.plan = Some(vec![block("c1.mp4")]);
        worker.store.save(&task).await.unwrap();

        assert_eq!(worker.sweep().await.unwrap(), 1);
        let task = worker.store.load(&r).await.unwrap();
        let sidecar = worker.store.plan_sidecar_path(&task.id);
        assert!(sidecar.exists());
        assert_eq!(task.plan_path.as_deref(), Some(sidecar.to_str().unwrap()));

        // Second sweep finds nothing left to do.
        assert_eq!(worker.sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lost_plan_regenerated_from_clips() {
        let (_dir, _renderer, mut worker) = setup(StubRenderer::writing(6_000));
        let r = seed(&worker, "task_a", TaskStatus::Rendering).await;
        let mut task = worker.store.load(&r).await.unwrap();
        task.clips = vec!["c1.mp4".into(), "c2.mp4".into()];
        worker.store.save(&task).await.unwrap();

        assert_eq!(worker.sweep().await.unwrap(), 1);
        let task = worker.store.load(&r).await.unwrap();
        let plan = task.plan.as_ref().unwrap();
        assert_eq!(plan.len(), 2);
        // Regeneration is deterministic: it matches a fresh build.
        assert_eq!(*plan, crate::stages::build_plan(&worker.config, &task));
        assert!(worker.store.plan_sidecar_path(&task.id).exists());
    }

    #[tokio::test]
    async fn test_verifying_task_without_output_gets_resume_artifact() {
        let (_dir, renderer, mut worker) = setup(StubRenderer::writing(6_000));
        let r = seed(&worker, "task_a", TaskStatus::Verifying).await;

        assert_eq!(worker.sweep().await.unwrap(), 1);
        let task = worker.store.load(&r).await.unwrap();
        assert!(task.output.as_deref().unwrap().ends_with("task_a_resume.mp4"));
        assert_eq!(task.status, TaskStatus::Verifying);
        assert_eq!(renderer.fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lost_artifact_replaced_additively() {
        let (_dir, _renderer, mut worker) = setup(StubRenderer::writing(6_000));
        let r = seed(&worker, "task_a", TaskStatus::Completed).await;
        let mut task = worker.store.load(&r).await.unwrap();
        task.output = Some(
            worker
                .store
                .output_path(&task.id, "_render.mp4")
                .to_string_lossy()
                .into_owned(),
        );
        worker.store.save(&task).await.unwrap();

        assert_eq!(worker.sweep().await.unwrap(), 1);
        let task = worker.store.load(&r).await.unwrap();
        // The original path is kept; only recovered_output is added.
        assert!(task.output.unwrap().ends_with("task_a_render.mp4"));
        assert!(task
            .recovered_output
            .unwrap()
            .ends_with("task_a_resume.mp4"));
    }

    #[tokio::test]
    async fn test_pending_task_never_gets_artifact() {
        let (_dir, renderer, mut worker) = setup(StubRenderer::writing(6_000));
        seed(&worker, "task_a", TaskStatus::Pending).await;

        worker.sweep().await.unwrap();
        assert_eq!(renderer.fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_control_byte_corruption_sanitized() {
        let (_dir, _renderer, mut worker) = setup(StubRenderer::writing(6_000));
        let dirty = "{\"id\": \"task_dirty\",\u{0000} \"status\": \"planning\"}";
        std::fs::write(worker.store.tasks_dir().join("task_dirty.json"), dirty).unwrap();

        // Sanitization rewrites the descriptor; no other repair applies,
        // so the sweep reports nothing repaired but the file now parses.
        worker.sweep().await.unwrap();
        let refs = worker.store.list_tasks().await.unwrap();
        let task = worker.store.load(&refs[0]).await.unwrap();
        assert_eq!(task.status, TaskStatus::Planning);
        assert!(worker.unrecoverable.is_empty());
    }

    #[tokio::test]
    async fn test_unrecoverable_descriptor_skipped_not_deleted() {
        let (_dir, _renderer, mut worker) = setup(StubRenderer::writing(6_000));
        let path = worker.store.tasks_dir().join("task_bad.json");
        let content = b"{\"id\": \"task_b\x00ad".to_vec();
        std::fs::write(&path, &content).unwrap();

        worker.sweep().await.unwrap();
        assert_eq!(worker.unrecoverable.len(), 1);
        assert_eq!(std::fs::read(&path).unwrap(), content);

        // Later sweeps skip it without touching the file again.
        worker.sweep().await.unwrap();
        assert_eq!(worker.unrecoverable.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_resume_render_leaves_descriptor_untouched() {
        let (_dir, _renderer, mut worker) = setup(StubRenderer::broken());
        let r = seed(&worker, "task_a", TaskStatus::Verifying).await;

        assert_eq!(worker.sweep().await.unwrap(), 0);
        let task = worker.store.load(&r).await.unwrap();
        assert!(task.output.is_none());
        assert!(task.notes.is_empty());
    }
}
