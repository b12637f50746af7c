//! Registry of supervised worker processes.
//!
//! Owns every spawned child handle, keyed by worker name. Workers run in
//! their own process group so termination reaches their descendants; the
//! registry is the only place signals are sent from.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::error::{SupervisorError, SupervisorResult};
use crate::policy::{HealthRecord, WorkerSpec};

/// Observed process state at poll time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Running,
    Exited(Option<i32>),
    NotStarted,
}

pub struct WorkerHandle {
    pub spec: WorkerSpec,
    pub health: HealthRecord,
    /// Load shedding hold; the worker is not restarted before this.
    pub paused_until: Option<Instant>,
    child: Option<Child>,
}

pub struct WorkerRegistry {
    workers: HashMap<String, WorkerHandle>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    pub fn register(&mut self, spec: WorkerSpec) {
        let name = spec.name.clone();
        self.workers.insert(
            name,
            WorkerHandle {
                spec,
                health: HealthRecord::new(Instant::now()),
                paused_until: None,
                child: None,
            },
        );
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.workers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn handle_mut(&mut self, name: &str) -> SupervisorResult<&mut WorkerHandle> {
        self.workers
            .get_mut(name)
            .ok_or_else(|| SupervisorError::UnknownWorker(name.to_string()))
    }

    /// Spawn a worker in its own process group. A still-running worker
    /// is left alone.
    pub fn spawn(&mut self, name: &str) -> SupervisorResult<()> {
        let handle = self.handle_mut(name)?;
        if matches!(handle.liveness(), Liveness::Running) {
            return Ok(());
        }

        let mut command = Command::new(&handle.spec.program);
        command
            .args(&handle.spec.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| SupervisorError::spawn(name, e))?;

        info!(worker = name, pid = child.id(), "worker started");
        handle.child = Some(child);
        handle.health.record_start(Instant::now());
        Ok(())
    }

    /// Poll a worker's liveness without blocking.
    pub fn liveness(&mut self, name: &str) -> SupervisorResult<Liveness> {
        Ok(self.handle_mut(name)?.liveness())
    }

    /// Terminate a worker's whole process group.
    pub fn terminate(&mut self, name: &str) -> SupervisorResult<()> {
        let handle = self.handle_mut(name)?;
        let Some(child) = handle.child.as_mut() else {
            return Ok(());
        };

        if let Some(pid) = child.id() {
            info!(worker = name, pid, "terminating worker");
            #[cfg(unix)]
            {
                use nix::sys::signal::{killpg, Signal};
                use nix::unistd::Pid;
                if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    warn!(worker = name, "killpg failed, killing child directly: {e}");
                    let _ = child.start_kill();
                }
            }
            #[cfg(not(unix))]
            {
                let _ = child.start_kill();
            }
        }
        handle.child = None;
        Ok(())
    }

    /// Terminate every launched worker. Used on shutdown so no process
    /// group outlives the supervisor.
    pub fn terminate_all(&mut self) {
        for name in self.names() {
            if let Err(e) = self.terminate(&name) {
                warn!(worker = %name, "termination failed: {e}");
            }
        }
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerHandle {
    fn liveness(&mut self) -> Liveness {
        let Some(child) = self.child.as_mut() else {
            return Liveness::NotStarted;
        };
        match child.try_wait() {
            Ok(None) => Liveness::Running,
            Ok(Some(status)) => Liveness::Exited(status.code()),
            Err(_) => Liveness::Exited(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_and_terminate() {
        let mut registry = WorkerRegistry::new();
        registry.register(WorkerSpec::new("sleeper", "sleep").with_args(["30"]));

        registry.spawn("sleeper").unwrap();
        assert_eq!(registry.liveness("sleeper").unwrap(), Liveness::Running);

        // Spawning again while running is a no-op.
        registry.spawn("sleeper").unwrap();

        registry.terminate("sleeper").unwrap();
        assert_eq!(registry.liveness("sleeper").unwrap(), Liveness::NotStarted);
    }

    #[tokio::test]
    async fn test_exited_worker_reported() {
        let mut registry = WorkerRegistry::new();
        registry.register(WorkerSpec::new("brief", "true"));

        registry.spawn("brief").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(registry.liveness("brief").unwrap(), Liveness::Exited(Some(0)));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let mut registry = WorkerRegistry::new();
        registry.register(WorkerSpec::new("ghost", "/nonexistent/worker"));

        let err = registry.spawn("ghost").unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_unknown_worker_rejected() {
        let mut registry = WorkerRegistry::new();
        assert!(matches!(
            registry.spawn("nobody").unwrap_err(),
            SupervisorError::UnknownWorker(_)
        ));
    }
}
