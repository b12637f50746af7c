//! The supervision loop.
//!
//! Each tick polls liveness of every worker, restarts crashed ones per
//! the backoff policy, and checks system pressure: above the threshold
//! the single heaviest worker is paused for a short fixed interval. On
//! shutdown every launched process group is terminated before exit.

use std::time::Instant;

use sysinfo::System;
use tracing::{error, info, warn};

use crate::config::SupervisorConfig;
use crate::error::SupervisorResult;
use crate::policy::{RestartDecision, WorkerSpec};
use crate::registry::{Liveness, WorkerRegistry};

/// Resolve a sibling binary next to the current executable, falling
/// back to PATH lookup.
fn sibling(name: &str) -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(name)))
        .filter(|p| p.exists())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// The standard worker set: the three pipeline loops plus the status
/// API, all under the configured restart policy.
pub fn default_workers(config: &SupervisorConfig) -> Vec<WorkerSpec> {
    let spec = |name: &str, program: &str| {
        let mut spec = WorkerSpec::new(name, sibling(program));
        spec.max_restarts = config.max_restarts;
        spec.cooldown = config.cooldown;
        spec
    };

    vec![
        spec("orchestrator", "beatcut-orchestrator"),
        spec("render-supervisor", "beatcut-render-supervisor"),
        spec("resume-worker", "beatcut-resume-worker"),
        spec("status-api", "beatcut-api"),
    ]
}

pub struct ProcessSupervisor {
    registry: WorkerRegistry,
    config: SupervisorConfig,
    system: System,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig, specs: Vec<WorkerSpec>) -> Self {
        let mut registry = WorkerRegistry::new();
        for spec in specs {
            registry.register(spec);
        }
        Self {
            registry,
            config,
            system: System::new(),
        }
    }

    /// Launch every registered worker.
    pub fn start_all(&mut self) {
        for name in self.registry.names() {
            if let Err(e) = self.registry.spawn(&name) {
                error!(worker = %name, "initial start failed: {e}");
            }
        }
    }

    /// Current CPU and RAM usage in percent.
    fn pressure(&mut self) -> (f32, f32) {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        let cpu = self.system.global_cpu_usage();
        let total = self.system.total_memory();
        let ram = if total == 0 {
            0.0
        } else {
            (self.system.used_memory() as f64 / total as f64 * 100.0) as f32
        };
        (cpu, ram)
    }

    /// One supervision pass.
    pub fn tick(&mut self) -> SupervisorResult<()> {
        let now = Instant::now();
        self.shed_load(now)?;

        for name in self.registry.names() {
            self.check_worker(&name, now)?;
        }
        Ok(())
    }

    /// Pause the heaviest worker while the system is overloaded.
    fn shed_load(&mut self, now: Instant) -> SupervisorResult<()> {
        let (cpu, ram) = self.pressure();
        if cpu <= self.config.pressure_threshold && ram <= self.config.pressure_threshold {
            return Ok(());
        }

        let heavy = self.config.heavy_worker.clone();
        let Ok(handle) = self.registry.handle_mut(&heavy) else {
            return Ok(());
        };
        if handle.paused_until.is_some() {
            return Ok(());
        }

        warn!(cpu, ram, worker = %heavy, "system overloaded, pausing heavy worker");
        handle.paused_until = Some(now + self.config.pause_duration);
        self.registry.terminate(&heavy)?;
        Ok(())
    }

    fn check_worker(&mut self, name: &str, now: Instant) -> SupervisorResult<()> {
        // A paused worker stays down until its hold elapses; the
        // restart below goes through the normal spawn path.
        let handle = self.registry.handle_mut(name)?;
        if let Some(until) = handle.paused_until {
            if now < until {
                return Ok(());
            }
            handle.paused_until = None;
            info!(worker = name, "pause elapsed, resuming worker");
            return self.registry.spawn(name);
        }

        match self.registry.liveness(name)? {
            Liveness::Running => Ok(()),
            Liveness::NotStarted => self.registry.spawn(name),
            Liveness::Exited(code) => {
                warn!(worker = name, ?code, "worker crashed");
                let handle = self.registry.handle_mut(name)?;
                let spec = handle.spec.clone();
                match handle.health.record_crash(now, &spec) {
                    RestartDecision::Restart => self.registry.spawn(name),
                    RestartDecision::Wait => {
                        warn!(worker = name, "crash budget exhausted, cooling down");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Run the supervision loop until ctrl-c, then terminate all
    /// process groups.
    pub async fn run(&mut self) -> SupervisorResult<()> {
        info!(
            tick_secs = self.config.tick_interval.as_secs(),
            workers = ?self.registry.names(),
            "process supervisor started"
        );
        self.start_all();

        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received, terminating workers");
                    self.registry.terminate_all();
                    return Ok(());
                }
                _ = interval.tick() => {}
            }
            if let Err(e) = self.tick() {
                error!("supervision tick failed: {e}");
            }
        }
    }
}
