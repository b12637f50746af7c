//! Restart policy: crash counting, cooldown, counter reset.
//!
//! The policy is pure state over `Instant`s so it can be exercised
//! without spawning processes. The lifecycle per worker is
//! stopped -> running -> crashed -> (cooldown) -> running.

use std::time::{Duration, Instant};

/// Descriptor of a supervised process.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    /// Crashes tolerated inside one cooldown window before restarts
    /// are suspended
    pub max_restarts: u32,
    /// Length of the restart-suspension window; doubles as the survival
    /// span after which the crash counter resets
    pub cooldown: Duration,
}

impl WorkerSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            max_restarts: 3,
            cooldown: Duration::from_secs(20),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// What to do about a crashed worker right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart,
    /// Crash budget exhausted; hold until the cooldown elapses.
    Wait,
}

/// Per-worker crash accounting. Mutated only by the supervisor loop.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub restart_count: u32,
    pub last_start: Instant,
    pub cooldown_until: Option<Instant>,
}

impl HealthRecord {
    pub fn new(now: Instant) -> Self {
        Self {
            restart_count: 0,
            last_start: now,
            cooldown_until: None,
        }
    }

    pub fn record_start(&mut self, now: Instant) {
        self.last_start = now;
    }

    /// Account for a crash observed at `now` and decide whether the
    /// worker may restart. Called again on subsequent ticks while the
    /// worker stays down, so an elapsed cooldown resolves to `Restart`
    /// with a fresh counter.
    pub fn record_crash(&mut self, now: Instant, spec: &WorkerSpec) -> RestartDecision {
        if let Some(until) = self.cooldown_until {
            if now < until {
                return RestartDecision::Wait;
            }
            self.cooldown_until = None;
            self.restart_count = 0;
        }

        // A worker that ran longer than the window before crashing has
        // earned a fresh budget.
        if now.duration_since(self.last_start) >= spec.cooldown {
            self.restart_count = 0;
        }

        self.restart_count += 1;
        if self.restart_count >= spec.max_restarts {
            self.cooldown_until = Some(now + spec.cooldown);
            return RestartDecision::Wait;
        }
        RestartDecision::Restart
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> WorkerSpec {
        WorkerSpec::new("w", "true")
    }

    #[test]
    fn test_early_crashes_restart_immediately() {
        let now = Instant::now();
        let mut health = HealthRecord::new(now);

        assert_eq!(health.record_crash(now, &spec()), RestartDecision::Restart);
        assert_eq!(health.record_crash(now, &spec()), RestartDecision::Restart);
        assert_eq!(health.restart_count, 2);
    }

    #[test]
    fn test_third_crash_in_window_suspends() {
        let now = Instant::now();
        let mut health = HealthRecord::new(now);

        health.record_crash(now, &spec());
        health.record_crash(now, &spec());
        assert_eq!(health.record_crash(now, &spec()), RestartDecision::Wait);
        assert!(health.cooldown_until.is_some());

        // Still inside the cooldown: keep waiting.
        let later = now + Duration::from_secs(5);
        assert_eq!(health.record_crash(later, &spec()), RestartDecision::Wait);
    }

    #[test]
    fn test_cooldown_elapse_resets_counter() {
        let now = Instant::now();
        let mut health = HealthRecord::new(now);
        for _ in 0..3 {
            health.record_crash(now, &spec());
        }

        let after = now + Duration::from_secs(21);
        assert_eq!(health.record_crash(after, &spec()), RestartDecision::Restart);
        assert_eq!(health.restart_count, 1);
        assert!(health.cooldown_until.is_none());
    }

    #[test]
    fn test_long_survival_resets_counter() {
        let now = Instant::now();
        let mut health = HealthRecord::new(now);
        health.record_crash(now, &spec());
        health.record_crash(now, &spec());

        // Restarted and ran past the window before the next crash.
        let start = now + Duration::from_secs(1);
        health.record_start(start);
        let crash = start + Duration::from_secs(25);
        assert_eq!(health.record_crash(crash, &spec()), RestartDecision::Restart);
        assert_eq!(health.restart_count, 1);
    }
}
