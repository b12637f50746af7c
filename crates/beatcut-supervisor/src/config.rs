//! Supervisor configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Interval between supervision passes
    pub tick_interval: Duration,
    /// CPU/RAM percentage above which load shedding kicks in
    pub pressure_threshold: f32,
    /// How long the heaviest worker stays paused when shedding
    pub pause_duration: Duration,
    /// Name of the worker paused under pressure
    pub heavy_worker: String,
    /// Crashes tolerated per cooldown window
    pub max_restarts: u32,
    /// Restart-suspension window for crash-looping workers
    pub cooldown: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            pressure_threshold: 92.0,
            pause_duration: Duration::from_secs(5),
            heavy_worker: "render-supervisor".to_string(),
            max_restarts: 3,
            cooldown: Duration::from_secs(20),
        }
    }
}

impl SupervisorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tick_interval: Duration::from_secs(
                env_parse("BEATCUT_SUP_TICK_SECS").unwrap_or(defaults.tick_interval.as_secs()),
            ),
            pressure_threshold: env_parse("BEATCUT_SUP_PRESSURE_PCT")
                .unwrap_or(defaults.pressure_threshold),
            pause_duration: Duration::from_secs(
                env_parse("BEATCUT_SUP_PAUSE_SECS").unwrap_or(defaults.pause_duration.as_secs()),
            ),
            heavy_worker: std::env::var("BEATCUT_SUP_HEAVY_WORKER")
                .unwrap_or(defaults.heavy_worker),
            max_restarts: env_parse("BEATCUT_SUP_MAX_RESTARTS").unwrap_or(defaults.max_restarts),
            cooldown: Duration::from_secs(
                env_parse("BEATCUT_SUP_COOLDOWN_SECS").unwrap_or(defaults.cooldown.as_secs()),
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.pressure_threshold, 92.0);
        assert_eq!(config.max_restarts, 3);
        assert_eq!(config.cooldown, Duration::from_secs(20));
    }
}
