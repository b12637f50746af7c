//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration shared by the pipeline workers.
///
/// Every knob is env-overridable with a `BEATCUT_` prefix; the poll
/// interval and jitter are explicit so loop timing is never an implicit
/// constant buried in a sleep call.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the storage layout (tasks/, output/, previews/)
    pub root: PathBuf,
    /// Base poll interval between ticks
    pub poll_interval: Duration,
    /// Random jitter added to each tick to de-synchronize loops
    pub poll_jitter: Duration,
    /// Audio analyzer program; looked up in PATH
    pub analyzer_program: String,
    /// Scene-cut detection threshold
    pub scene_threshold: f64,
    /// Minimum artifact size for demo renders
    pub demo_min_bytes: u64,
    /// Minimum artifact size for fusion renders
    pub fusion_min_bytes: u64,
    /// Timeline block length in seconds
    pub block_seconds: f64,
    /// Cap on preview clips cut per task
    pub max_preview_scenes: usize,
    /// Number of mood-derived sample clips when a task has no videos
    pub sample_clip_count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
            poll_interval: Duration::from_secs(5),
            poll_jitter: Duration::from_millis(500),
            analyzer_program: "beatcut-analyze".to_string(),
            scene_threshold: 0.4,
            demo_min_bytes: 5_000,
            fusion_min_bytes: 20_000,
            block_seconds: 4.0,
            max_preview_scenes: 8,
            sample_clip_count: 4,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: std::env::var("BEATCUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            poll_interval: Duration::from_secs(
                env_parse("BEATCUT_POLL_SECS").unwrap_or(defaults.poll_interval.as_secs()),
            ),
            poll_jitter: Duration::from_millis(
                env_parse("BEATCUT_POLL_JITTER_MS")
                    .unwrap_or(defaults.poll_jitter.as_millis() as u64),
            ),
            analyzer_program: std::env::var("BEATCUT_ANALYZER")
                .unwrap_or(defaults.analyzer_program),
            scene_threshold: env_parse("BEATCUT_SCENE_THRESHOLD")
                .unwrap_or(defaults.scene_threshold),
            demo_min_bytes: env_parse("BEATCUT_DEMO_MIN_BYTES").unwrap_or(defaults.demo_min_bytes),
            fusion_min_bytes: env_parse("BEATCUT_FUSION_MIN_BYTES")
                .unwrap_or(defaults.fusion_min_bytes),
            block_seconds: env_parse("BEATCUT_BLOCK_SECONDS").unwrap_or(defaults.block_seconds),
            max_preview_scenes: env_parse("BEATCUT_MAX_PREVIEWS")
                .unwrap_or(defaults.max_preview_scenes),
            sample_clip_count: env_parse("BEATCUT_SAMPLE_CLIPS")
                .unwrap_or(defaults.sample_clip_count),
        }
    }

    /// Override the poll interval (binaries run on different cadences).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
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
        let config = WorkerConfig::default();
        assert_eq!(config.demo_min_bytes, 5_000);
        assert_eq!(config.fusion_min_bytes, 20_000);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
