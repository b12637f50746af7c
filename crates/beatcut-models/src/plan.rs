//! Scene intervals and the generated edit plan.

use serde::{Deserialize, Serialize};

/// One detected scene interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub start: f64,
    pub end: f64,
}

impl Scene {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// One timeline block of the edit plan. Immutable once rendering begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanBlock {
    /// Clip path this block plays
    pub clip: String,
    /// Timeline start in seconds
    pub start: f64,
    /// Timeline end in seconds
    pub end: f64,
    pub effect: String,
    pub transition: String,
    /// Mood-keyed overlay effect
    pub mood_fx: String,
    /// BPM the block is cut against
    pub beat_sync: u32,
}

/// Render mode, selects the verification size floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Quick synthetic render, small size floor
    #[default]
    Demo,
    /// Full concat render of real clips, larger floor
    Fusion,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Demo => "demo",
            RenderMode::Fusion => "fusion",
        }
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_duration() {
        assert_eq!(Scene::new(2.0, 6.5).duration(), 4.5);
        assert_eq!(Scene::new(3.0, 1.0).duration(), 0.0);
    }

    #[test]
    fn test_render_mode_default_is_demo() {
        assert_eq!(RenderMode::default(), RenderMode::Demo);
        let mode: RenderMode = serde_json::from_str("\"fusion\"").unwrap();
        assert_eq!(mode, RenderMode::Fusion);
    }
}
