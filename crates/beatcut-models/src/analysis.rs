//! Audio analysis result written by the analyze stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall mood detected from the audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Aggressive,
    Epic,
    Sad,
    Romantic,
    #[default]
    Cinematic,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Aggressive => "aggressive",
            Mood::Epic => "epic",
            Mood::Sad => "sad",
            Mood::Romantic => "romantic",
            Mood::Cinematic => "cinematic",
        }
    }

    /// Heuristic mood from tempo, loudness and average energy.
    pub fn from_metrics(bpm: u32, volume: f64, energy: f64) -> Self {
        let intense = bpm > 145 || energy > 0.12;
        let soft = bpm < 95 && volume < -17.0;

        if intense {
            Mood::Aggressive
        } else if bpm > 130 {
            Mood::Epic
        } else if soft {
            Mood::Sad
        } else if (100..=125).contains(&bpm) {
            Mood::Romantic
        } else {
            Mood::Cinematic
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Secondary mood layer, refines the effect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubMood {
    Impact,
    Emotional,
    Hype,
    Flow,
}

impl SubMood {
    pub fn from_metrics(bpm: u32, energy: f64) -> Self {
        if bpm > 160 {
            SubMood::Impact
        } else if bpm < 85 {
            SubMood::Emotional
        } else if energy > 0.10 {
            SubMood::Hype
        } else {
            SubMood::Flow
        }
    }
}

/// Editing style the plan generator keys off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStyle {
    Velocity,
    Impact,
    EmotionalSync,
    SmoothFlow,
    CinematicGlow,
}

impl EditStyle {
    pub fn for_mood(mood: Mood) -> Self {
        match mood {
            Mood::Aggressive => EditStyle::Velocity,
            Mood::Epic => EditStyle::Impact,
            Mood::Sad => EditStyle::EmotionalSync,
            Mood::Romantic => EditStyle::SmoothFlow,
            Mood::Cinematic => EditStyle::CinematicGlow,
        }
    }
}

/// Result of the audio analysis stage. Written once, read-only thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    /// Estimated beats per minute, clamped to 60..=200 by the analyzer
    pub bpm: u32,
    pub mood: Mood,
    /// Mean absolute sample amplitude, 0.0..1.0
    #[serde(default)]
    pub energy: f64,
    /// Track duration in seconds
    #[serde(default)]
    pub duration: f64,
    /// Mean volume in dB
    #[serde(default)]
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_mood: Option<SubMood>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_style: Option<EditStyle>,
    /// Set to "fallback_mode" when the analyzer collaborator was
    /// unavailable and a deterministic default was substituted. Kept under
    /// the original descriptor key so downstream readers can tell genuine
    /// from fallback results.
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl AudioAnalysis {
    /// Deterministic default used when the analyzer is unavailable.
    pub fn fallback() -> Self {
        let mood = Mood::Cinematic;
        Self {
            bpm: 120,
            mood,
            energy: 0.0,
            duration: 0.0,
            volume: -20.0,
            sub_mood: Some(SubMood::from_metrics(120, 0.0)),
            edit_style: Some(EditStyle::for_mood(mood)),
            fallback: Some("fallback_mode".to_string()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Fill the derived classification fields from the base metrics.
    pub fn with_derived(mut self) -> Self {
        self.sub_mood = Some(SubMood::from_metrics(self.bpm, self.energy));
        self.edit_style = Some(EditStyle::for_mood(self.mood));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mood_from_metrics() {
        assert_eq!(Mood::from_metrics(170, -10.0, 0.2), Mood::Aggressive);
        assert_eq!(Mood::from_metrics(140, -10.0, 0.05), Mood::Epic);
        assert_eq!(Mood::from_metrics(80, -25.0, 0.01), Mood::Sad);
        assert_eq!(Mood::from_metrics(110, -10.0, 0.05), Mood::Romantic);
        assert_eq!(Mood::from_metrics(96, -10.0, 0.05), Mood::Cinematic);
    }

    #[test]
    fn test_sub_mood_thresholds() {
        assert_eq!(SubMood::from_metrics(170, 0.0), SubMood::Impact);
        assert_eq!(SubMood::from_metrics(80, 0.0), SubMood::Emotional);
        assert_eq!(SubMood::from_metrics(120, 0.2), SubMood::Hype);
        assert_eq!(SubMood::from_metrics(120, 0.01), SubMood::Flow);
    }

    #[test]
    fn test_fallback_marker_on_wire() {
        let analysis = AudioAnalysis::fallback();
        assert!(analysis.is_fallback());

        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["error"], "fallback_mode");
        assert_eq!(json["bpm"], 120);
        assert_eq!(json["mood"], "cinematic");
    }

    #[test]
    fn test_genuine_result_has_no_marker() {
        let analysis = AudioAnalysis {
            bpm: 140,
            mood: Mood::Epic,
            energy: 0.08,
            duration: 182.5,
            volume: -9.3,
            sub_mood: None,
            edit_style: None,
            fallback: None,
        }
        .with_derived();

        assert!(!analysis.is_fallback());
        assert_eq!(analysis.edit_style, Some(EditStyle::Impact));
        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json.get("error").is_none());
    }
}
