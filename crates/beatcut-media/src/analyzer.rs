//! Audio analyzer collaborator.
//!
//! The analyzer is an external subprocess invoked with the audio file path
//! as its final argument. It must emit a single JSON object on stdout with
//! at least `{"bpm": int, "mood": string}`. Non-zero exit or malformed
//! output is an error; the stage runner substitutes the deterministic
//! fallback so the pipeline stays live without the collaborator.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use beatcut_models::{AudioAnalysis, Mood};

use crate::error::{MediaError, MediaResult};

/// Seam for the audio analysis collaborator.
#[async_trait]
pub trait AudioAnalyzer: Send + Sync {
    async fn analyze(&self, audio: &Path) -> MediaResult<AudioAnalysis>;
}

/// Wire format of the analyzer's stdout contract.
#[derive(Debug, Deserialize)]
struct AnalyzerOutput {
    bpm: u32,
    mood: Mood,
    #[serde(default)]
    energy: f64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    volume: f64,
}

/// Production analyzer: spawns the configured program.
#[derive(Debug, Clone)]
pub struct SubprocessAnalyzer {
    program: String,
    args: Vec<String>,
}

impl SubprocessAnalyzer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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

#[async_trait]
impl AudioAnalyzer for SubprocessAnalyzer {
    async fn analyze(&self, audio: &Path) -> MediaResult<AudioAnalysis> {
        debug!(program = %self.program, audio = %audio.display(), "invoking analyzer");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(audio)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MediaError::analyzer_failed(&self.program, e.to_string()))?;

        if !output.status.success() {
            return Err(MediaError::analyzer_failed(
                &self.program,
                format!(
                    "exit {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let parsed: AnalyzerOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::analyzer_failed(&self.program, format!("bad output: {e}")))?;

        Ok(AudioAnalysis {
            bpm: parsed.bpm.clamp(60, 200),
            mood: parsed.mood,
            energy: parsed.energy,
            duration: parsed.duration,
            volume: parsed.volume,
            sub_mood: None,
            edit_style: None,
            fallback: None,
        }
        .with_derived())
    }
}
