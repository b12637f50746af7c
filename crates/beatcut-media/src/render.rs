//! Render collaborator: plan renders and the guaranteed fallback render.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Synthetic source for the demo render when a task has no usable clips.
const DEMO_SOURCE: &str = "color=c=black:s=1280x720:d=6";

/// Synthetic source for the repair render. Small, fixed duration, cannot
/// fail for content reasons.
const FALLBACK_SOURCE: &str = "color=c=black:s=640x360:d=4";

/// Seam for the render collaborator. Contract is best effort: callers
/// treat any failure as a missing artifact and leave verification to the
/// render supervisor.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render the accumulated clip list to `out`.
    async fn render(&self, clips: &[String], out: &Path) -> MediaResult<()>;

    /// Minimal synthetic render used for repair. Must succeed whenever
    /// ffmpeg itself is functional.
    async fn fallback_render(&self, out: &Path) -> MediaResult<()>;
}

/// Production renderer invoking ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRenderer;

impl FfmpegRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, clips: &[String], out: &Path) -> MediaResult<()> {
        let existing: Vec<&str> = clips
            .iter()
            .map(String::as_str)
            .filter(|c| Path::new(c).exists())
            .collect();

        match existing.len() {
            0 => {
                // Nothing usable on disk: demo render keeps the pipeline
                // moving, verification decides whether it is good enough.
                debug!(out = %out.display(), "no usable clips, demo render");
                FfmpegCommand::lavfi(DEMO_SOURCE, out).run().await?;
            }
            1 => {
                FfmpegCommand::new(existing[0], out)
                    .video_codec("libx264")
                    .preset("ultrafast")
                    .crf(25)
                    .audio_codec("aac")
                    .run()
                    .await?;
            }
            _ => {
                let list_path = out.with_extension("concat.txt");
                let mut list = String::new();
                for clip in &existing {
                    // Concat-demuxer quoting: single quotes close, escape, reopen.
                    list.push_str(&format!("file '{}'\n", clip.replace('\'', "'\\''")));
                }
                tokio::fs::write(&list_path, list).await?;

                let result = FfmpegCommand::new(&list_path, out)
                    .input_arg("-f")
                    .input_arg("concat")
                    .input_arg("-safe")
                    .input_arg("0")
                    .video_codec("libx264")
                    .preset("ultrafast")
                    .crf(22)
                    .audio_codec("aac")
                    .run()
                    .await;

                let _ = tokio::fs::remove_file(&list_path).await;
                result?;
            }
        }

        info!(out = %out.display(), clips = existing.len(), "render finished");
        Ok(())
    }

    async fn fallback_render(&self, out: &Path) -> MediaResult<()> {
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        FfmpegCommand::lavfi(FALLBACK_SOURCE, out).run().await?;
        info!(out = %out.display(), "fallback render written");
        Ok(())
    }
}
