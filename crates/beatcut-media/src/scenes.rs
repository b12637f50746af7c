//! Scene-cut detection and preview clip extraction.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use beatcut_models::{Scene, TaskId};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_duration;

/// Fallback chunk length when the scene filter finds no cuts.
const CHUNK_SECONDS: f64 = 4.0;

/// Detect scene cuts with ffmpeg's scene filter.
///
/// Parses `pts_time=` values from the `showinfo` stderr output and turns
/// them into consecutive intervals. When no cut crosses the threshold the
/// video is split into fixed 4-second chunks instead, so downstream
/// stages always have material to work with.
pub async fn detect_scenes(video: &Path, threshold: f64) -> MediaResult<Vec<Scene>> {
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }

    let duration = probe_duration(video).await?;
    let null_sink = if cfg!(windows) { "NUL" } else { "/dev/null" };
    let stderr = FfmpegCommand::new(video, null_sink)
        .video_filter(format!("select=gt(scene\\,{threshold}),showinfo"))
        .output_arg("-f")
        .output_arg("null")
        .run_capture_stderr()
        .await?;

    let cuts = parse_pts_times(&stderr);
    debug!(video = %video.display(), cuts = cuts.len(), "scene detection done");

    if cuts.is_empty() {
        return Ok(chunk_scenes(duration));
    }

    let mut scenes = Vec::with_capacity(cuts.len() + 1);
    let mut prev = 0.0;
    for t in cuts {
        if t > prev {
            scenes.push(Scene::new(prev, t));
            prev = t;
        }
    }
    if duration > prev {
        scenes.push(Scene::new(prev, duration));
    }
    Ok(scenes)
}

/// Split a duration into fixed-length chunks.
pub fn chunk_scenes(duration: f64) -> Vec<Scene> {
    let mut scenes = Vec::new();
    let mut t = 0.0;
    while t < duration {
        scenes.push(Scene::new(t, (t + CHUNK_SECONDS).min(duration)));
        t += CHUNK_SECONDS;
    }
    scenes
}

/// Extract `pts_time=` values from showinfo stderr lines.
fn parse_pts_times(stderr: &str) -> Vec<f64> {
    let mut times = Vec::new();
    for line in stderr.lines() {
        for part in line.split_whitespace() {
            if let Some(value) = part.strip_prefix("pts_time:").or_else(|| part.strip_prefix("pts_time=")) {
                if let Ok(t) = value.parse::<f64>() {
                    times.push(t);
                }
            }
        }
    }
    times
}

/// Cut small preview clips for the first scenes of a video.
///
/// Clip names are deterministic per (task id, index) so a re-run
/// overwrites instead of duplicating. Scenes whose cut fails are skipped;
/// the result lists only clips that exist on disk.
pub async fn cut_scene_clips(
    video: &Path,
    scenes: &[Scene],
    dir: &Path,
    task_id: &TaskId,
    max_clips: usize,
) -> MediaResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;

    let mut clips = Vec::new();
    for (idx, scene) in scenes.iter().take(max_clips).enumerate() {
        let out = dir.join(format!("{task_id}_scene_{}.mp4", idx + 1));
        let result = FfmpegCommand::new(video, &out)
            .seek(scene.start)
            .duration(scene.duration().max(0.5))
            .video_codec("libx264")
            .preset("veryfast")
            .crf(28)
            .audio_codec("aac")
            .output_args(["-b:a", "64k"])
            .run()
            .await;

        match result {
            Ok(()) if out.exists() => clips.push(out),
            Ok(()) => {}
            Err(e) => debug!(scene = idx, "preview cut failed: {e}"),
        }
    }

    info!(task_id = %task_id, previews = clips.len(), "preview clips created");
    Ok(clips)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pts_times() {
        let stderr = "\
[Parsed_showinfo_1 @ 0x55] n:0 pts:12800 pts_time:3.2 duration:0.04\n\
[Parsed_showinfo_1 @ 0x55] n:1 pts:30000 pts_time:7.5 duration:0.04\n\
frame= 120 fps=30\n";
        assert_eq!(parse_pts_times(stderr), vec![3.2, 7.5]);
    }

    #[test]
    fn test_chunk_scenes_covers_duration() {
        let scenes = chunk_scenes(10.0);
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0], Scene::new(0.0, 4.0));
        assert_eq!(scenes[2], Scene::new(8.0, 10.0));
    }

    #[test]
    fn test_chunk_scenes_empty_for_zero_duration() {
        assert!(chunk_scenes(0.0).is_empty());
    }
}
