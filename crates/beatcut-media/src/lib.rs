//! External collaborator layer.
//!
//! Everything the pipeline calls but does not own the correctness of:
//! ffmpeg/ffprobe invocation, scene-cut detection, the audio analyzer
//! subprocess and the render collaborators. Commands are always argument
//! lists given to the process-spawn API, never a shell.

mod analyzer;
mod command;
mod error;
mod probe;
mod render;
mod scenes;

pub use analyzer::{AudioAnalyzer, SubprocessAnalyzer};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_duration, probe_media, MediaInfo};
pub use render::{FfmpegRenderer, Renderer};
pub use scenes::{chunk_scenes, cut_scene_clips, detect_scenes};
