//! Pipeline stages and the stage runner.
//!
//! Each stage reads only fields owned by earlier stages, writes its own
//! owned fields, and appends exactly one progress note. Collaborator
//! failures never abort a task: the runner substitutes a documented
//! deterministic fallback and flags it in the written result. All artifact
//! paths are deterministic per (task id, stage), so re-running a stage
//! overwrites instead of duplicating.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use beatcut_media::{AudioAnalyzer, Renderer};
use beatcut_models::{AudioAnalysis, Mood, PlanBlock, RenderMode, Task, TaskStatus};
use beatcut_store::TaskStore;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

/// Mood-keyed overlay effects.
fn mood_fx_table(mood: Mood) -> &'static [&'static str] {
    match mood {
        Mood::Aggressive => &["red_flash", "glitch_hard", "shake_heavy"],
        Mood::Epic => &["impact_flash", "shake_heavy", "zoom_crash"],
        Mood::Sad => &["blue_soft", "slow_fade", "blur_light"],
        Mood::Romantic => &["warm_glow", "soft_zoom"],
        Mood::Cinematic => &["soft_glow", "light_sweep"],
    }
}

const TRANSITIONS: &[&str] = &[
    "shake_cut",
    "cross_flash",
    "zoom_whip",
    "spin_cut",
    "impact_cut",
    "anime_glitch",
];

const EFFECTS: &[&str] = &[
    "soft_glow",
    "shake",
    "lighting_flash",
    "zoom_hit",
    "glitch",
    "speedline",
    "color_pop",
];

/// One pipeline stage, in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AnalyzeAudio,
    SelectClips,
    GeneratePlan,
    Render,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AnalyzeAudio => "analyze_audio",
            Stage::SelectClips => "select_clips",
            Stage::GeneratePlan => "generate_plan",
            Stage::Render => "render",
        }
    }

    /// The next stage a task at `status` requires, and the status the
    /// task advances to once that stage succeeds. `None` when the task is
    /// awaiting verification or terminal.
    pub fn for_status(status: TaskStatus) -> Option<(Stage, TaskStatus)> {
        match status {
            TaskStatus::Pending => Some((Stage::AnalyzeAudio, TaskStatus::Analyzing)),
            TaskStatus::Analyzing => Some((Stage::SelectClips, TaskStatus::Planning)),
            TaskStatus::Planning => Some((Stage::GeneratePlan, TaskStatus::Rendering)),
            TaskStatus::Rendering => Some((Stage::Render, TaskStatus::Verifying)),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deterministic table pick keyed on (task id, block index, salt).
///
/// FNV-1a keeps plan generation a pure function of the task, which makes
/// stage re-runs after a crash produce identical plans.
fn pick<'a>(table: &[&'a str], task_id: &str, index: usize, salt: u64) -> &'a str {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in task_id.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    hash ^= index as u64;
    hash = hash.wrapping_mul(0x100_0000_01b3);
    hash ^= salt;
    hash = hash.wrapping_mul(0x100_0000_01b3);
    table[(hash % table.len() as u64) as usize]
}

/// Build the edit plan for a task's clip list. Pure function of the
/// task id, clips and analysis, so regenerating a lost plan reproduces
/// the original blocks exactly.
pub fn build_plan(config: &WorkerConfig, task: &Task) -> Vec<PlanBlock> {
    let (bpm, mood) = task
        .analysis
        .as_ref()
        .map(|a| (a.bpm, a.mood))
        .unwrap_or((120, Mood::default()));

    let mut blocks = Vec::with_capacity(task.clips.len());
    let mut time_pos = 0.0;
    for (idx, clip) in task.clips.iter().enumerate() {
        blocks.push(PlanBlock {
            clip: clip.clone(),
            start: time_pos,
            end: time_pos + config.block_seconds,
            effect: pick(EFFECTS, task.id.as_str(), idx, 1).to_string(),
            transition: pick(TRANSITIONS, task.id.as_str(), idx, 2).to_string(),
            mood_fx: pick(mood_fx_table(mood), task.id.as_str(), idx, 3).to_string(),
            beat_sync: bpm,
        });
        time_pos += config.block_seconds;
    }
    blocks
}

/// Executes one pipeline stage against a task.
pub struct StageRunner {
    config: WorkerConfig,
    store: TaskStore,
    analyzer: Arc<dyn AudioAnalyzer>,
    renderer: Arc<dyn Renderer>,
}

impl StageRunner {
    pub fn new(
        config: WorkerConfig,
        store: TaskStore,
        analyzer: Arc<dyn AudioAnalyzer>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            config,
            store,
            analyzer,
            renderer,
        }
    }

    /// Run one stage, returning the updated task. Filesystem side effects
    /// are confined to the task's declared artifact paths.
    pub async fn run(&self, stage: Stage, task: Task) -> WorkerResult<Task> {
        match stage {
            Stage::AnalyzeAudio => self.analyze_audio(task).await,
            Stage::SelectClips => self.select_clips(task).await,
            Stage::GeneratePlan => self.generate_plan(task).await,
            Stage::Render => self.render(task).await,
        }
    }

    async fn analyze_audio(&self, mut task: Task) -> WorkerResult<Task> {
        let analysis = match &task.inputs.audio {
            Some(audio) => match self.analyzer.analyze(Path::new(audio)).await {
                Ok(a) => a,
                Err(e) => {
                    warn!(task_id = %task.id, "analyzer unavailable, using fallback: {e}");
                    AudioAnalysis::fallback()
                }
            },
            None => AudioAnalysis::fallback(),
        };

        if analysis.is_fallback() {
            task.note(format!(
                "Audio analyzed in fallback mode: bpm={} mood={}",
                analysis.bpm, analysis.mood
            ));
        } else {
            task.note(format!(
                "Audio analyzed: bpm={} mood={}",
                analysis.bpm, analysis.mood
            ));
        }
        info!(task_id = %task.id, bpm = analysis.bpm, mood = %analysis.mood, "analysis done");
        task.analysis = Some(analysis);
        Ok(task)
    }

    async fn select_clips(&self, mut task: Task) -> WorkerResult<Task> {
        let mood = task
            .analysis
            .as_ref()
            .map(|a| a.mood)
            .unwrap_or_default();

        if let Some(video) = task.inputs.videos.first().cloned() {
            match beatcut_media::detect_scenes(Path::new(&video), self.config.scene_threshold).await
            {
                Ok(scenes) => {
                    let previews_dir = self.store.previews_dir().join(task.id.as_str());
                    let clips = beatcut_media::cut_scene_clips(
                        Path::new(&video),
                        &scenes,
                        &previews_dir,
                        &task.id,
                        self.config.max_preview_scenes,
                    )
                    .await?;

                    task.note(format!(
                        "Scenes detected: {} scenes, {} previews",
                        scenes.len(),
                        clips.len()
                    ));
                    task.scenes = scenes;
                    task.clips = clips
                        .into_iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect();
                }
                Err(e) => {
                    warn!(task_id = %task.id, "scene detection unavailable: {e}");
                }
            }
        }

        // No video material, no working scene collaborator, or every
        // preview cut failed: the mood-derived sample clip list keeps the
        // plan stage fed.
        if task.clips.is_empty() {
            task.clips = (1..=self.config.sample_clip_count)
                .map(|i| {
                    self.config
                        .root
                        .join("sample_clips")
                        .join(format!("{mood}_{i}.mp4"))
                        .to_string_lossy()
                        .into_owned()
                })
                .collect();
            task.note(format!("Clips selected for mood {mood} (sample set)"));
        }
        Ok(task)
    }

    async fn generate_plan(&self, mut task: Task) -> WorkerResult<Task> {
        let blocks = build_plan(&self.config, &task);
        let sidecar = self.store.plan_sidecar_path(&task.id);
        self.store.write_sidecar(&sidecar, &blocks).await?;

        task.note(format!("Edit plan generated: {} blocks", blocks.len()));
        task.plan = Some(blocks);
        task.plan_path = Some(sidecar.to_string_lossy().into_owned());
        Ok(task)
    }

    async fn render(&self, mut task: Task) -> WorkerResult<Task> {
        let out = self.store.output_path(&task.id, "_render.mp4");

        let clips: Vec<String> = task
            .plan
            .as_ref()
            .map(|blocks| blocks.iter().map(|b| b.clip.clone()).collect())
            .unwrap_or_else(|| task.clips.clone());

        let has_real_material = clips.iter().any(|c| Path::new(c).exists());
        task.render_mode = if has_real_material {
            RenderMode::Fusion
        } else {
            RenderMode::Demo
        };

        // The output path is recorded regardless of the collaborator's
        // exit: verification is the render supervisor's job.
        match self.renderer.render(&clips, &out).await {
            Ok(()) => task.note(format!("Render finished: {}", out.display())),
            Err(e) => {
                warn!(task_id = %task.id, "render collaborator failed: {e}");
                task.note(format!("Render collaborator failed: {e}"));
            }
        }
        task.output = Some(out.to_string_lossy().into_owned());
        Ok(task)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use beatcut_media::{MediaError, MediaResult};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Analyzer stub returning a fixed result or failing on demand.
    pub struct StubAnalyzer {
        pub result: Option<AudioAnalysis>,
    }

    impl StubAnalyzer {
        pub fn epic() -> Self {
            Self {
                result: Some(
                    AudioAnalysis {
                        bpm: 140,
                        mood: Mood::Epic,
                        energy: 0.08,
                        duration: 120.0,
                        volume: -9.0,
                        sub_mood: None,
                        edit_style: None,
                        fallback: None,
                    }
                    .with_derived(),
                ),
            }
        }

        pub fn unavailable() -> Self {
            Self { result: None }
        }
    }

    #[async_trait]
    impl AudioAnalyzer for StubAnalyzer {
        async fn analyze(&self, _audio: &Path) -> MediaResult<AudioAnalysis> {
            self.result
                .clone()
                .ok_or_else(|| MediaError::analyzer_failed("stub", "unavailable"))
        }
    }

    /// Renderer stub writing a fixed number of bytes, or failing.
    pub struct StubRenderer {
        pub bytes: usize,
        pub fail_render: bool,
        pub fail_fallback: bool,
        pub render_calls: AtomicUsize,
        pub fallback_calls: AtomicUsize,
    }

    impl StubRenderer {
        pub fn writing(bytes: usize) -> Self {
            Self {
                bytes,
                fail_render: false,
                fail_fallback: false,
                render_calls: AtomicUsize::new(0),
                fallback_calls: AtomicUsize::new(0),
            }
        }

        pub fn broken() -> Self {
            Self {
                bytes: 0,
                fail_render: true,
                fail_fallback: true,
                render_calls: AtomicUsize::new(0),
                fallback_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Renderer for StubRenderer {
        async fn render(&self, _clips: &[String], out: &Path) -> MediaResult<()> {
            self.render_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_render {
                return Err(MediaError::ffmpeg_failed("stub render failure", None, Some(1)));
            }
            std::fs::write(out, vec![0u8; self.bytes])?;
            Ok(())
        }

        async fn fallback_render(&self, out: &Path) -> MediaResult<()> {
            self.fallback_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fallback {
                return Err(MediaError::ffmpeg_failed("stub fallback failure", None, Some(1)));
            }
            std::fs::write(out, vec![0u8; self.bytes])?;
            Ok(())
        }
    }
}
