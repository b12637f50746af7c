//! Pipeline orchestrator binary.

use std::sync::Arc;

use tracing::{error, info, warn};

use beatcut_media::{FfmpegRenderer, SubprocessAnalyzer};
use beatcut_store::TaskStore;
use beatcut_worker::{init_tracing, PipelineOrchestrator, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting beatcut-orchestrator");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Err(e) = beatcut_media::check_ffmpeg() {
        // Degraded but live: stages substitute fallbacks, verification
        // catches the damage.
        warn!("ffmpeg preflight failed, renders will fall back: {e}");
    }

    let store = match TaskStore::open(&config.root) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open task store: {e}");
            std::process::exit(1);
        }
    };

    let analyzer = Arc::new(SubprocessAnalyzer::new(&config.analyzer_program));
    let renderer = Arc::new(FfmpegRenderer::new());
    let orchestrator = PipelineOrchestrator::new(config, store, analyzer, renderer);

    if let Err(e) = orchestrator.run().await {
        error!("Orchestrator exited with error: {e}");
        std::process::exit(1);
    }
}
