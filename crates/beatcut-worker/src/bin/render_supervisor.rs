//! Render supervisor binary: verification and bounded repair.

use std::sync::Arc;

use tracing::{error, info, warn};

use beatcut_media::FfmpegRenderer;
use beatcut_store::TaskStore;
use beatcut_worker::{init_tracing, RenderSupervisor, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting beatcut-render-supervisor");

    let config = WorkerConfig::from_env();

    if let Err(e) = beatcut_media::check_ffmpeg() {
        warn!("ffmpeg preflight failed, repairs will not produce artifacts: {e}");
    }

    let store = match TaskStore::open(&config.root) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open task store: {e}");
            std::process::exit(1);
        }
    };

    let supervisor = RenderSupervisor::new(config, store, Arc::new(FfmpegRenderer::new()));

    if let Err(e) = supervisor.run().await {
        error!("Render supervisor exited with error: {e}");
        std::process::exit(1);
    }
}
