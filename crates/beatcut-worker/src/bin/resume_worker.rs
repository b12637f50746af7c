//! Resume worker binary: crash-recovery sweeps.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use beatcut_media::FfmpegRenderer;
use beatcut_store::TaskStore;
use beatcut_worker::{init_tracing, ResumeWorker, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting beatcut-resume-worker");

    // Recovery sweeps run on a slower cadence than the pipeline loops.
    let config = WorkerConfig::from_env().with_poll_interval(Duration::from_secs(30));

    let store = match TaskStore::open(&config.root) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open task store: {e}");
            std::process::exit(1);
        }
    };

    let mut worker = ResumeWorker::new(config, store, Arc::new(FfmpegRenderer::new()));

    if let Err(e) = worker.run().await {
        error!("Resume worker exited with error: {e}");
        std::process::exit(1);
    }
}
