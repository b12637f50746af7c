//! Process supervisor binary.

use tracing::{error, info};

use beatcut_supervisor::{default_workers, ProcessSupervisor, SupervisorConfig};
use beatcut_worker::init_tracing;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting beatcut-supervisor");

    let config = SupervisorConfig::from_env();
    let specs = default_workers(&config);

    let mut supervisor = ProcessSupervisor::new(config, specs);
    if let Err(e) = supervisor.run().await {
        error!("Supervisor exited with error: {e}");
        std::process::exit(1);
    }
}
