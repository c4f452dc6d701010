use std::path::PathBuf;

use clap::Parser;

use loramesh_node::{NodeConfig, Simulation};

#[derive(Parser)]
#[command(name = "loramesh-sim", about = "Run a scripted LoRa mesh simulation")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/sim.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match NodeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    loramesh_node::logging::init_with_level(&config.logging.level);

    let sim = match Simulation::start(&config).await {
        Ok(sim) => sim,
        Err(e) => {
            tracing::error!("failed to start simulation: {e}");
            std::process::exit(1);
        }
    };

    tokio::select! {
        report = sim.run_script(&config.script) => {
            tracing::info!(sent = report.sent, failed = report.failed, "script finished");
            tokio::select! {
                _ = tokio::time::sleep(config.medium.settle()) => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
            }
        }
        _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
    }

    if let Err(e) = sim.shutdown().await {
        tracing::error!("simulation did not shut down cleanly: {e}");
        std::process::exit(1);
    }
}
