use std::sync::Arc;

use guard_api::service::run_api_service;
use guard_common::{metrics::start_metrics_server, utils::init_tracing_log, GuardConfig};
use guard_state::{MemoryConsensusLayer, MemoryExecutionLayer};
use tokio::{signal::unix::SignalKind, sync::watch};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match GuardConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            std::process::exit(1);
        }
    };

    let _guard = init_tracing_log(&config.logging);

    start_metrics_server(&config);

    info!(
        listen = %config.listen_addr,
        upstream = %config.beacon_url,
        solo_enabled = config.enable_solo_validators,
        "starting beacon-guard"
    );

    match run(config).await {
        Ok(_) => info!("beacon-guard exited"),
        Err(err) => {
            error!(%err, "beacon-guard exited with error");
            std::process::exit(1);
        }
    }
}

async fn run(config: GuardConfig) -> eyre::Result<()> {
    // The proxy never talks to chain state itself: the operator's state-sync
    // process owns populating these snapshots. Until it does, reward-critical
    // requests are denied as unknown validators while passthrough routes keep
    // working.
    let cl = Arc::new(MemoryConsensusLayer::new());
    let el = Arc::new(MemoryExecutionLayer::new(config.rewards_pool_address));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut service = tokio::spawn(run_api_service(config, cl, el, shutdown_rx));

    let mut sigint = tokio::signal::unix::signal(SignalKind::interrupt())?;
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
        result = &mut service => return Ok(result??),
    }

    info!("signal received, shutting down");
    let _ = shutdown_tx.send(true);

    service.await??;
    Ok(())
}
