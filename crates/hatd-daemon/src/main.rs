//! `hatd`: serve the configured board until interrupted.

use anyhow::Context;
use hatd_core::DaemonConfig;
use hatd_core::constants::BUS_NAME;
use hatd_daemon::{BoardDaemon, logging};
use hatd_hardware::AnyBoard;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_subscriber();

    let config = DaemonConfig::load().context("failed to load daemon configuration")?;
    info!(
        version = hatd_core::VERSION,
        board = %config.board,
        max_priority = config.max_priority,
        supervisor_interval_ms = config.supervisor_interval_ms,
        proc_root = %config.proc_root.display(),
        "Starting {BUS_NAME}"
    );

    // Only simulated boards exist until register-level drivers land.
    let (board, _controls) = AnyBoard::mock(config.board);
    let (daemon, _bus) = BoardDaemon::new(&config, board);
    let daemon = daemon.spawn();

    // The bus is in-process only; a system bus transport is out of scope.
    warn!("No external bus transport attached; only in-process clients can connect");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    daemon.shutdown().await.context("daemon did not stop cleanly")?;
    Ok(())
}
