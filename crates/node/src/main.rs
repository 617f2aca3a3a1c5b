//! Sampling Node - Main Entry Point

use anyhow::Context;
use node::{init_logging, init_metrics, open_sink, Pipeline, Settings};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref()).context("loading settings")?;

    init_logging(&settings.log_level, settings.log_json)?;

    info!("=== DAQ node v{} ===", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = settings.metrics_addr {
        init_metrics(addr)?;
    }

    let sink = open_sink(&settings);
    let pipeline = Pipeline::start_simulated(&settings, sink).context("starting pipeline")?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");

    let report = pipeline.shutdown().await;
    info!(
        "Pushed {} rows ({} dropped, {} evicted), emitted {} rows and {} sentinels ({} batches dropped)",
        report.stats.samples_pushed,
        report.stats.samples_dropped,
        report.rows_evicted,
        report.stats.rows_emitted,
        report.stats.sentinels_emitted,
        report.stats.batches_dropped
    );

    Ok(())
}
