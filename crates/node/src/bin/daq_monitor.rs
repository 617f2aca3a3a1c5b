//! Host-side monitor: reads the node's output stream into per-channel history

use anyhow::Context;
use capture::analysis::{analyze_latency_and_snr, FilterChain};
use capture::{open_serial_reader, Capture, ChannelHistory};
use node::{init_logging, AnalysisSettings, Settings};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref()).context("loading settings")?;
    let monitor = settings.monitor.clone();

    init_logging(&settings.log_level, settings.log_json)?;

    let capture = Capture::new(monitor.channels, monitor.history_length);

    let outcome = if monitor.device == "-" {
        info!("Reading from stdin");
        let reader = BufReader::new(tokio::io::stdin());
        tokio::select! {
            result = capture.run(reader) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    } else {
        let reader = open_serial_reader(&monitor.device, monitor.baud_rate)
            .context("opening serial port")?;
        tokio::select! {
            result = capture.run(reader) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    };

    match outcome {
        Some(Ok(summary)) => info!("Stream ended: {:?}", summary),
        Some(Err(e)) => warn!("Capture stopped: {}", e),
        None => info!("Interrupted"),
    }

    let history = capture.history();
    let history = history.lock().unwrap_or_else(|e| e.into_inner());

    if let Some(analysis) = &monitor.analysis {
        analyze_channels(&history, analysis)?;
    }

    if let Some(dir) = &monitor.save_dir {
        let files = history
            .save(dir, &monitor.save_prefix, &monitor.save_extension)
            .context("saving channel data")?;
        info!("Saved {} files", files.len());
    }

    Ok(())
}

/// Band-pass every channel and log what the filter does to it
fn analyze_channels(history: &ChannelHistory, analysis: &AnalysisSettings) -> anyhow::Result<()> {
    let chain = FilterChain::design(&analysis.filter_spec()).context("designing filter")?;

    for (index, trace) in history.all_channels(None).iter().enumerate() {
        let signal = capture::analysis::trace_signal(trace);
        match analyze_latency_and_snr(&chain, &signal, analysis.band_low_hz, analysis.band_high_hz)
        {
            Ok(report) => info!(
                "Channel {}: group delay {:.2} ms, latency {:.2} ms, SNR {:.2} -> {:.2} dB ({:+.2} dB)",
                index,
                report.group_delay_ms,
                report.latency_ms,
                report.snr_raw_db,
                report.snr_filtered_db,
                report.snr_gain_db
            ),
            Err(e) => warn!("Channel {}: analysis skipped: {}", index, e),
        }
    }
    Ok(())
}
