//! Configuration management.

use crate::NodeError;
use channel_reader::{ChannelId, DEFAULT_SAMPLE_BITS};
use capture::analysis::{FilterChain, FilterSpec};
use config::{Config, Environment, File};
use coordinator::{DEFAULT_BATCH_SIZE, DEFAULT_PENDING_BATCHES};
use ring_buffer::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use sink::{DEFAULT_BAUD_RATE, DEFAULT_SNAPSHOT_ROWS};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use trigger::DEFAULT_EVENT_CAPACITY;

/// Boot-time configuration record. Nothing here changes while running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Prometheus listener, disabled when absent
    pub metrics_addr: Option<SocketAddr>,
    pub sampling: SamplingSettings,
    pub buffer: BufferSettings,
    pub emission: EmissionSettings,
    pub output: OutputSettings,
    pub snapshot: SnapshotSettings,
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    /// Channels in column order
    pub channels: Vec<ChannelId>,
    pub sample_bits: u8,
    /// Fast trigger period
    pub period_ms: u64,
    /// Bus addresses the simulated reader treats as not responding
    pub offline_bus_addresses: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    pub capacity: usize,
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionSettings {
    /// Rows drained per emission cycle
    pub batch_size: usize,
    /// Slow trigger period
    pub period_ms: u64,
    pub event_capacity: usize,
    /// Drained batches that may wait for the sink writer
    pub pending_batches: usize,
}

/// Where emitted lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Stdout,
    Serial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub kind: OutputKind,
    pub device: Option<String>,
    pub baud_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Snapshot file, disabled when absent
    pub path: Option<PathBuf>,
    pub period_ms: u64,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Serial device, or "-" for stdin
    pub device: String,
    pub baud_rate: u32,
    pub channels: usize,
    pub history_length: usize,
    /// Directory for per-channel files written on exit
    pub save_dir: Option<PathBuf>,
    pub save_prefix: String,
    pub save_extension: String,
    /// Filter analysis of each channel on exit, disabled when absent
    pub analysis: Option<AnalysisSettings>,
}

/// Band-pass and signal band used by the exit-time analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub sample_rate_hz: f64,
    pub hp_cut_hz: f64,
    pub lp_cut_hz: f64,
    pub hp_order: usize,
    pub lp_order: usize,
    pub band_low_hz: f64,
    pub band_high_hz: f64,
}

impl AnalysisSettings {
    /// Filter parameters for the capture analysis
    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec {
            sample_rate_hz: self.sample_rate_hz,
            hp_cut_hz: self.hp_cut_hz,
            lp_cut_hz: self.lp_cut_hz,
            hp_order: self.hp_order,
            lp_order: self.lp_order,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        // Node default: one row per 5 ms
        let spec = FilterSpec::new(200.0);
        Self {
            sample_rate_hz: spec.sample_rate_hz,
            hp_cut_hz: spec.hp_cut_hz,
            lp_cut_hz: spec.lp_cut_hz,
            hp_order: spec.hp_order,
            lp_order: spec.lp_order,
            band_low_hz: 5.0,
            band_high_hz: 60.0,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_addr: None,
            sampling: SamplingSettings::default(),
            buffer: BufferSettings::default(),
            emission: EmissionSettings::default(),
            output: OutputSettings::default(),
            snapshot: SnapshotSettings::default(),
            monitor: MonitorSettings::default(),
        }
    }
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            channels: vec![ChannelId::Adc { pin: 34 }, ChannelId::Adc { pin: 35 }],
            sample_bits: DEFAULT_SAMPLE_BITS,
            period_ms: 5,
            offline_bus_addresses: Vec::new(),
        }
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            lock_timeout_ms: 2,
        }
    }
}

impl Default for EmissionSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            period_ms: 10,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            pending_batches: DEFAULT_PENDING_BATCHES,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            kind: OutputKind::Stdout,
            device: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            path: None,
            period_ms: 20,
            rows: DEFAULT_SNAPSHOT_ROWS,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            channels: 2,
            history_length: 20_000,
            save_dir: None,
            save_prefix: "channel".to_string(),
            save_extension: ".dat".to_string(),
            analysis: None,
        }
    }
}

impl Settings {
    /// Load settings from a file (or `config/default` if present) layered
    /// with `DAQ_` environment variables, e.g. `DAQ_BUFFER__CAPACITY=1000`.
    pub fn load(path: Option<&Path>) -> Result<Self, NodeError> {
        let file = match path {
            Some(path) => File::from(path),
            None => File::with_name("config/default").required(false),
        };

        let s = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("DAQ")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), NodeError> {
        let invalid = |msg: &str| Err(NodeError::InvalidSettings(msg.to_string()));

        if self.sampling.channels.is_empty() {
            return invalid("sampling.channels must not be empty");
        }
        if !(1..=31).contains(&self.sampling.sample_bits) {
            return invalid("sampling.sample_bits must be in 1..=31");
        }
        if self.sampling.period_ms == 0 || self.emission.period_ms == 0 {
            return invalid("trigger periods must be > 0");
        }
        if self.buffer.capacity == 0 {
            return invalid("buffer.capacity must be > 0");
        }
        if self.emission.batch_size == 0 {
            return invalid("emission.batch_size must be > 0");
        }
        if self.emission.event_capacity == 0 {
            return invalid("emission.event_capacity must be > 0");
        }
        if self.emission.pending_batches == 0 {
            return invalid("emission.pending_batches must be > 0");
        }
        if self.output.kind == OutputKind::Serial && self.output.device.is_none() {
            return invalid("output.device is required for serial output");
        }
        if self.snapshot.path.is_some() && self.snapshot.period_ms == 0 {
            return invalid("snapshot.period_ms must be > 0");
        }
        if let Some(analysis) = &self.monitor.analysis {
            FilterChain::design(&analysis.filter_spec())
                .map_err(|e| NodeError::InvalidSettings(format!("monitor.analysis: {}", e)))?;
            if analysis.band_low_hz >= analysis.band_high_hz {
                return invalid("monitor.analysis band_low_hz must be below band_high_hz");
            }
        }
        Ok(())
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sampling.period_ms)
    }

    pub fn emit_period(&self) -> Duration {
        Duration::from_millis(self.emission.period_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.buffer.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.buffer.capacity, 500);
        assert_eq!(settings.emission.batch_size, 2);
        assert_eq!(settings.sample_period(), Duration::from_millis(5));
        assert_eq!(settings.emit_period(), Duration::from_millis(10));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[sampling]
channels = [
    { kind = "adc", pin = 34 },
    { kind = "bus", address = 72 },
]
period_ms = 2

[buffer]
capacity = 64

[emission]
batch_size = 4
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();

        assert_eq!(settings.log_level, "debug");
        assert_eq!(
            settings.sampling.channels,
            vec![ChannelId::Adc { pin: 34 }, ChannelId::Bus { address: 0x48 }]
        );
        assert_eq!(settings.sampling.period_ms, 2);
        assert_eq!(settings.buffer.capacity, 64);
        assert_eq!(settings.emission.batch_size, 4);
        assert_eq!(settings.emission.period_ms, 10);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[buffer]\ncapacity = 0\n").unwrap();

        assert!(matches!(
            Settings::load(Some(&path)),
            Err(NodeError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        settings.emission.batch_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.sampling.channels.clear();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.emission.pending_batches = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.output.kind = OutputKind::Serial;
        assert!(settings.validate().is_err());
        settings.output.device = Some("/dev/ttyUSB0".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_analysis_settings_validated() {
        let mut settings = Settings::default();
        settings.monitor.analysis = Some(AnalysisSettings::default());
        assert!(settings.validate().is_ok());

        // Low-pass edge above Nyquist at 100 Hz
        let mut analysis = AnalysisSettings::default();
        analysis.lp_cut_hz = 120.0;
        settings.monitor.analysis = Some(analysis);
        assert!(matches!(settings.validate(), Err(NodeError::InvalidSettings(_))));

        let mut analysis = AnalysisSettings::default();
        analysis.band_low_hz = 80.0;
        settings.monitor.analysis = Some(analysis);
        assert!(settings.validate().is_err());
    }
}
