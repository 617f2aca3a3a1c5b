//! Sampling Node
//!
//! Wires the trigger sources, ring buffer, and coordinators into a running
//! pipeline from a boot-time [`Settings`] record.

mod error;
mod logging;
mod pipeline;
mod settings;

pub use error::NodeError;
pub use logging::{init_logging, init_metrics};
pub use pipeline::{open_sink, report_init_failures, Pipeline, ShutdownReport, SignalCounters};
pub use settings::{
    AnalysisSettings, BufferSettings, EmissionSettings, MonitorSettings, OutputKind, OutputSettings,
    SamplingSettings, Settings, SnapshotSettings,
};
