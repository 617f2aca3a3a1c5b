//! Node Error Types

use thiserror::Error;

/// Errors raised while bringing the node up
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Trigger error: {0}")]
    Trigger(#[from] trigger::TriggerError),

    #[error("Emission setup error: {0}")]
    Coordinator(#[from] coordinator::CoordinatorError),

    #[error("Channel reader error: {0}")]
    Reader(#[from] channel_reader::ReaderError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Metrics exporter failed: {0}")]
    Metrics(String),
}
