//! Coordinator Error Types

use thiserror::Error;

/// Errors raised while setting up the emission path
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The writer queue must hold at least one batch
    #[error("Sink writer queue capacity must be > 0")]
    ZeroPending,

    /// Writer thread could not be started
    #[error("Failed to spawn sink writer: {0}")]
    Spawn(String),

    /// Writer thread panicked while writing
    #[error("Sink writer thread panicked")]
    WriterPanicked,
}
