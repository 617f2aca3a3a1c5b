//! Trigger Error Types

use thiserror::Error;

/// Errors raised while setting up triggers and their targets
#[derive(Debug, Error)]
pub enum TriggerError {
    /// A receiving task was already registered for this target
    #[error("{0} already has a registered receiver")]
    AlreadyRegistered(&'static str),

    /// Event queue capacity must be non-zero
    #[error("Event queue capacity must be > 0")]
    ZeroCapacity,

    /// Trigger period must be non-zero
    #[error("Trigger '{0}' period must be > 0")]
    ZeroPeriod(String),

    /// Timer thread could not be started
    #[error("Failed to spawn trigger thread '{name}': {reason}")]
    Spawn { name: String, reason: String },
}
