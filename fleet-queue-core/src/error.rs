//! Error types for the fleet recovery layer

use thiserror::Error;

/// Core error type for recovery operations
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// Owning fleet configuration is not resolved for a worker yet
    #[error("fleet configuration unresolved for worker {0}")]
    FleetUnresolved(String),

    /// Owning task of a work item could not be resolved
    #[error("task resolution failed: {0}")]
    TaskResolution(String),

    /// Queue cannot accept more entries
    #[error("queue full: {0} entries pending")]
    QueueFull(usize),

    /// Queue-level error
    #[error("queue error: {0}")]
    Queue(String),
}

/// Result type alias for recovery operations
pub type Result<T> = std::result::Result<T, RecoveryError>;
