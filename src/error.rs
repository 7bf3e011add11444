//! Error types for the heartbeat scheduler.

/// Top-level error type for the heartbeat scheduler.
///
/// Most of the scheduler's public surface is deliberately lenient and never
/// returns these; they surface from the strict entry points, configuration
/// loading, and the internal read/write helpers.
#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    /// Configuration file could not be parsed or serialized.
    #[error("config error: {0}")]
    Config(String),

    /// Schedule definition rejected by the strict parser.
    #[error("definition error: {0}")]
    Definition(String),

    /// Run-state file could not be read, parsed, or written.
    #[error("state error: {0}")]
    State(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Runner error (task execution, join failures).
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HeartbeatError>;
