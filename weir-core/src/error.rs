//! Scheduler error types.

/// Scheduler error type.
///
/// The request path has no recoverable failure modes: enqueue and dispatch
/// either succeed or the process has violated an internal invariant. Errors
/// only surface at construction time.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// A background thread could not be spawned.
    #[error("failed to spawn {name} thread: {message}")]
    ThreadSpawn {
        /// The thread's name.
        name: &'static str,
        /// Error message.
        message: String,
    },
}

/// Result type for scheduler construction.
pub type QueueResult<T> = Result<T, QueueError>;
