//! Error types for the A2A orchestration crate

use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, A2aError>;

/// Main error type for the orchestration layer.
///
/// Discovery failures are fatal and only possible at startup, before any
/// round has run. Remote call failures name the participant and the turn
/// index at which the call was issued; they are not retried here.
#[derive(Debug, Error)]
pub enum A2aError {
    /// Capability discovery against an agent endpoint failed
    #[error("discovery failed for agent '{agent}': {message}")]
    Discovery { agent: String, message: String },

    /// A remote agent or judge call failed mid-run
    #[error("remote call to '{agent}' failed at turn {turn_index}: {message}")]
    RemoteCall {
        agent: String,
        turn_index: usize,
        message: String,
    },

    /// Serialization/deserialization error
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
