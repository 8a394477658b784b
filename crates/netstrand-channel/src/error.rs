use std::path::PathBuf;

#[cfg(unix)]
use netstrand_transport::ExitOutcome;

/// Errors that can occur in message and subprocess channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] netstrand_frame::FrameError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] netstrand_transport::TransportError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A message must be a JSON array at the top level.
    #[error("message must be a JSON array, found {found}")]
    NotAnArray { found: &'static str },

    /// The child process could not be started.
    #[error("failed to launch {program}: {source}")]
    ProcessLaunch {
        program: PathBuf,
        source: std::io::Error,
    },

    /// The child process did not exit successfully.
    #[cfg(unix)]
    #[error("child {0}")]
    ProcessExit(ExitOutcome),

    /// The peer closed its end; no more messages will arrive.
    #[error("peer disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
