use std::path::PathBuf;

/// Errors that can occur while wiring pipes to a child process.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Creating or adjusting a pipe failed.
    #[error("failed to create pipe: {0}")]
    Pipe(std::io::Error),

    /// The program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// An inherited message descriptor is missing or unusable.
    #[error("inherited descriptor {fd} unavailable: {source}")]
    InheritedFd { fd: i32, source: std::io::Error },

    /// The inherited descriptors were already claimed by this process.
    #[error("inherited descriptors already taken")]
    AlreadyTaken,

    /// An I/O error occurred on a pipe or while waiting on the child.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
