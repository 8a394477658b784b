use std::fmt;
use std::io;

use netstrand_channel::{ChannelError, ExitOutcome};
use netstrand_frame::FrameError;
use netstrand_transport::TransportError;

// Exit code constants, sysexits-flavoured.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const LAUNCH_FAILED: i32 = 127;
/// Added to the signal number when a child is killed by a signal.
pub const SIGNAL_BASE: i32 = 128;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Shell-style exit code for a child's exit.
pub fn outcome_code(outcome: ExitOutcome) -> i32 {
    match outcome {
        ExitOutcome::Exited(code) => code,
        ExitOutcome::Signaled(signal) => SIGNAL_BASE.saturating_add(signal),
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Pipe(source) | TransportError::Io(source) => io_error(context, source),
        TransportError::Spawn { .. } => CliError::new(LAUNCH_FAILED, format!("{context}: {err}")),
        TransportError::InheritedFd { .. } => CliError::new(
            USAGE,
            format!("{context}: {err} (is this process running under a netstrand channel?)"),
        ),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        FrameError::EmptyDelimiter => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::InvalidFraming { .. }
        | FrameError::FrameTooLarge { .. }
        | FrameError::MalformedFrame { .. }
        | FrameError::DecoderFailed
        | FrameError::InvalidText { .. }
        | FrameError::InvalidHex(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Frame(err) => frame_error(context, err),
        ChannelError::Transport(err) => transport_error(context, err),
        ChannelError::ProcessLaunch { .. } => {
            CliError::new(LAUNCH_FAILED, format!("{context}: {err}"))
        }
        ChannelError::ProcessExit(outcome) => {
            CliError::new(outcome_code(outcome), format!("{context}: child {outcome}"))
        }
        ChannelError::Json(_) | ChannelError::NotAnArray { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ChannelError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_codes_follow_shell_convention() {
        assert_eq!(outcome_code(ExitOutcome::Exited(0)), 0);
        assert_eq!(outcome_code(ExitOutcome::Exited(7)), 7);
        assert_eq!(outcome_code(ExitOutcome::Signaled(9)), 137);
    }

    #[test]
    fn framing_violations_are_data_invalid() {
        let err = frame_error("decode failed", FrameError::MalformedFrame { found: b'x' });
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("decode failed: "));
    }

    #[test]
    fn launch_failure_maps_to_127() {
        let err = channel_error(
            "spawn failed",
            ChannelError::ProcessLaunch {
                program: "missing".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, LAUNCH_FAILED);
    }

    #[test]
    fn nested_io_errors_keep_their_kind() {
        let err = channel_error(
            "send failed",
            ChannelError::Frame(FrameError::Io(io::Error::from(
                io::ErrorKind::PermissionDenied,
            ))),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }
}
