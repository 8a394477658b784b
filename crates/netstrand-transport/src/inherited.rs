use std::fs::File;
use std::os::fd::{FromRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::pipe::set_cloexec;
use crate::{CHILD_INPUT_FD, CHILD_OUTPUT_FD};

static TAKEN: AtomicBool = AtomicBool::new(false);

/// Message pipes handed to this process by a netstrand parent.
#[derive(Debug)]
pub struct InheritedPipes {
    /// fd 3, messages from the parent.
    pub input: File,
    /// fd 4, messages to the parent.
    pub output: File,
}

/// Claim fd 3 and fd 4 as this process's message pipes.
///
/// Succeeds at most once per process. Both descriptors are marked
/// close-on-exec so grandchildren do not inherit them.
pub fn take_inherited() -> Result<InheritedPipes> {
    check_open(CHILD_INPUT_FD)?;
    check_open(CHILD_OUTPUT_FD)?;

    if TAKEN.swap(true, Ordering::SeqCst) {
        return Err(TransportError::AlreadyTaken);
    }

    // SAFETY: both descriptors are open (checked above) and the TAKEN flag
    // guarantees no other File in this process owns them.
    let (input, output) = unsafe {
        (
            File::from_raw_fd(CHILD_INPUT_FD),
            File::from_raw_fd(CHILD_OUTPUT_FD),
        )
    };
    set_cloexec(&input)?;
    set_cloexec(&output)?;

    debug!("claimed inherited message pipes");
    Ok(InheritedPipes { input, output })
}

fn check_open(fd: RawFd) -> Result<()> {
    // SAFETY: F_GETFD only inspects descriptor flags.
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } < 0 {
        return Err(TransportError::InheritedFd {
            fd,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}
