use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use crate::error::{Result, TransportError};

/// Lowest descriptor number a child-side pipe end may occupy in the parent.
///
/// Keeping both child ends above fd 4 means `dup2` onto 3 and 4 after fork
/// can never clobber the other end.
pub(crate) const MIN_CHILD_END_FD: RawFd = 5;

/// A unidirectional pipe. Both ends are close-on-exec.
#[derive(Debug)]
pub struct Pipe {
    /// Read end.
    pub reader: OwnedFd,
    /// Write end.
    pub writer: OwnedFd,
}

impl Pipe {
    /// Split into `File` ends for use with `Read`/`Write`.
    pub fn into_files(self) -> (File, File) {
        (File::from(self.reader), File::from(self.writer))
    }
}

/// Create a close-on-exec pipe.
pub fn pipe() -> Result<Pipe> {
    let mut fds = [0 as RawFd; 2];

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        // SAFETY: `fds` is a valid two-element array as pipe2 requires.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
        if rc != 0 {
            return Err(TransportError::Pipe(std::io::Error::last_os_error()));
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        // SAFETY: `fds` is a valid two-element array as pipe requires.
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(TransportError::Pipe(std::io::Error::last_os_error()));
        }
    }

    // SAFETY: both descriptors were just returned by the kernel and are owned
    // by nothing else in this process.
    let (reader, writer) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        set_cloexec(&reader)?;
        set_cloexec(&writer)?;
    }

    Ok(Pipe { reader, writer })
}

/// Return `fd` unchanged if it already sits at or above `min`, otherwise a
/// close-on-exec duplicate placed at the lowest free slot `>= min`.
pub(crate) fn raise_fd(fd: OwnedFd, min: RawFd) -> Result<OwnedFd> {
    if fd.as_raw_fd() >= min {
        return Ok(fd);
    }
    // SAFETY: `fd` is an open descriptor owned by this function.
    let raised = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_DUPFD_CLOEXEC, min) };
    if raised < 0 {
        return Err(TransportError::Pipe(std::io::Error::last_os_error()));
    }
    // SAFETY: `raised` is a fresh descriptor returned by F_DUPFD_CLOEXEC.
    Ok(unsafe { OwnedFd::from_raw_fd(raised) })
}

pub(crate) fn set_cloexec(fd: &impl AsRawFd) -> Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: `raw` is an open descriptor borrowed for the duration of the call.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFD) };
    if flags < 0 {
        return Err(TransportError::Pipe(std::io::Error::last_os_error()));
    }
    // SAFETY: same descriptor as above; only the FD_CLOEXEC bit changes.
    let rc = unsafe { libc::fcntl(raw, libc::F_SETFD, flags | libc::FD_CLOEXEC) };
    if rc < 0 {
        return Err(TransportError::Pipe(std::io::Error::last_os_error()));
    }
    Ok(())
}
