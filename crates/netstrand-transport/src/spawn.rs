use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::pipe::{pipe, raise_fd, MIN_CHILD_END_FD};
use crate::{CHILD_INPUT_FD, CHILD_OUTPUT_FD};

/// A launched child together with the parent ends of its message pipes.
#[derive(Debug)]
pub struct SpawnedChild {
    /// The OS process.
    pub child: Child,
    /// Parent end of fd 3: bytes written here are read by the child.
    pub to_child: File,
    /// Parent end of fd 4: bytes the child writes arrive here.
    pub from_child: File,
}

/// Spawn `command` with fd 3 and fd 4 wired to fresh pipes.
///
/// Stdio configuration on `command` is left untouched, so the child inherits
/// stdin/stdout/stderr unless the caller changed them. The child-side pipe
/// ends are closed in the parent before this returns, so end of stream on
/// either pipe tracks the child's own descriptors.
pub fn spawn_with_pipes(command: &mut Command) -> Result<SpawnedChild> {
    let program = PathBuf::from(command.get_program());

    let (child_reader, to_child) = {
        let p = pipe()?;
        (raise_fd(p.reader, MIN_CHILD_END_FD)?, p.writer)
    };
    let (from_child, child_writer) = {
        let p = pipe()?;
        (p.reader, raise_fd(p.writer, MIN_CHILD_END_FD)?)
    };

    let input_src = child_reader.as_raw_fd();
    let output_src = child_writer.as_raw_fd();

    // SAFETY: the closure runs between fork and exec and only calls dup2,
    // which is async-signal-safe. Both sources are >= MIN_CHILD_END_FD, so
    // neither dup2 target aliases the other source.
    unsafe {
        command.pre_exec(move || {
            dup_onto(input_src, CHILD_INPUT_FD)?;
            dup_onto(output_src, CHILD_OUTPUT_FD)?;
            Ok(())
        });
    }

    let child = command.spawn().map_err(|source| TransportError::Spawn {
        program: program.clone(),
        source,
    })?;

    // The child holds its own copies now.
    drop(child_reader);
    drop(child_writer);

    info!(?program, pid = child.id(), "spawned child with message pipes");
    debug!(input_src, output_src, "child pipe ends closed in parent");

    Ok(SpawnedChild {
        child,
        to_child: File::from(to_child),
        from_child: File::from(from_child),
    })
}

fn dup_onto(src: RawFd, dst: RawFd) -> std::io::Result<()> {
    // SAFETY: `src` is open in the forked child; dup2 clears FD_CLOEXEC on `dst`.
    if unsafe { libc::dup2(src, dst) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn child_sees_fd3_and_fd4() {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("cat <&3 >&4");
        let mut spawned = spawn_with_pipes(&mut cmd).unwrap();

        spawned.to_child.write_all(b"echoed").unwrap();
        drop(spawned.to_child);

        let mut out = Vec::new();
        spawned.from_child.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"echoed");
        assert!(spawned.child.wait().unwrap().success());
    }

    #[test]
    fn child_output_pipe_closes_on_exit() {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("exit 0");
        let mut spawned = spawn_with_pipes(&mut cmd).unwrap();

        let mut out = Vec::new();
        spawned.from_child.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
        assert!(spawned.child.wait().unwrap().success());
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let mut cmd = Command::new("/nonexistent/netstrand-missing-binary");
        let err = spawn_with_pipes(&mut cmd).unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }
}
