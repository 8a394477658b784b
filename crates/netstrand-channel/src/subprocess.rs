//! A child process with a message channel on fd3 (to the child) and fd4
//! (from the child).
//!
//! stdin, stdout and stderr are left to the child; only the two extra pipes
//! carry protocol data. Two background threads serve each child:
//! - a reader that decodes fd4 into a queue, ending at end of stream or on
//!   the first decode error
//! - a waiter that settles the lifecycle outcome once the child exits
//!
//! A protocol violation from the child never kills it. The caller sees the
//! error on the message queue and decides.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use netstrand_frame::FrameConfig;
use netstrand_transport::{spawn_with_pipes, wait_exited, ExitOutcome, TransportError};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ChannelError, Result};
use crate::json::{MessageReader, MessageWriter};
use crate::outcome::{Lifecycle, Outcome};

/// What a child's stdout or stderr is connected to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdioMode {
    /// Share the parent's stream.
    #[default]
    Inherit,
    /// Discard.
    Null,
}

impl StdioMode {
    fn to_stdio(self) -> Stdio {
        match self {
            Self::Inherit => Stdio::inherit(),
            Self::Null => Stdio::null(),
        }
    }
}

/// Options for [`ChildChannel::spawn`].
#[derive(Debug, Clone, Default)]
pub struct SpawnConfig {
    /// Largest payload accepted in either direction. `None` means unbounded.
    pub max_payload_size: Option<usize>,
    pub stdout: StdioMode,
    pub stderr: StdioMode,
    /// Extra environment variables for the child.
    pub env: Vec<(OsString, OsString)>,
    pub current_dir: Option<PathBuf>,
    /// Label for logs and errors. Defaults to the program's file name.
    pub name: Option<String>,
}

impl SpawnConfig {
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = Some(max_payload_size);
        self
    }

    pub fn with_stdout(mut self, mode: StdioMode) -> Self {
        self.stdout = mode;
        self
    }

    pub fn with_stderr(mut self, mode: StdioMode) -> Self {
        self.stderr = mode;
        self
    }

    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
        }
    }
}

/// A running child process and its message channel.
pub struct ChildChannel {
    name: String,
    pid: u32,
    writer: Option<MessageWriter<File>>,
    messages: Receiver<Result<Value>>,
    child: Arc<Mutex<Child>>,
    lifecycle: Arc<Lifecycle>,
}

impl ChildChannel {
    /// Launch `program` with fd3/fd4 wired to a message channel.
    ///
    /// A program that cannot be started fails here with
    /// [`ChannelError::ProcessLaunch`]; nothing is left running.
    pub fn spawn<I, S>(program: impl AsRef<OsStr>, args: I, config: SpawnConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let name = config.name.clone().unwrap_or_else(|| {
            Path::new(program)
                .file_name()
                .unwrap_or(program)
                .to_string_lossy()
                .into_owned()
        });

        let mut command = Command::new(program);
        command
            .args(args)
            .stdout(config.stdout.to_stdio())
            .stderr(config.stderr.to_stdio())
            .envs(config.env.iter().cloned());
        if let Some(dir) = &config.current_dir {
            command.current_dir(dir);
        }

        let spawned = spawn_with_pipes(&mut command).map_err(|err| match err {
            TransportError::Spawn { program, source } => {
                ChannelError::ProcessLaunch { program, source }
            }
            other => ChannelError::Transport(other),
        })?;

        let pid = spawned.child.id();
        let child = Arc::new(Mutex::new(spawned.child));
        let lifecycle = Arc::new(Lifecycle::new());
        let (tx, messages) = mpsc::channel();

        let frame_config = config.frame_config();
        let reader = MessageReader::with_config(spawned.from_child, frame_config.clone());
        let started = start_reader(&name, pid, reader, tx).and_then(|()| {
            start_waiter(&name, pid, Arc::clone(&child), Arc::clone(&lifecycle))
        });
        if let Err(err) = started {
            let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = child.kill();
            let _ = child.wait();
            return Err(ChannelError::Transport(TransportError::Io(err)));
        }

        info!(name = %name, pid, "child channel open");
        Ok(Self {
            name,
            pid,
            writer: Some(MessageWriter::with_config(spawned.to_child, frame_config)),
            messages,
            child,
            lifecycle,
        })
    }

    /// Send one message to the child (fd3).
    ///
    /// Messages arrive in call order. Once the child has exited, this fails
    /// with an I/O error rather than dropping the message.
    pub fn send<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(ChannelError::Disconnected);
        };
        writer.send(message).inspect_err(|err| {
            if matches!(err, ChannelError::Frame(_)) {
                warn!(name = %self.name, pid = self.pid, error = %err, "write to child failed");
            }
        })
    }

    /// Close fd3 so the child sees end of input. Later sends fail with
    /// [`ChannelError::Disconnected`].
    pub fn close_input(&mut self) {
        if self.writer.take().is_some() {
            debug!(name = %self.name, pid = self.pid, "closed child input");
        }
    }

    /// Detach the fd3 writer, e.g. to feed the child from another thread
    /// while this one keeps receiving. Later [`send`](Self::send) calls fail
    /// with [`ChannelError::Disconnected`]; dropping the writer closes fd3.
    pub fn take_input(&mut self) -> Option<MessageWriter<File>> {
        self.writer.take()
    }

    /// Block for the next message from the child.
    ///
    /// `Ok(None)` once the child closed fd4 cleanly. A decode error is
    /// returned once and ends the stream.
    pub fn recv(&self) -> Result<Option<Value>> {
        match self.messages.recv() {
            Ok(message) => message.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Like [`recv`](Self::recv) with a deadline. `Ok(None)` means nothing
    /// arrived in time; a finished stream is [`ChannelError::Disconnected`].
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Value>> {
        match self.messages.recv_timeout(timeout) {
            Ok(message) => message.map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }

    /// Iterate over messages from the child until the stream ends.
    pub fn messages(&self) -> impl Iterator<Item = Result<Value>> + '_ {
        self.messages.iter()
    }

    /// Kill the child.
    ///
    /// Does not settle the outcome itself; the exit it causes does. Killing a
    /// child that was already reaped is a no-op.
    pub fn terminate(&self) -> Result<()> {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        // The waiter settles while holding this lock, so a settled outcome
        // means the pid may already be recycled.
        if self.lifecycle.get().is_some() {
            return Ok(());
        }
        info!(name = %self.name, pid = self.pid, "terminating child");
        child
            .kill()
            .map_err(|err| ChannelError::Transport(TransportError::Io(err)))
    }

    /// The outcome, if already settled.
    pub fn outcome(&self) -> Option<Outcome> {
        self.lifecycle.get()
    }

    /// Block until the outcome settles.
    pub fn wait(&self) -> Outcome {
        self.lifecycle.wait()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        self.lifecycle.wait_timeout(timeout)
    }

    /// Block until exit; anything but a zero exit code is
    /// [`ChannelError::ProcessExit`].
    pub fn wait_success(&self) -> Outcome {
        let outcome = self.wait()?;
        if outcome.success() {
            Ok(outcome)
        } else {
            Err(Arc::new(ChannelError::ProcessExit(outcome)))
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn start_reader(
    name: &str,
    pid: u32,
    mut reader: MessageReader<File>,
    tx: Sender<Result<Value>>,
) -> std::io::Result<()> {
    let label = name.to_string();
    thread::Builder::new()
        .name(format!("netstrand-read-{pid}"))
        .spawn(move || loop {
            match reader.recv() {
                Ok(Some(message)) => {
                    if tx.send(Ok(message)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!(name = %label, pid, "child closed message output");
                    break;
                }
                Err(err) => {
                    warn!(name = %label, pid, error = %err, "child message stream failed");
                    let _ = tx.send(Err(err));
                    break;
                }
            }
        })?;
    Ok(())
}

fn start_waiter(
    name: &str,
    pid: u32,
    child: Arc<Mutex<Child>>,
    lifecycle: Arc<Lifecycle>,
) -> std::io::Result<()> {
    let label = name.to_string();
    thread::Builder::new()
        .name(format!("netstrand-wait-{pid}"))
        .spawn(move || {
            // Reap and settle only under the lock `terminate` takes, so it
            // never signals a recycled pid.
            let exited = wait_exited(pid);
            let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
            let outcome = match exited.and_then(|()| child.wait()) {
                Ok(status) => {
                    let outcome = ExitOutcome::from_status(status);
                    info!(name = %label, pid, %outcome, "child exited");
                    Ok(outcome)
                }
                Err(err) => {
                    warn!(name = %label, pid, error = %err, "failed to observe child exit");
                    Err(Arc::new(ChannelError::Transport(TransportError::Io(err))))
                }
            };
            lifecycle.settle(outcome);
        })?;
    Ok(())
}
