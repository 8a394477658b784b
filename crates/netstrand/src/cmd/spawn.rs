use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use netstrand_channel::{
    to_message, ChannelError, ChildChannel, MessageWriter, SpawnConfig, StdioMode,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, SpawnArgs};
use crate::exit::{channel_error, outcome_code, CliError, CliResult, INTERNAL, TIMEOUT, USAGE};
use crate::output::{OutputFormat, Printer};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why the receive loop stopped early.
enum Stop {
    Interrupted,
    TimedOut,
    Invalid(ChannelError),
}

pub fn run(args: SpawnArgs, format: OutputFormat) -> CliResult<i32> {
    let messages = parse_messages(&args.messages)?;
    let deadline = args
        .timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|timeout| Instant::now() + timeout);

    let mut config = SpawnConfig::default().with_stdout(StdioMode::from(args.child_stdout));
    if let Some(max) = args.max_payload {
        config = config.with_max_payload_size(max);
    }

    let mut channel = ChildChannel::spawn(&args.program, &args.args, config)
        .map_err(|err| channel_error("spawn failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    // fd3 is fed from its own thread: a child that never reads must not
    // block the timeout and Ctrl-C checks below.
    let (release, hold) = mpsc::channel();
    if let Err(err) = start_feeder(
        channel.take_input(),
        messages,
        args.keep_open.then_some(hold),
    ) {
        let _ = channel.terminate();
        return Err(err);
    }
    let mut release = Some(release);

    let mut printer = Printer::new(format);
    let stop = receive(&channel, &mut printer, &running, deadline, &mut release);
    printer.finish();
    drop(release);

    if stop.is_some() {
        info!(pid = channel.pid(), "stopping child early");
        channel
            .terminate()
            .map_err(|err| channel_error("terminate failed", err))?;
    }

    let outcome = channel
        .wait()
        .map_err(|err| CliError::new(INTERNAL, format!("wait failed: {err}")))?;
    printer.outcome(outcome);

    match stop {
        None | Some(Stop::Interrupted) => Ok(outcome_code(outcome)),
        Some(Stop::TimedOut) => Err(CliError::new(TIMEOUT, "child timed out")),
        Some(Stop::Invalid(err)) => Err(channel_error("receive failed", err)),
    }
}

/// Print messages until the child has exited, or until an early stop.
fn receive(
    channel: &ChildChannel,
    printer: &mut Printer,
    running: &AtomicBool,
    deadline: Option<Instant>,
    release: &mut Option<Sender<()>>,
) -> Option<Stop> {
    let mut index = 0usize;
    let mut open = true;
    loop {
        if !running.load(Ordering::SeqCst) {
            return Some(Stop::Interrupted);
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(Stop::TimedOut);
        }

        if !open {
            if channel.wait_timeout(POLL_INTERVAL).is_some() {
                return None;
            }
            continue;
        }

        match channel.recv_timeout(POLL_INTERVAL) {
            Ok(Some(message)) => {
                printer.message(index, &message);
                index = index.saturating_add(1);
            }
            Ok(None) => continue,
            Err(ChannelError::Disconnected) => {
                // Output is done; a child still reading fd3 needs EOF to exit.
                release.take();
                open = false;
            }
            Err(err) => return Some(Stop::Invalid(err)),
        }
    }
}

/// Send `messages` to the child on a helper thread. With `hold`, fd3 stays
/// open until its sender is dropped.
fn start_feeder(
    input: Option<MessageWriter<File>>,
    messages: Vec<Value>,
    hold: Option<Receiver<()>>,
) -> CliResult<()> {
    let Some(mut input) = input else {
        return Ok(());
    };
    thread::Builder::new()
        .name("netstrand-feed".to_string())
        .spawn(move || {
            for message in &messages {
                // A child that exits without reading is reported through its outcome.
                if let Err(err) = input.send(message) {
                    warn!(error = %err, "stopped sending to child");
                    return;
                }
            }
            if let Some(hold) = hold {
                let _ = hold.recv();
            }
            debug!(sent = messages.len(), "closing child input");
        })
        .map_err(|err| CliError::new(INTERNAL, format!("feeder thread setup failed: {err}")))?;
    Ok(())
}

fn parse_messages(raw: &[String]) -> CliResult<Vec<Value>> {
    raw.iter()
        .map(|text| {
            let value: Value = serde_json::from_str(text)
                .map_err(|err| CliError::new(USAGE, format!("invalid --message {text}: {err}")))?;
            to_message(&value)
                .map_err(|err| CliError::new(USAGE, format!("invalid --message {text}: {err}")))
        })
        .collect()
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
