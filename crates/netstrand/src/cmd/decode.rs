use std::io;

use netstrand_frame::{FrameConfig, NetstringReader};
use tracing::debug;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{OutputFormat, Printer};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = FrameConfig {
        max_payload_size: args.max_payload,
    };
    let mut reader = NetstringReader::with_config(io::stdin().lock(), config);
    let mut printer = Printer::new(format);
    let mut index = 0usize;

    // Payloads decoded before a framing error are still printed.
    let result = loop {
        match reader.read_payload() {
            Ok(Some(payload)) => {
                printer.bytes("payload", index, &payload);
                index = index.saturating_add(1);
            }
            Ok(None) => break Ok(SUCCESS),
            Err(err) => break Err(frame_error("decode failed", err)),
        }
    };
    printer.finish();
    debug!(payloads = index, "decode finished");
    result
}
