use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use netstrand_channel::StdioMode;
use netstrand_frame::TextEncoding;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod serve_echo;
pub mod spawn;
pub mod split;
pub mod version;

/// Environment variable backing every `--max-payload` flag.
pub const MAX_PAYLOAD_ENV: &str = "NETSTRAND_MAX_PAYLOAD";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Frame stdin (or --data) as netstrings on stdout.
    Encode(EncodeArgs),
    /// Decode netstrings from stdin and print each payload.
    Decode(DecodeArgs),
    /// Split stdin into delimiter-terminated lines.
    Split(SplitArgs),
    /// Launch a program with a message channel on fd3/fd4.
    Spawn(SpawnArgs),
    /// Child mode: echo every message from fd3 back on fd4.
    ServeEcho(ServeEchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Split(args) => split::run(args, format),
        Command::Spawn(args) => spawn::run(args, format),
        Command::ServeEcho(args) => serve_echo::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Frame this string instead of reading stdin.
    #[arg(long, conflicts_with = "lines")]
    pub data: Option<String>,
    /// Emit one frame per stdin line (newline stripped).
    #[arg(long)]
    pub lines: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Reject payloads larger than this many bytes.
    #[arg(long, env = MAX_PAYLOAD_ENV)]
    pub max_payload: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Delimiter text. Default: newline.
    #[arg(long, conflicts_with = "hex_delimiter")]
    pub delimiter: Option<String>,
    /// Delimiter bytes as hex, e.g. 0d0a.
    #[arg(long)]
    pub hex_delimiter: Option<String>,
    /// Encoding for --delimiter and for decoding lines as text.
    #[arg(long, default_value = "utf8", value_parser = parse_encoding)]
    pub encoding: TextEncoding,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum ChildStdio {
    #[default]
    Inherit,
    Null,
}

impl From<ChildStdio> for StdioMode {
    fn from(value: ChildStdio) -> Self {
        match value {
            ChildStdio::Inherit => StdioMode::Inherit,
            ChildStdio::Null => StdioMode::Null,
        }
    }
}

#[derive(Args, Debug)]
pub struct SpawnArgs {
    /// Program to launch.
    pub program: PathBuf,
    /// Arguments passed to the program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// JSON array to send to the child (repeatable, sent in order).
    #[arg(long = "message", short = 'm', value_name = "JSON")]
    pub messages: Vec<String>,
    /// Keep fd3 open after the messages are sent.
    #[arg(long)]
    pub keep_open: bool,
    /// Reject payloads larger than this many bytes, in both directions.
    #[arg(long, env = MAX_PAYLOAD_ENV)]
    pub max_payload: Option<usize>,
    /// Kill the child if it runs longer than this (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Where the child's stdout goes.
    #[arg(long, value_enum, default_value = "inherit")]
    pub child_stdout: ChildStdio,
}

#[derive(Args, Debug)]
pub struct ServeEchoArgs {
    /// Reject payloads larger than this many bytes.
    #[arg(long, env = MAX_PAYLOAD_ENV)]
    pub max_payload: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_encoding(input: &str) -> Result<TextEncoding, String> {
    input.parse::<TextEncoding>().map_err(|err| err.to_string())
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
