use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use netstrand_channel::ExitOutcome;
use netstrand_frame::bytecodec::hex_encode;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PayloadOutput<'a> {
    kind: &'a str,
    index: usize,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hex: Option<String>,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'a str,
    index: usize,
    message: &'a Value,
}

#[derive(Serialize)]
struct OutcomeOutput {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal: Option<i32>,
    success: bool,
}

/// Prints records as they arrive. Tables are collected and printed by
/// [`Printer::finish`].
pub struct Printer {
    format: OutputFormat,
    table: Option<Table>,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            table: None,
        }
    }

    /// One byte record: a decoded payload or a split line.
    pub fn bytes(&mut self, kind: &str, index: usize, data: &[u8]) {
        let text = std::str::from_utf8(data).ok();
        match self.format {
            OutputFormat::Json => {
                let out = PayloadOutput {
                    kind,
                    index,
                    size: data.len(),
                    text,
                    hex: text.is_none().then(|| hex_encode(data)),
                };
                print_json(&out);
            }
            OutputFormat::Table => {
                self.row(
                    &["INDEX", "SIZE", "DATA"],
                    vec![index.to_string(), data.len().to_string(), preview(data)],
                );
            }
            OutputFormat::Pretty => {
                println!("{kind} #{index} size={} data={}", data.len(), preview(data));
            }
            OutputFormat::Raw => print_raw(data),
        }
    }

    /// One JSON message received from a child.
    pub fn message(&mut self, index: usize, message: &Value) {
        match self.format {
            OutputFormat::Json => print_json(&MessageOutput {
                kind: "message",
                index,
                message,
            }),
            OutputFormat::Table => {
                self.row(&["INDEX", "MESSAGE"], vec![index.to_string(), message.to_string()]);
            }
            OutputFormat::Pretty => {
                let body =
                    serde_json::to_string_pretty(message).unwrap_or_else(|_| message.to_string());
                println!("message #{index}: {body}");
            }
            OutputFormat::Raw => println!("{message}"),
        }
    }

    /// The child's lifecycle outcome.
    pub fn outcome(&mut self, outcome: ExitOutcome) {
        match self.format {
            OutputFormat::Json => print_json(&OutcomeOutput {
                kind: "exit",
                code: outcome.code(),
                signal: match outcome {
                    ExitOutcome::Signaled(signal) => Some(signal),
                    ExitOutcome::Exited(_) => None,
                },
                success: outcome.success(),
            }),
            // Keep raw stdout limited to message data.
            OutputFormat::Raw => eprintln!("child {outcome}"),
            OutputFormat::Table | OutputFormat::Pretty => println!("child {outcome}"),
        }
    }

    pub fn finish(&mut self) {
        if let Some(table) = self.table.take() {
            println!("{table}");
        }
    }

    fn row(&mut self, header: &[&str], cells: Vec<String>) {
        self.table
            .get_or_insert_with(|| {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(header.to_vec());
                table
            })
            .add_row(cells);
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.escape_debug().to_string(),
        Err(_) => format!("<binary {} bytes>", data.len()),
    }
}
