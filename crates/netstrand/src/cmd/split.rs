use std::io;

use netstrand_frame::bytecodec::{decode_text, hex_decode};
use netstrand_frame::{Delimiter, SplitReader, TextEncoding};

use crate::cmd::SplitArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_raw, OutputFormat, Printer};

pub fn run(args: SplitArgs, format: OutputFormat) -> CliResult<i32> {
    let delimiter = delimiter(&args).map_err(|err| frame_error("invalid delimiter", err))?;
    let mut printer = Printer::new(format);

    let mut index = 0usize;
    let mut result = Ok(SUCCESS);
    for line in SplitReader::new(io::stdin().lock(), delimiter) {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                result = Err(io_error("read failed", err));
                break;
            }
        };

        // Lines keep their delimiter, so raw output reproduces the input.
        if matches!(format, OutputFormat::Raw) {
            print_raw(&line);
        } else if args.encoding == TextEncoding::Utf8 {
            printer.bytes("line", index, &line);
        } else {
            match decode_text(&line, args.encoding) {
                Ok(text) => printer.bytes("line", index, text.as_bytes()),
                Err(err) => {
                    result = Err(frame_error("decode failed", err));
                    break;
                }
            }
        }
        index = index.saturating_add(1);
    }

    printer.finish();
    result
}

fn delimiter(args: &SplitArgs) -> netstrand_frame::Result<Delimiter> {
    if let Some(hex) = &args.hex_delimiter {
        return Delimiter::sequence(hex_decode(hex)?);
    }
    match &args.delimiter {
        Some(text) => Delimiter::text(text, args.encoding),
        None => Ok(Delimiter::default()),
    }
}
