use std::io::{self, Read};

use netstrand_frame::{Delimiter, NetstringWriter, SplitReader};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let mut writer = NetstringWriter::new(io::stdout().lock());

    if let Some(data) = args.data {
        writer
            .send(data.as_bytes())
            .map_err(|err| frame_error("write failed", err))?;
        return Ok(SUCCESS);
    }

    if args.lines {
        for line in SplitReader::new(io::stdin().lock(), Delimiter::default()) {
            let line = line.map_err(|err| io_error("read failed", err))?;
            let line = line.strip_suffix(b"\n").unwrap_or(&line[..]);
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            writer
                .send(line)
                .map_err(|err| frame_error("write failed", err))?;
        }
        return Ok(SUCCESS);
    }

    let mut payload = Vec::new();
    io::stdin()
        .lock()
        .read_to_end(&mut payload)
        .map_err(|err| io_error("read failed", err))?;
    writer
        .send(&payload)
        .map_err(|err| frame_error("write failed", err))?;
    Ok(SUCCESS)
}
