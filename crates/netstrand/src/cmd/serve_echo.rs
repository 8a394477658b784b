use netstrand_channel::ChildEndpoint;
use netstrand_frame::FrameConfig;
use tracing::info;

use crate::cmd::ServeEchoArgs;
use crate::exit::{channel_error, CliResult, SUCCESS};

pub fn run(args: ServeEchoArgs) -> CliResult<i32> {
    let config = FrameConfig {
        max_payload_size: args.max_payload,
    };
    let mut endpoint = ChildEndpoint::inherited_with_config(config)
        .map_err(|err| channel_error("claim message descriptors failed", err))?;

    let mut echoed = 0usize;
    while let Some(message) = endpoint
        .recv()
        .map_err(|err| channel_error("receive failed", err))?
    {
        endpoint
            .send(&message)
            .map_err(|err| channel_error("send failed", err))?;
        echoed = echoed.saturating_add(1);
    }

    info!(echoed, "input closed");
    Ok(SUCCESS)
}
