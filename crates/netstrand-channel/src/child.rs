use std::fs::File;

use netstrand_frame::FrameConfig;
use netstrand_transport::take_inherited;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::json::{MessageReader, MessageWriter};

/// The child's side of a [`crate::ChildChannel`]: messages in on fd3, out on
/// fd4.
pub struct ChildEndpoint {
    reader: MessageReader<File>,
    writer: MessageWriter<File>,
}

impl ChildEndpoint {
    /// Claim fd3 and fd4 inherited from the parent. Succeeds at most once
    /// per process.
    pub fn inherited() -> Result<Self> {
        Self::inherited_with_config(FrameConfig::default())
    }

    pub fn inherited_with_config(config: FrameConfig) -> Result<Self> {
        let pipes = take_inherited()?;
        Ok(Self::from_files(pipes.input, pipes.output, config))
    }

    /// Build an endpoint over explicit files.
    pub fn from_files(input: File, output: File, config: FrameConfig) -> Self {
        Self {
            reader: MessageReader::with_config(input, config.clone()),
            writer: MessageWriter::with_config(output, config),
        }
    }

    /// Block for the next message from the parent. `Ok(None)` at end of input.
    pub fn recv(&mut self) -> Result<Option<Value>> {
        self.reader.recv()
    }

    pub fn send<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
        self.writer.send(message)
    }

    /// Separate the two directions, e.g. to serve them from different threads.
    pub fn split(self) -> (MessageReader<File>, MessageWriter<File>) {
        (self.reader, self.writer)
    }
}
