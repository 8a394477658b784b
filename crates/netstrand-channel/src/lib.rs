//! JSON-array messages over netstrings, and subprocess channels built on them.
//!
//! Each message is one JSON array carried in one netstring payload. A
//! [`ChildChannel`] launches a program with a dedicated pipe pair:
//! - fd3: parent to child
//! - fd4: child to parent
//!
//! A program written with this crate picks up its side with
//! [`ChildEndpoint::inherited`].

pub mod error;
pub mod json;

#[cfg(unix)]
pub mod child;
#[cfg(unix)]
pub mod outcome;
#[cfg(unix)]
pub mod subprocess;

pub use error::{ChannelError, Result};
pub use json::{
    decode_message, encode_message, to_message, MessageDecoder, MessageEncoder, MessageReader,
    MessageWriter, Messages,
};

#[cfg(unix)]
pub use child::ChildEndpoint;
#[cfg(unix)]
pub use netstrand_transport::ExitOutcome;
#[cfg(unix)]
pub use outcome::Outcome;
#[cfg(unix)]
pub use subprocess::{ChildChannel, SpawnConfig, StdioMode};
