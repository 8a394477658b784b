//! Netstring framing and subprocess message channels.
//!
//! # Crate Structure
//!
//! - [`transport`]: pipes and child spawning with fd3/fd4 wired
//! - [`frame`]: netstring codecs, incremental decoders, line splitting
//! - [`channel`]: JSON-array messages and subprocess channels (behind `channel` feature)

/// Re-export transport types.
pub mod transport {
    pub use netstrand_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use netstrand_frame::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use netstrand_channel::*;
}
