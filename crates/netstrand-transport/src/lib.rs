//! Pipe plumbing for subprocess message channels.
//!
//! A parent launches a child with two extra descriptors beyond stdio:
//! - fd 3: parent → child
//! - fd 4: child → parent
//!
//! This is the lowest layer of netstrand. It knows nothing about framing;
//! it hands out plain [`std::fs::File`] ends that higher layers wrap.
//! Unix only.

pub mod error;

#[cfg(unix)]
pub mod inherited;
#[cfg(unix)]
pub mod pipe;
#[cfg(unix)]
pub mod process;
#[cfg(unix)]
pub mod spawn;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use inherited::{take_inherited, InheritedPipes};
#[cfg(unix)]
pub use pipe::{pipe, Pipe};
#[cfg(unix)]
pub use process::{wait_exited, ExitOutcome};
#[cfg(unix)]
pub use spawn::{spawn_with_pipes, SpawnedChild};

/// Descriptor number the child reads parent messages from.
pub const CHILD_INPUT_FD: i32 = 3;

/// Descriptor number the child writes its messages to.
pub const CHILD_OUTPUT_FD: i32 = 4;
