//! Workspace facade crate.
//!
//! Re-exports the session controller together with the bridge contracts and
//! runtime infrastructure it is built on, so host applications can depend on
//! `playback-session` alone and enable the documented features.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use core_playback::{PlaybackSession, Result, SessionError};

#[cfg(feature = "driver")]
pub use core_playback::driver::{SessionDriver, SessionHandle};
