//! # Core Runtime Module
//!
//! Infrastructure shared by every playback session:
//! - Logging and tracing setup
//! - Session configuration and validation
//! - The snapshot/error event stream delivered to subscribers
//!
//! ## Overview
//!
//! Nothing in this crate knows about engine callbacks or pending requests;
//! it only defines what a session is configured with and what it publishes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{EffectDescriptor, SessionConfig};
pub use error::{Error, Result};
pub use events::{
    event_channel, ErrorEvent, EventSink, EventStream, PlaybackSnapshot, ProcessingState,
    SessionEvent, StreamMetadata,
};
