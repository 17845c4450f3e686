//! # Playback Session Controller
//!
//! Drives a host media engine on behalf of a client: resolves source graphs,
//! correlates command results with engine callbacks and publishes playback
//! snapshots.
//!
//! ## Overview
//!
//! This crate handles:
//! - Source descriptor parsing and identity-preserving graph resolution
//! - One pending result per command kind, each completed exactly once
//! - Coalesced snapshot delivery (one per command)
//! - Bounded skip-ahead recovery after engine errors
//! - Audio effects bound to the engine's audio session
//! - A generation-guarded buffered-position poll loop
//! - A tokio driver serialising commands and engine callbacks (`driver` feature)

pub mod coalescer;
pub mod correlator;
pub mod effects;
pub mod error;
pub mod poll;
pub mod recovery;
pub mod session;
pub mod source;
pub mod units;

#[cfg(feature = "driver")]
pub mod driver;

pub use correlator::{LoadResponse, PendingResult};
pub use effects::{EqualizerBand, EqualizerParameters};
pub use error::{Result, SessionError};
pub use poll::TickScheduler;
pub use session::{PlaybackSession, PlayerId, SessionBridges};
pub use source::SourceDescriptor;
