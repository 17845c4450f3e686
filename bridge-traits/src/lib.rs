//! # Host Bridge Traits
//!
//! Capability contracts between the playback session core and the host
//! platform.
//!
//! ## Overview
//!
//! The session controller never decodes or renders audio itself. It drives a
//! host-provided media engine, attaches host-provided audio effects, and
//! reads wall-clock time from an injectable clock. Each of those is a trait in
//! this crate, implemented once per platform (ExoPlayer on Android, AVFoundation
//! on iOS, scripted doubles in tests).
//!
//! ## Traits
//!
//! ### Engine
//! - [`MediaEngine`](engine::MediaEngine) - Synchronous control surface of the render pipeline
//! - [`MediaEngineFactory`](engine::MediaEngineFactory) - Lazy engine construction from [`EngineOptions`](engine::EngineOptions)
//! - [`SourceNode`](source::SourceNode) - Resolved source graph the engine consumes
//!
//! ### Effects
//! - [`AudioEffectFactory`](effects::AudioEffectFactory) - Creates effects bound to an audio session
//! - [`LoudnessEnhancer`](effects::LoudnessEnhancer), [`Equalizer`](effects::Equalizer)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for snapshot timestamps and deterministic tests
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Units
//!
//! Engine control calls use milliseconds, effect gains use thousandths of a
//! decibel, and source graphs use microseconds. The session performs every
//! conversion to and from its public microsecond surface.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Host adapters
//! should map native exceptions into it with an actionable message.
//!
//! ## Thread Safety
//!
//! Engines and effect handles are `Send` so they can live on the session's
//! driver task; factories are shared and must be `Send + Sync`. See
//! [`platform`] for the `wasm32` relaxation.

pub mod effects;
pub mod engine;
pub mod error;
pub mod platform;
pub mod source;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use effects::{AudioEffect, AudioEffectFactory, EffectType, Equalizer, LoudnessEnhancer, NoEffects};
pub use engine::{
    AudioAttributes, AudioSessionId, DiscontinuityReason, EngineErrorKind, EngineEvent,
    EngineOptions, EngineState, IcyHeaders, IcyInfo, LiveSpeedControlOptions, LoadControlOptions,
    MediaEngine, MediaEngineFactory, PlaybackParameters, RepeatMode,
};
pub use source::{ExtractorOptions, HttpDataSourceSpec, SourceKind, SourceNode};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
