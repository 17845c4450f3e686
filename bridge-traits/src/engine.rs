//! Media engine bridge.
//!
//! The engine is the host's decode/render pipeline (ExoPlayer on Android, an
//! AVPlayer wrapper on iOS, a test double in CI). The session drives it with
//! plain synchronous calls and learns about progress exclusively through
//! [`EngineEvent`] values the host pushes back. None of the control methods
//! block on media I/O; completion is always reported later by an event.
//!
//! Times crossing this boundary are **milliseconds** (`i64`), the engine's
//! native unit. The session converts to the microsecond public surface in one
//! place and never passes microseconds here, with the single exception of the
//! source graph (see [`crate::source`]).

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
    source::SourceNode,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque audio output context assigned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioSessionId(pub i32);

impl fmt::Display for AudioSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine-side playback state, as reported by the pipeline itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Why the playback position jumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscontinuityReason {
    /// The engine moved to the next item on its own.
    AutoTransition,
    Seek,
    SeekAdjustment,
    Skip,
    Removal,
    Internal,
}

/// Failure class of an engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineErrorKind {
    /// Loading or parsing the media failed.
    Source,
    /// Decoding or output failed.
    Renderer,
    Unexpected,
}

impl EngineErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            EngineErrorKind::Source => "source",
            EngineErrorKind::Renderer => "renderer",
            EngineErrorKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// ICY in-stream title metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IcyInfo {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// ICY response headers of an internet radio stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcyHeaders {
    pub bitrate: Option<i32>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub metadata_interval: Option<i32>,
    pub url: Option<String>,
    pub is_public: Option<bool>,
}

/// Callback raised by the engine. Delivered to the session in the order the
/// engine produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    /// The set or shape of timeline items changed, e.g. after preparation.
    TimelineChanged,
    PositionDiscontinuity(DiscontinuityReason),
    Error {
        kind: EngineErrorKind,
        message: String,
    },
    AudioSessionIdChanged(Option<AudioSessionId>),
    Metadata(IcyInfo),
    /// ICY headers found on the currently selected tracks.
    TracksChanged(Vec<IcyHeaders>),
}

/// Speed and pitch applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParameters {
    pub speed: f32,
    pub pitch: f32,
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

/// Output routing attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAttributes {
    pub content_type: i32,
    pub flags: i32,
    pub usage: i32,
}

/// Buffering thresholds, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadControlOptions {
    pub min_buffer_ms: i32,
    pub max_buffer_ms: i32,
    pub buffer_for_playback_ms: i32,
    pub buffer_for_playback_after_rebuffer_ms: i32,
    pub back_buffer_ms: i32,
    pub prioritize_time_over_size_thresholds: bool,
    pub target_buffer_bytes: Option<i32>,
}

/// Live-edge speed control, times in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSpeedControlOptions {
    pub fallback_min_playback_speed: f32,
    pub fallback_max_playback_speed: f32,
    pub min_update_interval_ms: i64,
    pub proportional_control_factor: f32,
    pub max_live_offset_error_ms_for_unit_speed: i64,
    pub target_live_offset_increment_on_rebuffer_ms: i64,
    pub min_possible_live_offset_smoothing_factor: f32,
}

/// Construction options handed to [`MediaEngineFactory::create`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOptions {
    pub load_control: Option<LoadControlOptions>,
    pub live_speed_control: Option<LiveSpeedControlOptions>,
    pub offload_scheduling_enabled: bool,
}

/// Media engine trait
///
/// Control surface of the host's playback pipeline. Every method must return
/// promptly; long-running work (preparation, seeking, buffering) finishes
/// asynchronously and is reported through [`EngineEvent`]s.
///
/// Implementations must tolerate any call order the session produces, in
/// particular `stop()` on an idle engine and `release()` exactly once at the
/// end of the session.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::engine::{EngineEvent, MediaEngine};
///
/// fn on_prepared(engine: &dyn MediaEngine, report: impl Fn(EngineEvent)) {
///     // host adapters forward pipeline callbacks as events
///     report(EngineEvent::StateChanged(engine.playback_state()));
/// }
/// ```
pub trait MediaEngine: PlatformSend {
    /// Replace the engine's source with the given graph. Does not prepare it.
    fn set_source(&mut self, source: Arc<SourceNode>);

    /// Start preparing the current source.
    fn prepare(&mut self);

    /// Stop playback and drop buffered media, keeping the engine reusable.
    fn stop(&mut self);

    /// Release every native resource. The engine is not used afterwards.
    fn release(&mut self);

    /// Seek to `position_ms` within timeline item `index`. `None` means the
    /// item's default position.
    fn seek_to(&mut self, index: usize, position_ms: Option<i64>) -> Result<()>;

    /// Seek to the default position of the next timeline item.
    fn seek_to_next_item(&mut self) -> Result<()>;

    fn play_when_ready(&self) -> bool;

    fn set_play_when_ready(&mut self, play_when_ready: bool);

    fn playback_state(&self) -> EngineState;

    fn current_position_ms(&self) -> i64;

    fn buffered_position_ms(&self) -> i64;

    /// Duration of the current item, `None` while unknown.
    fn duration_ms(&self) -> Option<i64>;

    fn current_item_index(&self) -> usize;

    /// Number of items in the current playlist.
    fn item_count(&self) -> usize;

    fn has_next_item(&self) -> bool;

    /// Number of windows in the engine's current timeline.
    fn timeline_window_count(&self) -> usize;

    fn audio_session_id(&self) -> Option<AudioSessionId>;

    fn set_volume(&mut self, volume: f32);

    fn playback_parameters(&self) -> PlaybackParameters;

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters);

    fn set_skip_silence_enabled(&mut self, enabled: bool);

    fn set_repeat_mode(&mut self, mode: RepeatMode);

    fn set_shuffle_mode_enabled(&mut self, enabled: bool);

    /// Apply a shuffle order to the concatenating node with the given id.
    fn set_shuffle_order(&mut self, source_id: &str, order: &[usize]);

    /// Rejected by most engines while a source is being prepared; the session
    /// defers the call in that case.
    fn set_audio_attributes(&mut self, attributes: AudioAttributes);
}

/// Creates engines on demand.
///
/// The factory is invoked lazily by the first command of a session. Host
/// adapters usually capture the session's engine event sender so the engine
/// they build can report back.
pub trait MediaEngineFactory: PlatformSendSync {
    fn create(&self, options: &EngineOptions) -> Result<Box<dyn MediaEngine>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        assert_eq!(EngineErrorKind::Source.code(), "source");
        assert_eq!(EngineErrorKind::Renderer.to_string(), "renderer");
        assert_eq!(EngineErrorKind::Unexpected.code(), "unexpected");
    }

    #[test]
    fn test_audio_session_id_serializes_transparently() {
        let json = serde_json::to_string(&AudioSessionId(17)).unwrap();
        assert_eq!(json, "17");
    }

    #[test]
    fn test_icy_headers_camel_case() {
        let headers = IcyHeaders {
            metadata_interval: Some(16_000),
            is_public: Some(true),
            ..Default::default()
        };
        let value = serde_json::to_value(&headers).unwrap();
        assert_eq!(value["metadataInterval"], 16_000);
        assert_eq!(value["isPublic"], true);
    }
}
