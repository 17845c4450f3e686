//! Session driver demonstration
//!
//! Drives a playback session against a scripted in-process engine and prints
//! every event the session publishes.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run -p core-playback --example session_demo
//!
//! # JSON format
//! cargo run -p core-playback --example session_demo -- json
//!
//! # With custom filter
//! cargo run -p core-playback --example session_demo -- pretty "core_playback=trace"
//! ```

use bridge_traits::effects::NoEffects;
use bridge_traits::engine::{
    AudioAttributes, AudioSessionId, DiscontinuityReason, EngineEvent, EngineOptions,
    EngineState, MediaEngine, MediaEngineFactory, PlaybackParameters, RepeatMode,
};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::source::SourceNode;
use bridge_traits::time::{LogLevel, SystemClock};
use core_playback::driver::{engine_event_channel, DriverBridges, EngineEventSender, SessionDriver};
use core_playback::{PlayerId, SourceDescriptor};
use core_runtime::config::SessionConfig;
use core_runtime::events::{event_channel, SessionEvent};
use core_runtime::logging::{init_logging, strip_uri, LogFormat, LoggingConfig};
use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Engine that pretends every item is three minutes long and becomes ready
/// right after preparation.
struct ScriptedEngine {
    events: EngineEventSender,
    state: EngineState,
    play_when_ready: bool,
    index: usize,
    item_count: usize,
    position_ms: i64,
    parameters: PlaybackParameters,
}

impl ScriptedEngine {
    fn report(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            warn!("session driver gone, engine event dropped");
        }
    }
}

impl MediaEngine for ScriptedEngine {
    fn set_source(&mut self, source: Arc<SourceNode>) {
        self.item_count = source.item_count();
        self.index = 0;
        self.position_ms = 0;
    }

    fn prepare(&mut self) {
        self.state = EngineState::Ready;
        self.report(EngineEvent::TimelineChanged);
        self.report(EngineEvent::StateChanged(EngineState::Buffering));
        self.report(EngineEvent::StateChanged(EngineState::Ready));
    }

    fn stop(&mut self) {
        self.state = EngineState::Idle;
    }

    fn release(&mut self) {
        info!("engine released");
    }

    fn seek_to(&mut self, index: usize, position_ms: Option<i64>) -> BridgeResult<()> {
        if index >= self.item_count {
            return Err(BridgeError::IllegalSeekPosition { index });
        }
        self.index = index;
        self.position_ms = position_ms.unwrap_or(0);
        self.report(EngineEvent::PositionDiscontinuity(DiscontinuityReason::Seek));
        self.report(EngineEvent::StateChanged(EngineState::Ready));
        Ok(())
    }

    fn seek_to_next_item(&mut self) -> BridgeResult<()> {
        self.seek_to(self.index + 1, Some(0))
    }

    fn play_when_ready(&self) -> bool {
        self.play_when_ready
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.play_when_ready = play_when_ready;
    }

    fn playback_state(&self) -> EngineState {
        self.state
    }

    fn current_position_ms(&self) -> i64 {
        self.position_ms
    }

    fn buffered_position_ms(&self) -> i64 {
        self.position_ms + 30_000
    }

    fn duration_ms(&self) -> Option<i64> {
        Some(180_000)
    }

    fn current_item_index(&self) -> usize {
        self.index
    }

    fn item_count(&self) -> usize {
        self.item_count
    }

    fn has_next_item(&self) -> bool {
        self.index + 1 < self.item_count
    }

    fn timeline_window_count(&self) -> usize {
        self.item_count
    }

    fn audio_session_id(&self) -> Option<AudioSessionId> {
        Some(AudioSessionId(42))
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn playback_parameters(&self) -> PlaybackParameters {
        self.parameters
    }

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters) {
        self.parameters = parameters;
    }

    fn set_skip_silence_enabled(&mut self, _enabled: bool) {}

    fn set_repeat_mode(&mut self, _mode: RepeatMode) {}

    fn set_shuffle_mode_enabled(&mut self, _enabled: bool) {}

    fn set_shuffle_order(&mut self, _source_id: &str, _order: &[usize]) {}

    fn set_audio_attributes(&mut self, _attributes: AudioAttributes) {}
}

struct ScriptedEngineFactory {
    events: EngineEventSender,
}

impl MediaEngineFactory for ScriptedEngineFactory {
    fn create(&self, options: &EngineOptions) -> BridgeResult<Box<dyn MediaEngine>> {
        info!(?options, "creating scripted engine");
        Ok(Box::new(ScriptedEngine {
            events: self.events.clone(),
            state: EngineState::Idle,
            play_when_ready: false,
            index: 0,
            item_count: 0,
            position_ms: 0,
            parameters: PlaybackParameters::default(),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut logging = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug)
        .with_spans(true)
        .with_target(true);
    if let Some(filter) = args.get(2) {
        logging = logging.with_filter(filter.clone());
    }
    init_logging(logging)?;

    let (engine_tx, engine_rx) = engine_event_channel();
    let (sink, mut events) = event_channel();
    let (driver, handle) = SessionDriver::new(
        PlayerId::new(),
        SessionConfig::builder().user_agent("session-demo/1.0").build()?,
        DriverBridges {
            engine_factory: Arc::new(ScriptedEngineFactory { events: engine_tx }),
            effect_factory: Arc::new(NoEffects),
            clock: Arc::new(SystemClock),
        },
        engine_rx,
        sink,
    )?;
    let task = driver.spawn();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Snapshot(snapshot) => info!(
                    state = ?snapshot.processing_state,
                    position_micros = snapshot.update_position_micros,
                    index = ?snapshot.current_index,
                    "snapshot"
                ),
                SessionEvent::Error(error) => warn!(code = %error.code, "{}", error.message),
            }
        }
        info!("event stream closed");
    });

    let uri = "https://radio.example.com/stream.mp3?token=abc123";
    info!(uri = %strip_uri(uri), "loading playlist");
    let descriptor = SourceDescriptor::from_json(json!({
        "type": "concatenating",
        "id": "demo-playlist",
        "useLazyPreparation": true,
        "children": [
            { "type": "progressive", "id": "intro", "uri": uri },
            { "type": "silence", "id": "gap", "duration": 2_000_000 },
            {
                "type": "clipping",
                "id": "outro",
                "start": 10_000_000,
                "end": 40_000_000,
                "child": { "type": "progressive", "id": "outro-full", "uri": uri }
            }
        ]
    }))?;

    let response = handle.load(descriptor, None, None).await?;
    info!(duration_micros = ?response.duration_micros, "loaded");

    handle.set_speed(1.25).await?;
    handle.seek(Some(30_000_000), Some(2)).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.dispose().await?;
    task.await?;
    printer.await?;
    Ok(())
}
