//! Scripted fakes shared by the session and driver tests.
//!
//! The fake engine never produces callbacks on its own; tests push
//! `EngineEvent`s into the session to script what a real engine would do.
//! Every engine and effect call is recorded for assertions.

#![allow(dead_code)]

use bridge_traits::effects::{
    AudioEffect, AudioEffectFactory, EffectType, Equalizer, LoudnessEnhancer,
};
use bridge_traits::engine::{
    AudioAttributes, AudioSessionId, EngineOptions, EngineState, MediaEngine,
    MediaEngineFactory, PlaybackParameters, RepeatMode,
};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::source::SourceNode;
use bridge_traits::time::ManualClock;
use core_playback::{PlaybackSession, PlayerId, SessionBridges, SourceDescriptor, TickScheduler};
use core_runtime::config::SessionConfig;
use core_runtime::events::{event_channel, EventStream, PlaybackSnapshot, SessionEvent};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const START_MILLIS: i64 = 1_700_000_000_000;

// ============================================================================
// Fake engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetSource(String),
    Prepare,
    Stop,
    Release,
    SeekTo(usize, Option<i64>),
    SeekToNext,
    SetPlayWhenReady(bool),
    SetVolume(f32),
    SetParameters(PlaybackParameters),
    SetSkipSilence(bool),
    SetRepeatMode(RepeatMode),
    SetShuffleMode(bool),
    SetShuffleOrder(String, Vec<usize>),
    SetAudioAttributes(AudioAttributes),
}

#[derive(Debug)]
pub struct FakeEngineState {
    pub calls: Vec<EngineCall>,
    pub state: EngineState,
    pub play_when_ready: bool,
    pub position_ms: i64,
    pub buffered_ms: i64,
    pub duration_ms: Option<i64>,
    pub index: usize,
    pub item_count: usize,
    pub session_id: Option<AudioSessionId>,
    pub parameters: PlaybackParameters,
    pub created: usize,
    pub options: Option<EngineOptions>,
}

impl Default for FakeEngineState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            state: EngineState::Idle,
            play_when_ready: false,
            position_ms: 0,
            buffered_ms: 0,
            duration_ms: Some(180_000),
            index: 0,
            item_count: 0,
            session_id: Some(AudioSessionId(1)),
            parameters: PlaybackParameters::default(),
            created: 0,
            options: None,
        }
    }
}

impl FakeEngineState {
    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn seeks(&self) -> Vec<(usize, Option<i64>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::SeekTo(index, position) => Some((*index, *position)),
                _ => None,
            })
            .collect()
    }
}

pub type SharedEngine = Arc<Mutex<FakeEngineState>>;

pub struct FakeEngine {
    shared: SharedEngine,
}

impl FakeEngine {
    fn record(&self, call: EngineCall) {
        self.shared.lock().calls.push(call);
    }
}

impl MediaEngine for FakeEngine {
    fn set_source(&mut self, source: Arc<SourceNode>) {
        let mut state = self.shared.lock();
        state.item_count = source.item_count();
        state.calls.push(EngineCall::SetSource(source.id.clone()));
    }

    fn prepare(&mut self) {
        let mut state = self.shared.lock();
        state.state = EngineState::Buffering;
        state.calls.push(EngineCall::Prepare);
    }

    fn stop(&mut self) {
        let mut state = self.shared.lock();
        state.state = EngineState::Idle;
        state.calls.push(EngineCall::Stop);
    }

    fn release(&mut self) {
        self.record(EngineCall::Release);
    }

    fn seek_to(&mut self, index: usize, position_ms: Option<i64>) -> BridgeResult<()> {
        let mut state = self.shared.lock();
        state.calls.push(EngineCall::SeekTo(index, position_ms));
        if state.item_count > 0 && index >= state.item_count {
            return Err(BridgeError::IllegalSeekPosition { index });
        }
        state.index = index;
        state.position_ms = position_ms.unwrap_or(0);
        Ok(())
    }

    fn seek_to_next_item(&mut self) -> BridgeResult<()> {
        let mut state = self.shared.lock();
        state.calls.push(EngineCall::SeekToNext);
        state.index += 1;
        state.position_ms = 0;
        Ok(())
    }

    fn play_when_ready(&self) -> bool {
        self.shared.lock().play_when_ready
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        let mut state = self.shared.lock();
        state.play_when_ready = play_when_ready;
        state.calls.push(EngineCall::SetPlayWhenReady(play_when_ready));
    }

    fn playback_state(&self) -> EngineState {
        self.shared.lock().state
    }

    fn current_position_ms(&self) -> i64 {
        self.shared.lock().position_ms
    }

    fn buffered_position_ms(&self) -> i64 {
        self.shared.lock().buffered_ms
    }

    fn duration_ms(&self) -> Option<i64> {
        self.shared.lock().duration_ms
    }

    fn current_item_index(&self) -> usize {
        self.shared.lock().index
    }

    fn item_count(&self) -> usize {
        self.shared.lock().item_count
    }

    fn has_next_item(&self) -> bool {
        let state = self.shared.lock();
        state.index + 1 < state.item_count
    }

    fn timeline_window_count(&self) -> usize {
        self.shared.lock().item_count
    }

    fn audio_session_id(&self) -> Option<AudioSessionId> {
        self.shared.lock().session_id
    }

    fn set_volume(&mut self, volume: f32) {
        self.record(EngineCall::SetVolume(volume));
    }

    fn playback_parameters(&self) -> PlaybackParameters {
        self.shared.lock().parameters
    }

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters) {
        let mut state = self.shared.lock();
        state.parameters = parameters;
        state.calls.push(EngineCall::SetParameters(parameters));
    }

    fn set_skip_silence_enabled(&mut self, enabled: bool) {
        self.record(EngineCall::SetSkipSilence(enabled));
    }

    fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.record(EngineCall::SetRepeatMode(mode));
    }

    fn set_shuffle_mode_enabled(&mut self, enabled: bool) {
        self.record(EngineCall::SetShuffleMode(enabled));
    }

    fn set_shuffle_order(&mut self, source_id: &str, order: &[usize]) {
        self.record(EngineCall::SetShuffleOrder(source_id.to_string(), order.to_vec()));
    }

    fn set_audio_attributes(&mut self, attributes: AudioAttributes) {
        self.record(EngineCall::SetAudioAttributes(attributes));
    }
}

#[derive(Clone, Default)]
pub struct FakeEngineFactory {
    pub shared: SharedEngine,
}

impl MediaEngineFactory for FakeEngineFactory {
    fn create(&self, options: &EngineOptions) -> BridgeResult<Box<dyn MediaEngine>> {
        {
            let mut state = self.shared.lock();
            state.created += 1;
            state.options = Some(options.clone());
        }
        Ok(Box::new(FakeEngine {
            shared: self.shared.clone(),
        }))
    }
}

// ============================================================================
// Fake effects
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum EffectCall {
    Created(EffectType, AudioSessionId),
    Enabled(EffectType, bool),
    TargetGain(i32),
    BandLevel(u16, i16),
    Released(EffectType),
}

pub type EffectLog = Arc<Mutex<Vec<EffectCall>>>;

pub struct FakeEnhancer {
    log: EffectLog,
    enabled: bool,
}

impl AudioEffect for FakeEnhancer {
    fn set_enabled(&mut self, enabled: bool) -> BridgeResult<()> {
        self.enabled = enabled;
        self.log
            .lock()
            .push(EffectCall::Enabled(EffectType::LoudnessEnhancer, enabled));
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn release(&mut self) {
        self.log
            .lock()
            .push(EffectCall::Released(EffectType::LoudnessEnhancer));
    }
}

impl LoudnessEnhancer for FakeEnhancer {
    fn set_target_gain(&mut self, gain_milli_db: i32) -> BridgeResult<()> {
        self.log.lock().push(EffectCall::TargetGain(gain_milli_db));
        Ok(())
    }
}

/// Five bands of 1 kHz each, levels in thousandths of a dB within ±15 dB.
pub struct FakeEqualizer {
    log: EffectLog,
    enabled: bool,
    levels: Vec<i16>,
}

impl AudioEffect for FakeEqualizer {
    fn set_enabled(&mut self, enabled: bool) -> BridgeResult<()> {
        self.enabled = enabled;
        self.log
            .lock()
            .push(EffectCall::Enabled(EffectType::Equalizer, enabled));
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn release(&mut self) {
        self.log.lock().push(EffectCall::Released(EffectType::Equalizer));
    }
}

impl Equalizer for FakeEqualizer {
    fn number_of_bands(&self) -> u16 {
        self.levels.len() as u16
    }

    fn band_level_range(&self) -> (i16, i16) {
        (-15_000, 15_000)
    }

    fn band_freq_range(&self, band: u16) -> (i32, i32) {
        let lower = band as i32 * 1_000_000;
        (lower, lower + 1_000_000)
    }

    fn center_freq(&self, band: u16) -> i32 {
        band as i32 * 1_000_000 + 500_000
    }

    fn band_level(&self, band: u16) -> i16 {
        self.levels[band as usize]
    }

    fn set_band_level(&mut self, band: u16, level: i16) -> BridgeResult<()> {
        self.levels[band as usize] = level;
        self.log.lock().push(EffectCall::BandLevel(band, level));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct FakeEffectFactory {
    pub log: EffectLog,
}

impl AudioEffectFactory for FakeEffectFactory {
    fn create_loudness_enhancer(
        &self,
        session_id: AudioSessionId,
    ) -> BridgeResult<Box<dyn LoudnessEnhancer>> {
        self.log
            .lock()
            .push(EffectCall::Created(EffectType::LoudnessEnhancer, session_id));
        Ok(Box::new(FakeEnhancer {
            log: self.log.clone(),
            enabled: false,
        }))
    }

    fn create_equalizer(&self, session_id: AudioSessionId) -> BridgeResult<Box<dyn Equalizer>> {
        self.log
            .lock()
            .push(EffectCall::Created(EffectType::Equalizer, session_id));
        Ok(Box::new(FakeEqualizer {
            log: self.log.clone(),
            enabled: false,
            levels: vec![0; 5],
        }))
    }
}

// ============================================================================
// Scheduler
// ============================================================================

#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(Duration, u64)>>,
}

impl RecordingScheduler {
    /// Take every tick requested so far.
    pub fn take(&self) -> Vec<(Duration, u64)> {
        std::mem::take(&mut *self.scheduled.lock())
    }
}

impl TickScheduler for RecordingScheduler {
    fn schedule(&self, delay: Duration, generation: u64) {
        self.scheduled.lock().push((delay, generation));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub session: PlaybackSession,
    pub engine: SharedEngine,
    pub effects: EffectLog,
    pub scheduler: Arc<RecordingScheduler>,
    pub clock: Arc<ManualClock>,
    pub events: EventStream,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let engine_factory = FakeEngineFactory::default();
        let effect_factory = FakeEffectFactory::default();
        let scheduler = Arc::new(RecordingScheduler::default());
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let (sink, events) = event_channel();

        let session = PlaybackSession::new(
            PlayerId::new(),
            config,
            SessionBridges {
                engine_factory: Arc::new(engine_factory.clone()),
                effect_factory: Arc::new(effect_factory.clone()),
                clock: clock.clone(),
                scheduler: scheduler.clone(),
            },
            sink,
        )
        .expect("valid config");

        Self {
            session,
            engine: engine_factory.shared,
            effects: effect_factory.log,
            scheduler,
            clock,
            events,
        }
    }

    pub fn drain(&mut self) -> Vec<SessionEvent> {
        self.events.drain()
    }

    pub fn snapshots(&mut self) -> Vec<PlaybackSnapshot> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Snapshot(snapshot) => Some(snapshot),
                SessionEvent::Error(_) => None,
            })
            .collect()
    }

    pub fn set_engine_state(&self, state: EngineState) {
        self.engine.lock().state = state;
    }
}

// ============================================================================
// Descriptors
// ============================================================================

pub fn track(id: &str) -> serde_json::Value {
    json!({
        "type": "progressive",
        "id": id,
        "uri": format!("https://media.example.com/{}.mp3", id),
    })
}

/// A concatenating playlist of `len` progressive tracks.
pub fn playlist(len: usize) -> SourceDescriptor {
    let children: Vec<_> = (0..len).map(|i| track(&format!("track-{}", i))).collect();
    SourceDescriptor::from_json(json!({
        "type": "concatenating",
        "id": "playlist",
        "children": children,
        "useLazyPreparation": true,
    }))
    .expect("valid playlist")
}

pub fn single(id: &str) -> SourceDescriptor {
    SourceDescriptor::from_json(track(id)).expect("valid track")
}
