//! # Playback Session
//!
//! The state machine that reconciles client commands with engine callbacks.
//!
//! ## Overview
//!
//! A [`PlaybackSession`] owns one lazily created [`MediaEngine`] and everything
//! attached to it: the source cache, pending command results, bound audio
//! effects and the buffered-position poll loop. It is a plain synchronous
//! object. Commands ([`commands`](self::commands)) and engine callbacks
//! ([`engine_events`](self::engine_events)) are both `&mut self` methods, so
//! whoever drives the session must call them from a single sequence.
//! [`SessionDriver`](crate::driver::SessionDriver) does exactly that on a tokio
//! task.
//!
//! ## Observability
//!
//! Each command stages snapshots while it runs and flushes one at its end;
//! engine callbacks broadcast immediately. Errors reported by the engine
//! travel on the same stream without closing it. The stream is closed once,
//! by [`PlaybackSession::dispose`].
//!
//! ## Units
//!
//! Position bookkeeping is kept in engine milliseconds and converted to
//! microseconds when a snapshot is built.

mod commands;
mod engine_events;

use crate::coalescer::EventCoalescer;
use crate::correlator::Correlator;
use crate::effects::AudioSessionResources;
use crate::error::{Result, SessionError};
use crate::poll::{BufferPoller, TickScheduler};
use crate::recovery::ErrorRecoveryPolicy;
use crate::source::{SourceCache, SourceResolver};
use crate::units;

use bridge_traits::effects::AudioEffectFactory;
use bridge_traits::engine::{AudioAttributes, MediaEngine, MediaEngineFactory};
use bridge_traits::source::SourceNode;
use bridge_traits::time::Clock;
use core_runtime::config::SessionConfig;
use core_runtime::events::{
    ErrorEvent, EventSink, PlaybackSnapshot, ProcessingState, StreamMetadata,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier of one player instance, used to correlate logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host capabilities a session is built from.
#[derive(Clone)]
pub struct SessionBridges {
    pub engine_factory: Arc<dyn MediaEngineFactory>,
    pub effect_factory: Arc<dyn AudioEffectFactory>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn TickScheduler>,
}

pub struct PlaybackSession {
    id: PlayerId,
    config: SessionConfig,
    engine_factory: Arc<dyn MediaEngineFactory>,
    engine: Option<Box<dyn MediaEngine>>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn TickScheduler>,

    resolver: SourceResolver,
    sources: SourceCache,
    /// Root of the graph last submitted to the engine
    media_source: Option<Arc<SourceNode>>,

    correlator: Correlator,
    coalescer: EventCoalescer,
    recovery: ErrorRecoveryPolicy,
    effects: AudioSessionResources,
    poller: BufferPoller,

    processing_state: ProcessingState,
    update_position_ms: i64,
    update_time_ms: i64,
    buffered_position_ms: i64,
    current_index: Option<usize>,
    /// Deferred until the engine reports its first timeline
    initial_position_ms: Option<i64>,
    initial_index: Option<usize>,
    /// Rejected by the engine while loading; applied on ready or ended
    pending_audio_attributes: Option<AudioAttributes>,
    last_playlist_len: usize,
    stream_metadata: StreamMetadata,
    disposed: bool,
}

impl PlaybackSession {
    /// Create a session. The engine itself is only created by the first
    /// command.
    pub fn new(
        id: PlayerId,
        config: SessionConfig,
        bridges: SessionBridges,
        events: EventSink,
    ) -> Result<Self> {
        config.validate()?;

        let resolver = SourceResolver::new(config.user_agent.clone());
        let recovery = ErrorRecoveryPolicy::new(config.max_recovery_errors);
        let effects =
            AudioSessionResources::new(bridges.effect_factory, config.audio_effects.clone());
        let poller = BufferPoller::new(config.poll_intervals.clone());
        let update_time_ms = bridges.clock.unix_timestamp_millis();

        debug!(player = %id, effects = config.audio_effects.len(), "session created");

        Ok(Self {
            id,
            config,
            engine_factory: bridges.engine_factory,
            engine: None,
            clock: bridges.clock,
            scheduler: bridges.scheduler,
            resolver,
            sources: SourceCache::new(),
            media_source: None,
            correlator: Correlator::new(),
            coalescer: EventCoalescer::new(events),
            recovery,
            effects,
            poller,
            processing_state: ProcessingState::None,
            update_position_ms: 0,
            update_time_ms,
            buffered_position_ms: 0,
            current_index: None,
            initial_position_ms: None,
            initial_index: None,
            pending_audio_attributes: None,
            last_playlist_len: 0,
            stream_metadata: StreamMetadata::default(),
            disposed: false,
        })
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn processing_state(&self) -> ProcessingState {
        self.processing_state
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Engine errors seen since the last load.
    pub fn error_count(&self) -> u32 {
        self.recovery.error_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Number of resolved source nodes held for this session.
    pub fn cached_source_count(&self) -> usize {
        self.sources.len()
    }

    /// Tear the session down.
    ///
    /// Resolves every pending result (a pending load fails with
    /// [`SessionError::AbortedBySupersedingRequest`]), releases effects and
    /// the engine, clears the source cache, emits a final `None` snapshot and
    /// closes the event stream. Calling it again does nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        info!(player = %self.id, state = ?self.processing_state, "disposing session");

        self.abort_pending_load();
        self.correlator.resolve_all(SessionError::AbortedBySupersedingRequest);
        self.poller.cancel();

        self.sources.clear();
        self.media_source = None;
        self.effects.release_all();
        if let Some(mut engine) = self.engine.take() {
            engine.release();
        }

        self.processing_state = ProcessingState::None;
        self.broadcast_now();
        self.coalescer.close();
        self.disposed = true;
    }

    // ------------------------------------------------------------------------
    // Command plumbing
    // ------------------------------------------------------------------------

    /// Run a client command: create the engine if needed, run `body`, then
    /// flush exactly one snapshot whatever the outcome.
    fn run_command<T>(
        &mut self,
        name: &'static str,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }

        let result = match self.ensure_engine() {
            Ok(()) => body(self),
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            warn!(player = %self.id, command = name, error = %err, "command failed");
        }

        self.enqueue_now();
        self.coalescer.flush();
        result
    }

    fn ensure_engine(&mut self) -> Result<()> {
        if self.engine.is_some() {
            return Ok(());
        }

        let options = units::engine_options(&self.config);
        let engine = self.engine_factory.create(&options)?;
        let session_id = engine.audio_session_id();
        self.engine = Some(engine);
        info!(player = %self.id, "engine created");

        self.effects.bind(session_id);
        Ok(())
    }

    fn engine_mut(&mut self) -> Result<&mut (dyn MediaEngine + 'static)> {
        self.engine
            .as_deref_mut()
            .ok_or_else(|| SessionError::IllegalState("engine not created".to_string()))
    }

    fn engine_ref(&self) -> Option<&(dyn MediaEngine + 'static)> {
        self.engine.as_deref()
    }

    // ------------------------------------------------------------------------
    // Position bookkeeping
    // ------------------------------------------------------------------------

    /// Position observers should see right now, in engine milliseconds.
    ///
    /// A deferred initial position wins; before the engine is usable its own
    /// position is reported; then a pending seek target; then the engine.
    fn current_position_ms(&self) -> i64 {
        if let Some(initial) = self.initial_position_ms {
            return initial;
        }
        let engine_position = self.engine_ref().map_or(0, |engine| engine.current_position_ms());
        if !self.processing_state.is_engine_usable() {
            return engine_position.max(0);
        }
        self.correlator
            .seek_target_ms()
            .unwrap_or(engine_position)
            .max(0)
    }

    fn update_position(&mut self) {
        self.update_position_ms = self.current_position_ms();
        self.update_time_ms = self.clock.unix_timestamp_millis();
    }

    fn update_position_if_changed(&mut self) -> bool {
        if self.current_position_ms() == self.update_position_ms {
            return false;
        }
        self.update_position();
        true
    }

    fn duration_ms(&self) -> Option<i64> {
        if !self.processing_state.is_engine_usable() {
            return None;
        }
        self.engine_ref().and_then(|engine| engine.duration_ms())
    }

    /// Re-read the engine's current item. Returns `true` if it changed.
    fn update_current_index(&mut self) -> bool {
        let Some(index) = self.engine_ref().map(|engine| engine.current_item_index()) else {
            return false;
        };
        if self.current_index == Some(index) {
            return false;
        }
        self.current_index = Some(index);
        true
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    fn snapshot(&mut self) -> PlaybackSnapshot {
        if let Some(engine) = self.engine_ref() {
            self.buffered_position_ms = engine.buffered_position_ms();
        }

        PlaybackSnapshot {
            processing_state: self.processing_state,
            update_position_micros: units::engine_to_micros(self.update_position_ms),
            update_time_millis: self.update_time_ms,
            buffered_position_micros: units::engine_to_micros(
                self.update_position_ms.max(self.buffered_position_ms),
            ),
            duration_micros: self.duration_ms().map(units::engine_to_micros),
            current_index: self.current_index,
            session_id: self.effects.session_id().map(|id| id.0),
            stream_metadata: self.stream_metadata.clone(),
        }
    }

    fn enqueue_now(&mut self) {
        let snapshot = self.snapshot();
        self.coalescer.enqueue(snapshot);
    }

    fn broadcast_now(&mut self) {
        let snapshot = self.snapshot();
        self.coalescer.broadcast(snapshot);
    }

    /// Fail a pending load as aborted and report it on the stream.
    fn abort_pending_load(&mut self) {
        let error = SessionError::AbortedBySupersedingRequest;
        let event = ErrorEvent::new(error.code(), error.to_string());
        if self.correlator.fail_load(error) {
            debug!(player = %self.id, "pending load aborted");
            self.coalescer.emit_error(event);
        }
    }

    /// Runs only when a pending load completes.
    fn apply_pending_audio_attributes(&mut self) {
        let Some(attributes) = self.pending_audio_attributes.take() else {
            return;
        };
        if let Some(engine) = self.engine.as_deref_mut() {
            debug!(player = %self.id, ?attributes, "applying deferred audio attributes");
            engine.set_audio_attributes(attributes);
        }
    }

    /// Arm a fresh poll loop with an immediate first tick.
    fn start_buffer_watch(&mut self) {
        let generation = self.poller.restart();
        self.scheduler.schedule(Duration::ZERO, generation);
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("processing_state", &self.processing_state)
            .field("current_index", &self.current_index)
            .field("error_count", &self.recovery.error_count())
            .field("has_engine", &self.engine.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}
