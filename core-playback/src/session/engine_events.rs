//! Engine callbacks and poll ticks.
//!
//! Engine-driven changes broadcast immediately. They are never coalesced with
//! a command's snapshot because they arrive independently of any command.

use super::PlaybackSession;
use crate::correlator::LoadResponse;
use crate::error::SessionError;
use crate::poll::PollPhase;
use crate::recovery::TimelineProbe;
use crate::units;

use bridge_traits::engine::{
    AudioSessionId, DiscontinuityReason, EngineErrorKind, EngineEvent, EngineState, IcyHeaders,
    IcyInfo,
};
use core_runtime::events::{ErrorEvent, ProcessingState};
use serde_json::json;
use tracing::{debug, error, info, trace, warn};

impl PlaybackSession {
    /// Apply one engine callback. Ignored once the session is disposed or
    /// before an engine exists.
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.disposed || self.engine.is_none() {
            trace!(player = %self.id, ?event, "engine event ignored");
            return;
        }

        match event {
            EngineEvent::StateChanged(state) => self.on_state_changed(state),
            EngineEvent::TimelineChanged => self.on_timeline_changed(),
            EngineEvent::PositionDiscontinuity(reason) => self.on_position_discontinuity(reason),
            EngineEvent::Error { kind, message } => self.on_engine_error(kind, message),
            EngineEvent::AudioSessionIdChanged(session_id) => {
                self.on_audio_session_id_changed(session_id)
            }
            EngineEvent::Metadata(info) => self.on_metadata(info),
            EngineEvent::TracksChanged(headers) => self.on_tracks_changed(headers),
        }
    }

    fn on_state_changed(&mut self, state: EngineState) {
        debug!(player = %self.id, ?state, current = ?self.processing_state, "engine state changed");
        match state {
            EngineState::Ready => {
                if self.engine_ref().is_some_and(|engine| engine.play_when_ready()) {
                    self.update_position();
                }
                self.processing_state = ProcessingState::Ready;
                self.broadcast_now();

                let duration_micros = self.duration_ms().map(units::engine_to_micros);
                if self.correlator.complete_load(LoadResponse { duration_micros }) {
                    info!(player = %self.id, duration_micros = ?duration_micros, "load completed");
                    self.apply_pending_audio_attributes();
                }
                self.correlator.complete_seek();
            }
            EngineState::Buffering => {
                self.update_position_if_changed();
                if !matches!(
                    self.processing_state,
                    ProcessingState::Buffering | ProcessingState::Loading
                ) {
                    self.processing_state = ProcessingState::Buffering;
                    self.broadcast_now();
                }
                self.start_buffer_watch();
            }
            EngineState::Ended => {
                if self.processing_state != ProcessingState::Completed {
                    self.update_position();
                    self.processing_state = ProcessingState::Completed;
                    self.broadcast_now();
                }
                if self.correlator.complete_load(LoadResponse::default()) {
                    self.apply_pending_audio_attributes();
                }
                self.correlator.complete_play();
            }
            EngineState::Idle => {}
        }
    }

    fn on_timeline_changed(&mut self) {
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };

        if self.initial_position_ms.is_some() || self.initial_index.is_some() {
            let index = self.initial_index.take().unwrap_or(0);
            let position_ms = self.initial_position_ms.take();
            debug!(player = %self.id, index, position_ms = ?position_ms, "applying initial position");
            if let Err(err) = engine.seek_to(index, position_ms) {
                warn!(player = %self.id, index, error = %err, "initial seek rejected");
            }
        }

        if self.update_current_index() {
            self.broadcast_now();
        }

        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        let item_count = engine.item_count();
        if engine.playback_state() == EngineState::Ended {
            let result = if engine.play_when_ready() {
                if self.last_playlist_len == 0 && item_count > 0 {
                    engine.seek_to(0, Some(0))
                } else if engine.has_next_item() {
                    engine.seek_to_next_item()
                } else {
                    Ok(())
                }
            } else if item_count > 0 {
                let index = engine.current_item_index().min(item_count - 1);
                engine.seek_to(index, Some(0))
            } else {
                Ok(())
            };
            if let Err(err) = result {
                warn!(player = %self.id, item_count, error = %err, "seek after timeline change rejected");
            }
        }
        self.last_playlist_len = item_count;
    }

    fn on_position_discontinuity(&mut self, reason: DiscontinuityReason) {
        self.update_position();
        if matches!(
            reason,
            DiscontinuityReason::AutoTransition | DiscontinuityReason::Seek
        ) {
            self.update_current_index();
        }
        trace!(player = %self.id, ?reason, index = ?self.current_index, "position discontinuity");
        self.broadcast_now();
    }

    fn on_engine_error(&mut self, kind: EngineErrorKind, message: String) {
        error!(player = %self.id, kind = %kind, index = ?self.current_index, "engine error: {}", message);

        let event = ErrorEvent::new(kind.code(), message.clone())
            .with_details(json!({ "index": self.current_index }));
        self.correlator.fail_load(SessionError::Engine { kind, message });
        self.coalescer.emit_error(event);

        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        let probe = TimelineProbe {
            has_next_item: engine.has_next_item(),
            current_index: self.current_index,
            timeline_len: engine.timeline_window_count(),
        };
        let Some(next) = self.recovery.on_error(probe) else {
            return;
        };
        let Some(source) = self.media_source.clone() else {
            return;
        };

        info!(
            player = %self.id,
            next_index = next,
            error_count = self.recovery.error_count(),
            "skipping to next item after error"
        );
        engine.set_source(source);
        engine.prepare();
        if let Err(err) = engine.seek_to(next, Some(0)) {
            warn!(player = %self.id, index = next, error = %err, "recovery seek rejected");
        }
    }

    fn on_audio_session_id_changed(&mut self, session_id: Option<AudioSessionId>) {
        debug!(player = %self.id, session_id = ?session_id, "audio session changed");
        self.effects.bind(session_id);
        self.broadcast_now();
    }

    fn on_metadata(&mut self, info: IcyInfo) {
        self.stream_metadata.info = Some(info);
        self.broadcast_now();
    }

    fn on_tracks_changed(&mut self, headers: Vec<IcyHeaders>) {
        for header in headers {
            self.stream_metadata.headers = Some(header);
            self.broadcast_now();
        }
    }

    /// Run one poll tick armed with `generation`.
    ///
    /// Broadcasts when the buffered position moved, then re-arms itself with
    /// the interval for the current phase. Ticks from a cancelled or
    /// restarted loop are dropped.
    pub fn on_poll_tick(&mut self, generation: u64) {
        if self.disposed || !self.poller.accepts(generation) {
            trace!(player = %self.id, generation, "stale poll tick");
            return;
        }
        let Some(engine) = self.engine_ref() else {
            return;
        };

        let buffered_ms = engine.buffered_position_ms();
        let phase = match engine.playback_state() {
            EngineState::Buffering => PollPhase::Buffering,
            EngineState::Ready if engine.play_when_ready() => PollPhase::Playing,
            EngineState::Ready => PollPhase::Paused,
            EngineState::Idle | EngineState::Ended => PollPhase::Idle,
        };

        if buffered_ms != self.buffered_position_ms {
            self.broadcast_now();
        }

        match self.poller.next_delay(phase) {
            Some(delay) => self.scheduler.schedule(delay, generation),
            None => debug!(player = %self.id, generation, "buffer watch stopped"),
        }
    }
}
