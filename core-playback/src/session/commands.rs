//! Client commands.
//!
//! Every public method here goes through `run_command`, which rejects
//! commands after dispose, creates the engine on first use and flushes one
//! snapshot when the command returns.

use super::PlaybackSession;
use crate::correlator::{LoadResponse, PendingResult};
use crate::effects::EqualizerParameters;
use crate::error::{Result, SessionError};
use crate::source::{validate_shuffle_order, SourceDescriptor};
use crate::units;

use bridge_traits::effects::EffectType;
use bridge_traits::engine::{AudioAttributes, PlaybackParameters, RepeatMode};
use core_runtime::events::ProcessingState;
use tracing::{debug, info, instrument};

impl PlaybackSession {
    /// Load a new source graph.
    ///
    /// The descriptor is resolved before any state changes, so an invalid
    /// descriptor fails the command and leaves the current playback alone.
    /// The initial position and index are applied once the engine reports
    /// its timeline. The returned result completes when the engine is ready
    /// (with the duration), fails on an engine error, and fails with
    /// [`SessionError::AbortedBySupersedingRequest`] if another load or a
    /// dispose arrives first.
    #[instrument(skip_all, fields(player = %self.id, source = descriptor.id()))]
    pub fn load(
        &mut self,
        descriptor: &SourceDescriptor,
        initial_position_micros: Option<i64>,
        initial_index: Option<usize>,
    ) -> Result<PendingResult<LoadResponse>> {
        self.run_command("load", |session| {
            let source = session.resolver.resolve(descriptor, &mut session.sources)?;

            session.initial_position_ms = initial_position_micros.map(units::micros_to_engine);
            session.initial_index = initial_index;

            match session.processing_state {
                ProcessingState::None => {}
                ProcessingState::Loading => {
                    session.abort_pending_load();
                    session.engine_mut()?.stop();
                }
                _ => session.engine_mut()?.stop(),
            }

            session.recovery.reset();
            session.poller.cancel();
            let pending = session.correlator.register_load();
            session.processing_state = ProcessingState::Loading;
            session.update_position();
            session.enqueue_now();

            session.media_source = Some(source.clone());
            let engine = session.engine_mut()?;
            engine.set_source(source);
            engine.prepare();

            info!(
                initial_index = ?initial_index,
                initial_position_micros = ?initial_position_micros,
                cached_sources = session.sources.len(),
                "source submitted"
            );
            Ok(pending)
        })
    }

    /// Start or resume playback. The result completes on the next pause, on
    /// completion, or on dispose.
    #[instrument(skip_all, fields(player = %self.id))]
    pub fn play(&mut self) -> Result<PendingResult<()>> {
        self.run_command("play", |session| {
            if session.engine_mut()?.play_when_ready() {
                return Ok(PendingResult::ready(Ok(())));
            }

            let pending = session.correlator.register_play();
            session.engine_mut()?.set_play_when_ready(true);
            session.update_position();
            if session.processing_state == ProcessingState::Completed {
                session.correlator.complete_play();
            }
            Ok(pending)
        })
    }

    #[instrument(skip_all, fields(player = %self.id))]
    pub fn pause(&mut self) -> Result<()> {
        self.run_command("pause", |session| {
            if !session.engine_mut()?.play_when_ready() {
                return Ok(());
            }
            session.engine_mut()?.set_play_when_ready(false);
            session.update_position();
            session.correlator.complete_play();
            Ok(())
        })
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.run_command("setVolume", |session| {
            if !volume.is_finite() || volume < 0.0 {
                return Err(SessionError::InvalidArgument(format!(
                    "volume must be >= 0, got {}",
                    volume
                )));
            }
            session.engine_mut()?.set_volume(volume);
            Ok(())
        })
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        self.run_command("setSpeed", |session| {
            check_positive("speed", speed)?;
            let engine = session.engine_mut()?;
            let parameters = engine.playback_parameters();
            if parameters.speed == speed {
                return Ok(());
            }
            engine.set_playback_parameters(PlaybackParameters {
                speed,
                pitch: parameters.pitch,
            });
            if engine.play_when_ready() {
                session.update_position();
            }
            Ok(())
        })
    }

    pub fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        self.run_command("setPitch", |session| {
            check_positive("pitch", pitch)?;
            let engine = session.engine_mut()?;
            let parameters = engine.playback_parameters();
            if parameters.pitch == pitch {
                return Ok(());
            }
            engine.set_playback_parameters(PlaybackParameters {
                speed: parameters.speed,
                pitch,
            });
            Ok(())
        })
    }

    pub fn set_skip_silence(&mut self, enabled: bool) -> Result<()> {
        self.run_command("setSkipSilence", |session| {
            session.engine_mut()?.set_skip_silence_enabled(enabled);
            Ok(())
        })
    }

    pub fn set_loop_mode(&mut self, mode: RepeatMode) -> Result<()> {
        self.run_command("setLoopMode", |session| {
            session.engine_mut()?.set_repeat_mode(mode);
            Ok(())
        })
    }

    pub fn set_shuffle_mode(&mut self, enabled: bool) -> Result<()> {
        self.run_command("setShuffleMode", |session| {
            session.engine_mut()?.set_shuffle_mode_enabled(enabled);
            Ok(())
        })
    }

    /// Forward new shuffle orders for every already-resolved concatenating
    /// node in `descriptor`. Nodes the session has not seen are skipped.
    pub fn set_shuffle_order(&mut self, descriptor: &SourceDescriptor) -> Result<()> {
        self.run_command("setShuffleOrder", |session| session.apply_shuffle_order(descriptor))
    }

    fn apply_shuffle_order(&mut self, descriptor: &SourceDescriptor) -> Result<()> {
        if !self.sources.contains(descriptor.id()) {
            return Ok(());
        }
        match descriptor {
            SourceDescriptor::Concatenating {
                id,
                children,
                shuffle_order,
                ..
            } => {
                validate_shuffle_order(id, shuffle_order, children.len())?;
                debug!(source = %id, "updating shuffle order");
                self.engine_mut()?.set_shuffle_order(id, shuffle_order);
                for child in children {
                    self.apply_shuffle_order(child)?;
                }
            }
            SourceDescriptor::Looping { child, .. } | SourceDescriptor::Clipping { child, .. } => {
                self.apply_shuffle_order(child)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Seek within the current item or to another item.
    ///
    /// `None` position means the item's default position; `None` index means
    /// the current item. Before the engine is usable this completes
    /// immediately without doing anything.
    #[instrument(skip_all, fields(player = %self.id, position = ?position_micros, index = ?index))]
    pub fn seek(
        &mut self,
        position_micros: Option<i64>,
        index: Option<usize>,
    ) -> Result<PendingResult<()>> {
        self.run_command("seek", |session| {
            if !session.processing_state.is_engine_usable() {
                return Ok(PendingResult::ready(Ok(())));
            }

            let target_ms = position_micros.map(units::micros_to_engine);
            let pending = session.correlator.register_seek(target_ms);
            session.update_position();

            let engine = session.engine_mut()?;
            let index = index.unwrap_or_else(|| engine.current_item_index());
            if let Err(err) = engine.seek_to(index, target_ms) {
                let message = err.to_string();
                session
                    .correlator
                    .fail_seek(SessionError::IllegalState(message.clone()));
                return Err(SessionError::IllegalState(message));
            }
            Ok(pending)
        })
    }

    /// Apply audio attributes, deferring them while a load is in progress.
    pub fn set_audio_attributes(&mut self, attributes: AudioAttributes) -> Result<()> {
        self.run_command("setAudioAttributes", |session| {
            if session.processing_state == ProcessingState::Loading {
                debug!(?attributes, "deferring audio attributes until ready");
                session.pending_audio_attributes = Some(attributes);
                return Ok(());
            }
            session.engine_mut()?.set_audio_attributes(attributes);
            Ok(())
        })
    }

    pub fn effect_set_enabled(&mut self, effect: EffectType, enabled: bool) -> Result<()> {
        self.run_command("audioEffectSetEnabled", |session| {
            session.effects.set_enabled(effect, enabled)
        })
    }

    pub fn loudness_set_target_gain(&mut self, decibels: f64) -> Result<()> {
        self.run_command("loudnessEnhancerSetTargetGain", |session| {
            session.effects.set_loudness_target_gain(decibels)
        })
    }

    pub fn equalizer_get_parameters(&mut self) -> Result<EqualizerParameters> {
        self.run_command("equalizerGetParameters", |session| {
            session.effects.equalizer_parameters()
        })
    }

    pub fn equalizer_band_set_gain(&mut self, band: u16, decibels: f64) -> Result<()> {
        self.run_command("equalizerBandSetGain", |session| {
            session.effects.set_equalizer_band_gain(band, decibels)
        })
    }
}

fn check_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SessionError::InvalidArgument(format!(
            "{} must be > 0, got {}",
            name, value
        )))
    }
}
