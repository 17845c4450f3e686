//! # Session Driver
//!
//! Runs a [`PlaybackSession`] on one tokio task.
//!
//! The session is synchronous and must see commands, engine callbacks and poll
//! ticks one at a time, in the order they happened. The driver owns it and
//! feeds it from a single inbox channel:
//!
//! - client commands sent by a [`SessionHandle`]
//! - engine callbacks sent through an [`EngineEventSender`]
//! - poll ticks armed by [`DriverScheduler`]
//!
//! A callback raised by the engine while a command is running is queued and
//! handled after the command returns. A callback reported before a command
//! is handled before it.
//!
//! ## Usage
//!
//! ```ignore
//! let (engine_tx, engine_rx) = engine_event_channel();
//! let (sink, mut events) = event_channel();
//! let bridges = DriverBridges {
//!     engine_factory: Arc::new(HostEngineFactory::new(engine_tx)),
//!     effect_factory: Arc::new(NoEffects),
//!     clock: Arc::new(SystemClock),
//! };
//!
//! let (driver, handle) = SessionDriver::new(PlayerId::new(), config, bridges, engine_rx, sink)?;
//! driver.spawn();
//!
//! let response = handle.load(descriptor, None, None).await?;
//! handle.play().await?;
//! ```

use crate::correlator::{LoadResponse, PendingResult};
use crate::effects::EqualizerParameters;
use crate::error::{Result, SessionError};
use crate::poll::TickScheduler;
use crate::session::{PlaybackSession, PlayerId, SessionBridges};
use crate::source::SourceDescriptor;

use bridge_traits::effects::{AudioEffectFactory, EffectType};
use bridge_traits::engine::{AudioAttributes, EngineEvent, MediaEngineFactory, RepeatMode};
use bridge_traits::time::Clock;
use core_runtime::config::SessionConfig;
use core_runtime::events::EventSink;

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Command = Box<dyn FnOnce(&mut PlaybackSession) + Send>;

/// Everything the driver loop reacts to, in arrival order.
enum Input {
    Command(Command),
    Engine(EngineEvent),
    Tick(u64),
    HandlesDropped,
}

/// Host side of the driver inbox. Engines report their callbacks through it.
#[derive(Debug, Clone)]
pub struct EngineEventSender {
    inputs: mpsc::UnboundedSender<Input>,
}

impl EngineEventSender {
    /// Queue `event` behind everything already sent to the driver. Fails with
    /// [`SessionError::Disposed`] once the driver has stopped.
    pub fn send(&self, event: EngineEvent) -> Result<()> {
        self.inputs
            .send(Input::Engine(event))
            .map_err(|_| SessionError::Disposed)
    }

    pub fn is_closed(&self) -> bool {
        self.inputs.is_closed()
    }
}

/// Driver end of the inbox, consumed by [`SessionDriver::new`].
pub struct EngineEventReceiver {
    inputs: mpsc::UnboundedSender<Input>,
    receiver: mpsc::UnboundedReceiver<Input>,
}

/// Create the inbox the host engine reports its callbacks on.
pub fn engine_event_channel() -> (EngineEventSender, EngineEventReceiver) {
    let (inputs, receiver) = mpsc::unbounded_channel();
    (
        EngineEventSender {
            inputs: inputs.clone(),
        },
        EngineEventReceiver { inputs, receiver },
    )
}

/// Poll scheduler backed by `tokio::time::sleep`.
///
/// Each tick is sent back to the driver inbox tagged with its generation; the
/// session drops the ones that went stale while they slept.
#[derive(Debug, Clone)]
pub struct DriverScheduler {
    inputs: mpsc::UnboundedSender<Input>,
}

impl TickScheduler for DriverScheduler {
    fn schedule(&self, delay: Duration, generation: u64) {
        if delay.is_zero() {
            let _ = self.inputs.send(Input::Tick(generation));
            return;
        }

        let inputs = self.inputs.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = inputs.send(Input::Tick(generation));
                });
            }
            Err(_) => warn!(generation, "no tokio runtime, poll tick dropped"),
        }
    }
}

/// Host capabilities for a driven session. The tick scheduler is supplied by
/// the driver itself.
#[derive(Clone)]
pub struct DriverBridges {
    pub engine_factory: Arc<dyn MediaEngineFactory>,
    pub effect_factory: Arc<dyn AudioEffectFactory>,
    pub clock: Arc<dyn Clock>,
}

pub struct SessionDriver {
    session: PlaybackSession,
    inputs: mpsc::UnboundedReceiver<Input>,
}

impl SessionDriver {
    pub fn new(
        id: PlayerId,
        config: SessionConfig,
        bridges: DriverBridges,
        inbox: EngineEventReceiver,
        events: EventSink,
    ) -> Result<(Self, SessionHandle)> {
        let EngineEventReceiver { inputs, receiver } = inbox;
        let session = PlaybackSession::new(
            id,
            config,
            SessionBridges {
                engine_factory: bridges.engine_factory,
                effect_factory: bridges.effect_factory,
                clock: bridges.clock,
                scheduler: Arc::new(DriverScheduler {
                    inputs: inputs.clone(),
                }),
            },
            events,
        )?;

        let driver = Self {
            session,
            inputs: receiver,
        };
        let handle = SessionHandle {
            id,
            shared: Arc::new(HandleShared { inputs }),
        };
        Ok((driver, handle))
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process inputs until the session is disposed or every handle is
    /// dropped. Dropping the last handle disposes the session.
    pub async fn run(mut self) {
        let id = self.session.id();
        info!(player = %id, "session driver started");

        while let Some(input) = self.inputs.recv().await {
            match input {
                Input::Command(command) => command(&mut self.session),
                Input::Engine(event) => self.session.handle_engine_event(event),
                Input::Tick(generation) => self.session.on_poll_tick(generation),
                Input::HandlesDropped => {
                    debug!(player = %id, "all handles dropped");
                    self.session.dispose();
                }
            }

            if self.session.is_disposed() {
                break;
            }
        }

        info!(player = %id, "session driver stopped");
    }
}

/// Shared by every clone of a [`SessionHandle`]; tells the driver when the
/// last one goes away.
#[derive(Debug)]
struct HandleShared {
    inputs: mpsc::UnboundedSender<Input>,
}

impl Drop for HandleShared {
    fn drop(&mut self) {
        let _ = self.inputs.send(Input::HandlesDropped);
    }
}

/// Cloneable client API of a driven session.
///
/// Every method fails with [`SessionError::Disposed`] once the driver has
/// stopped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: PlayerId,
    shared: Arc<HandleShared>,
}

impl SessionHandle {
    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.shared.inputs.is_closed()
    }

    async fn call<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut PlaybackSession) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command: Command = Box::new(move |session| {
            let _ = reply_tx.send(body(session));
        });
        self.shared
            .inputs
            .send(Input::Command(command))
            .map_err(|_| SessionError::Disposed)?;
        reply_rx.await.map_err(|_| SessionError::Disposed)?
    }

    /// Load `descriptor` and wait until the engine is ready.
    pub async fn load(
        &self,
        descriptor: SourceDescriptor,
        initial_position_micros: Option<i64>,
        initial_index: Option<usize>,
    ) -> Result<LoadResponse> {
        let pending: PendingResult<LoadResponse> = self
            .call(move |session| {
                session.load(&descriptor, initial_position_micros, initial_index)
            })
            .await?;
        pending.await
    }

    /// Start playback and wait until it pauses or completes.
    pub async fn play(&self) -> Result<()> {
        self.call(|session| session.play()).await?.await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call(|session| session.pause()).await
    }

    pub async fn seek(&self, position_micros: Option<i64>, index: Option<usize>) -> Result<()> {
        self.call(move |session| session.seek(position_micros, index))
            .await?
            .await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.call(move |session| session.set_volume(volume)).await
    }

    pub async fn set_speed(&self, speed: f32) -> Result<()> {
        self.call(move |session| session.set_speed(speed)).await
    }

    pub async fn set_pitch(&self, pitch: f32) -> Result<()> {
        self.call(move |session| session.set_pitch(pitch)).await
    }

    pub async fn set_skip_silence(&self, enabled: bool) -> Result<()> {
        self.call(move |session| session.set_skip_silence(enabled))
            .await
    }

    pub async fn set_loop_mode(&self, mode: RepeatMode) -> Result<()> {
        self.call(move |session| session.set_loop_mode(mode)).await
    }

    pub async fn set_shuffle_mode(&self, enabled: bool) -> Result<()> {
        self.call(move |session| session.set_shuffle_mode(enabled))
            .await
    }

    pub async fn set_shuffle_order(&self, descriptor: SourceDescriptor) -> Result<()> {
        self.call(move |session| session.set_shuffle_order(&descriptor))
            .await
    }

    pub async fn set_audio_attributes(&self, attributes: AudioAttributes) -> Result<()> {
        self.call(move |session| session.set_audio_attributes(attributes))
            .await
    }

    pub async fn effect_set_enabled(&self, effect: EffectType, enabled: bool) -> Result<()> {
        self.call(move |session| session.effect_set_enabled(effect, enabled))
            .await
    }

    pub async fn loudness_set_target_gain(&self, decibels: f64) -> Result<()> {
        self.call(move |session| session.loudness_set_target_gain(decibels))
            .await
    }

    pub async fn equalizer_get_parameters(&self) -> Result<EqualizerParameters> {
        self.call(|session| session.equalizer_get_parameters())
            .await
    }

    pub async fn equalizer_band_set_gain(&self, band: u16, decibels: f64) -> Result<()> {
        self.call(move |session| session.equalizer_band_set_gain(band, decibels))
            .await
    }

    /// Consecutive engine errors since the last load.
    pub async fn error_count(&self) -> Result<u32> {
        self.call(|session| Ok(session.error_count())).await
    }

    /// Dispose the session and stop the driver. Succeeds if it is already
    /// gone.
    pub async fn dispose(&self) -> Result<()> {
        match self
            .call(|session| {
                session.dispose();
                Ok(())
            })
            .await
        {
            Err(SessionError::Disposed) => Ok(()),
            other => other,
        }
    }
}
