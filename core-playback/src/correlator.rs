//! Pending command results.
//!
//! `load`, `play` and `seek` finish when the engine later reports progress,
//! not when the command returns. The command hands the caller a
//! [`PendingResult`] and parks the matching [`Completer`] in the
//! [`Correlator`], which holds at most one per kind.
//!
//! Every completion takes the completer out of its slot before resolving it,
//! so a handler that re-enters the session while completing cannot observe or
//! complete the same slot twice.

use crate::error::{Result, SessionError};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::trace;

/// Value a successful load resolves with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    /// Duration of the first item, when the engine knows it.
    pub duration_micros: Option<i64>,
}

/// Resolving half of a pending result.
#[derive(Debug)]
pub struct Completer<T> {
    sender: oneshot::Sender<Result<T>>,
}

impl<T> Completer<T> {
    pub fn complete(self, result: Result<T>) {
        if self.sender.send(result).is_err() {
            trace!("pending result dropped by caller before completion");
        }
    }
}

/// Future resolving to the outcome of a command.
#[derive(Debug)]
pub struct PendingResult<T> {
    state: PendingState<T>,
}

#[derive(Debug)]
enum PendingState<T> {
    Ready(Option<Result<T>>),
    Waiting(oneshot::Receiver<Result<T>>),
}

impl<T> PendingResult<T> {
    /// A result that is already known.
    pub fn ready(result: Result<T>) -> Self {
        Self {
            state: PendingState::Ready(Some(result)),
        }
    }

    pub fn pending() -> (Completer<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (
            Completer { sender },
            Self {
                state: PendingState::Waiting(receiver),
            },
        )
    }

    /// Take the outcome if it is already available.
    ///
    /// Returns `None` while the result is still pending and after the outcome
    /// has been taken once.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match &mut self.state {
            PendingState::Ready(result) => result.take(),
            PendingState::Waiting(receiver) => match receiver.try_recv() {
                Ok(result) => {
                    self.state = PendingState::Ready(None);
                    Some(result)
                }
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.state = PendingState::Ready(None);
                    Some(Err(SessionError::AbortedBySupersedingRequest))
                }
            },
        }
    }
}

impl<T> Unpin for PendingResult<T> {}

impl<T> Future for PendingResult<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            PendingState::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or(Err(SessionError::AbortedBySupersedingRequest)),
            ),
            PendingState::Waiting(receiver) => Pin::new(receiver).poll(cx).map(|outcome| {
                // A dropped completer means the session went away without
                // resolving the slot.
                outcome.unwrap_or(Err(SessionError::AbortedBySupersedingRequest))
            }),
        }
    }
}

#[derive(Debug)]
struct PendingSeek {
    completer: Completer<()>,
    target_ms: Option<i64>,
}

/// One optional completer per command kind.
#[derive(Debug, Default)]
pub struct Correlator {
    load: Option<Completer<LoadResponse>>,
    play: Option<Completer<()>>,
    seek: Option<PendingSeek>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // load
    // ------------------------------------------------------------------------

    /// Register a load. A still-pending previous load resolves successfully
    /// with no duration.
    pub fn register_load(&mut self) -> PendingResult<LoadResponse> {
        if let Some(previous) = self.load.take() {
            previous.complete(Ok(LoadResponse::default()));
        }
        let (completer, pending) = PendingResult::pending();
        self.load = Some(completer);
        pending
    }

    pub fn has_pending_load(&self) -> bool {
        self.load.is_some()
    }

    /// Returns `false` if no load was pending.
    pub fn complete_load(&mut self, response: LoadResponse) -> bool {
        match self.load.take() {
            Some(completer) => {
                completer.complete(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Returns `false` if no load was pending.
    pub fn fail_load(&mut self, error: SessionError) -> bool {
        match self.load.take() {
            Some(completer) => {
                completer.complete(Err(error));
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // play
    // ------------------------------------------------------------------------

    pub fn register_play(&mut self) -> PendingResult<()> {
        self.complete_play();
        let (completer, pending) = PendingResult::pending();
        self.play = Some(completer);
        pending
    }

    pub fn has_pending_play(&self) -> bool {
        self.play.is_some()
    }

    pub fn complete_play(&mut self) {
        if let Some(completer) = self.play.take() {
            completer.complete(Ok(()));
        }
    }

    // ------------------------------------------------------------------------
    // seek
    // ------------------------------------------------------------------------

    /// Register a seek towards `target_ms`. A still-pending seek resolves
    /// successfully first.
    pub fn register_seek(&mut self, target_ms: Option<i64>) -> PendingResult<()> {
        self.complete_seek();
        let (completer, pending) = PendingResult::pending();
        self.seek = Some(PendingSeek {
            completer,
            target_ms,
        });
        pending
    }

    pub fn has_pending_seek(&self) -> bool {
        self.seek.is_some()
    }

    /// Target of the pending seek, `None` if no seek is pending or it targets
    /// the item's default position.
    pub fn seek_target_ms(&self) -> Option<i64> {
        self.seek.as_ref().and_then(|seek| seek.target_ms)
    }

    pub fn complete_seek(&mut self) {
        if let Some(seek) = self.seek.take() {
            seek.completer.complete(Ok(()));
        }
    }

    /// Resolve the pending seek with an error, used when the engine rejects
    /// the seek synchronously.
    pub fn fail_seek(&mut self, error: SessionError) {
        if let Some(seek) = self.seek.take() {
            seek.completer.complete(Err(error));
        }
    }

    // ------------------------------------------------------------------------
    // teardown
    // ------------------------------------------------------------------------

    /// Resolve every slot: play and seek succeed, load fails with `error`.
    pub fn resolve_all(&mut self, load_error: SessionError) {
        self.fail_load(load_error);
        self.complete_play();
        self.complete_seek();
    }

    pub fn is_empty(&self) -> bool {
        self.load.is_none() && self.play.is_none() && self.seek.is_none()
    }
}
