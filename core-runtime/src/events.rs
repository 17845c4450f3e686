//! # Session Event Stream
//!
//! Values a playback session delivers to its single subscriber.
//!
//! ## Overview
//!
//! A session emits two kinds of events:
//! - [`SessionEvent::Snapshot`]: an immutable [`PlaybackSnapshot`] of the
//!   observable playback state
//! - [`SessionEvent::Error`]: a non-terminal [`ErrorEvent`]; snapshots may
//!   keep arriving after it
//!
//! The stream ends exactly once, when the session is torn down.
//!
//! ## Channel
//!
//! [`event_channel`] creates the sink/stream pair. The channel is unbounded:
//! snapshots are small and the session never drops one, so a slow subscriber
//! only delays delivery. Once [`EventSink::close`] has run, the stream yields
//! whatever was already queued and then `None`.
//!
//! ```ignore
//! use core_runtime::events::{event_channel, SessionEvent};
//!
//! let (sink, mut stream) = event_channel();
//! // hand `sink` to the session ...
//! while let Some(event) = stream.recv().await {
//!     if let SessionEvent::Snapshot(snapshot) = event {
//!         println!("{:?} at {}us", snapshot.processing_state, snapshot.update_position_micros);
//!     }
//! }
//! ```

use bridge_traits::engine::{IcyHeaders, IcyInfo};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::trace;

pub use tokio::sync::mpsc::error::TryRecvError;

// ============================================================================
// Snapshot
// ============================================================================

/// Client-visible processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessingState {
    /// Initial state and the state after teardown
    #[default]
    None,
    Loading,
    Buffering,
    Ready,
    Completed,
}

impl ProcessingState {
    /// Whether the engine has a prepared source that accepts seeks.
    pub fn is_engine_usable(&self) -> bool {
        !matches!(self, ProcessingState::None | ProcessingState::Loading)
    }
}

/// Latest ICY metadata seen on the stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub info: Option<IcyInfo>,
    pub headers: Option<IcyHeaders>,
}

impl StreamMetadata {
    pub fn is_empty(&self) -> bool {
        self.info.is_none() && self.headers.is_none()
    }
}

/// Immutable point-in-time view of a session.
///
/// Observers reconstruct the live position as
/// `update_position_micros + (now - update_time_millis) * 1000 * speed`
/// while the state is `Ready` and playback is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub processing_state: ProcessingState,
    pub update_position_micros: i64,
    /// Wall-clock time at which `update_position_micros` was sampled
    pub update_time_millis: i64,
    pub buffered_position_micros: i64,
    /// Absent while `None`/`Loading` or when the engine does not know it
    pub duration_micros: Option<i64>,
    pub current_index: Option<usize>,
    pub session_id: Option<i32>,
    pub stream_metadata: StreamMetadata,
}

// ============================================================================
// Errors
// ============================================================================

/// Error delivered on the event stream. Does not end the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    /// Stable machine-readable code, e.g. `"source"` or `"abort"`
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorEvent {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

// ============================================================================
// Event stream
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum SessionEvent {
    Snapshot(PlaybackSnapshot),
    Error(ErrorEvent),
}

impl SessionEvent {
    pub fn as_snapshot(&self) -> Option<&PlaybackSnapshot> {
        match self {
            SessionEvent::Snapshot(snapshot) => Some(snapshot),
            SessionEvent::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorEvent> {
        match self {
            SessionEvent::Error(error) => Some(error),
            SessionEvent::Snapshot(_) => None,
        }
    }
}

/// Create a connected sink/stream pair.
pub fn event_channel() -> (EventSink, EventStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        EventSink {
            sender: Some(sender),
        },
        EventStream::new(receiver),
    )
}

/// Producing half, owned by the session.
#[derive(Debug)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    /// Deliver an event. Returns `false` if the sink is closed or the
    /// subscriber has gone away.
    pub fn emit(&self, event: SessionEvent) -> bool {
        let Some(sender) = &self.sender else {
            trace!("event dropped after stream closed");
            return false;
        };
        sender.send(event).is_ok()
    }

    /// End the stream. Calling it again has no effect.
    pub fn close(&mut self) {
        if self.sender.take().is_some() {
            trace!("event stream closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.as_ref().map_or(true, |sender| sender.is_closed())
    }
}

/// Filter function type for event streams.
pub type EventFilter = Box<dyn Fn(&SessionEvent) -> bool + Send + Sync>;

/// Consuming half, held by the subscriber.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    fn new(receiver: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    ///
    /// ```ignore
    /// let errors = stream.filter(|event| matches!(event, SessionEvent::Error(_)));
    /// ```
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SessionEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &SessionEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Next matching event, or `None` once the session has closed the stream
    /// and every queued event has been consumed.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Some(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<SessionEvent, TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Drain every event that is already queued.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = SessionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.receiver.poll_recv(cx) {
                Poll::Ready(Some(event)) if !this.accepts(&event) => continue,
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn snapshot(state: ProcessingState) -> PlaybackSnapshot {
        PlaybackSnapshot {
            processing_state: state,
            update_position_micros: 0,
            update_time_millis: 0,
            buffered_position_micros: 0,
            duration_micros: None,
            current_index: None,
            session_id: None,
            stream_metadata: StreamMetadata::default(),
        }
    }

    #[tokio::test]
    async fn test_stream_ends_after_close() {
        let (mut sink, mut stream) = event_channel();

        assert!(sink.emit(SessionEvent::Snapshot(snapshot(ProcessingState::Ready))));
        sink.close();
        sink.close();
        assert!(!sink.emit(SessionEvent::Snapshot(snapshot(ProcessingState::None))));

        let first = stream.recv().await.unwrap();
        assert_eq!(
            first.as_snapshot().unwrap().processing_state,
            ProcessingState::Ready
        );
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_filter_skips_non_matching() {
        let (sink, stream) = event_channel();
        let mut errors = stream.filter(|event| matches!(event, SessionEvent::Error(_)));

        sink.emit(SessionEvent::Snapshot(snapshot(ProcessingState::Loading)));
        sink.emit(SessionEvent::Error(ErrorEvent::new("source", "404")));

        let event = errors.recv().await.unwrap();
        assert_eq!(event.as_error().unwrap().code, "source");
        assert!(matches!(errors.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_stream_impl() {
        let (mut sink, stream) = event_channel();
        sink.emit(SessionEvent::Snapshot(snapshot(ProcessingState::Buffering)));
        sink.emit(SessionEvent::Snapshot(snapshot(ProcessingState::Ready)));
        sink.close();

        let states: Vec<_> = stream
            .map(|event| event.as_snapshot().unwrap().processing_state)
            .collect()
            .await;
        assert_eq!(states, vec![ProcessingState::Buffering, ProcessingState::Ready]);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut snap = snapshot(ProcessingState::Ready);
        snap.duration_micros = Some(3_000_000);
        snap.current_index = Some(1);

        let value = serde_json::to_value(SessionEvent::Snapshot(snap)).unwrap();
        assert_eq!(value["event"], "snapshot");
        assert_eq!(value["data"]["processingState"], "ready");
        assert_eq!(value["data"]["durationMicros"], 3_000_000);
        assert_eq!(value["data"]["currentIndex"], 1);
    }

    #[test]
    fn test_engine_usable_states() {
        assert!(!ProcessingState::None.is_engine_usable());
        assert!(!ProcessingState::Loading.is_engine_usable());
        assert!(ProcessingState::Buffering.is_engine_usable());
        assert!(ProcessingState::Completed.is_engine_usable());
    }
}
