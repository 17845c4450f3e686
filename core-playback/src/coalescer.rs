//! Snapshot staging and delivery.
//!
//! Command handlers stage snapshots with [`EventCoalescer::enqueue`] as they
//! mutate state and the command boundary calls [`EventCoalescer::flush`]
//! exactly once, so observers only ever see the state a command left behind.
//! Engine callbacks use [`EventCoalescer::broadcast`], which stages and
//! delivers in one step.

use core_runtime::events::{ErrorEvent, EventSink, PlaybackSnapshot, SessionEvent};
use tracing::{debug, trace};

#[derive(Debug)]
pub struct EventCoalescer {
    sink: EventSink,
    pending: Option<PlaybackSnapshot>,
    closed: bool,
}

impl EventCoalescer {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            pending: None,
            closed: false,
        }
    }

    /// Stage a snapshot, replacing any staged one.
    pub fn enqueue(&mut self, snapshot: PlaybackSnapshot) {
        if self.closed {
            return;
        }
        self.pending = Some(snapshot);
    }

    /// Deliver the staged snapshot, if any. Returns `true` if one was sent.
    pub fn flush(&mut self) -> bool {
        let Some(snapshot) = self.pending.take() else {
            return false;
        };
        if self.closed {
            return false;
        }
        trace!(state = ?snapshot.processing_state, "broadcasting snapshot");
        self.sink.emit(SessionEvent::Snapshot(snapshot))
    }

    /// Stage and deliver immediately.
    pub fn broadcast(&mut self, snapshot: PlaybackSnapshot) -> bool {
        self.enqueue(snapshot);
        self.flush()
    }

    /// Deliver a non-terminal error.
    pub fn emit_error(&mut self, error: ErrorEvent) -> bool {
        if self.closed {
            return false;
        }
        self.sink.emit(SessionEvent::Error(error))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// End the stream. Later calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.pending = None;
        self.closed = true;
        self.sink.close();
        debug!("event stream closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::events::{event_channel, ProcessingState, StreamMetadata};

    fn snapshot(state: ProcessingState, position: i64) -> PlaybackSnapshot {
        PlaybackSnapshot {
            processing_state: state,
            update_position_micros: position,
            update_time_millis: 0,
            buffered_position_micros: position,
            duration_micros: None,
            current_index: None,
            session_id: None,
            stream_metadata: StreamMetadata::default(),
        }
    }

    #[test]
    fn test_enqueue_keeps_only_latest() {
        let (sink, mut stream) = event_channel();
        let mut coalescer = EventCoalescer::new(sink);

        coalescer.enqueue(snapshot(ProcessingState::Loading, 0));
        coalescer.enqueue(snapshot(ProcessingState::Loading, 10));
        coalescer.enqueue(snapshot(ProcessingState::Loading, 20));
        assert!(coalescer.flush());
        assert!(!coalescer.flush());

        let events = stream.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_snapshot().unwrap().update_position_micros, 20);
    }

    #[test]
    fn test_nothing_after_close() {
        let (sink, mut stream) = event_channel();
        let mut coalescer = EventCoalescer::new(sink);

        coalescer.broadcast(snapshot(ProcessingState::None, 0));
        coalescer.close();
        coalescer.close();
        assert!(!coalescer.broadcast(snapshot(ProcessingState::Ready, 0)));
        assert!(!coalescer.emit_error(ErrorEvent::new("source", "late")));

        assert_eq!(stream.drain().len(), 1);
        assert!(matches!(
            stream.try_recv(),
            Err(core_runtime::events::TryRecvError::Disconnected)
        ));
    }
}
