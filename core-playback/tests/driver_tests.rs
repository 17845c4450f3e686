//! Tests for the tokio session driver
//!
//! The test plays the host engine: it reads the fake engine's recorded state
//! and sends callbacks through the engine event channel.

#![cfg(feature = "driver")]

mod support;

use bridge_traits::effects::NoEffects;
use bridge_traits::engine::{EngineErrorKind, EngineEvent, EngineState};
use bridge_traits::time::SystemClock;
use core_playback::driver::{engine_event_channel, DriverBridges, SessionDriver, SessionHandle};
use core_playback::{PlayerId, SessionError};
use core_runtime::config::SessionConfig;
use core_runtime::events::{event_channel, EventStream, ProcessingState, SessionEvent};
use std::sync::Arc;
use std::time::Duration;
use support::{playlist, FakeEngineFactory, SharedEngine};
use tokio::task::JoinHandle;

struct DriverHarness {
    handle: SessionHandle,
    engine: SharedEngine,
    engine_tx: core_playback::driver::EngineEventSender,
    events: EventStream,
    task: JoinHandle<()>,
}

fn start() -> DriverHarness {
    let factory = FakeEngineFactory::default();
    let engine = factory.shared.clone();
    let (engine_tx, engine_rx) = engine_event_channel();
    let (sink, events) = event_channel();

    let (driver, handle) = SessionDriver::new(
        PlayerId::new(),
        SessionConfig::default(),
        DriverBridges {
            engine_factory: Arc::new(factory),
            effect_factory: Arc::new(NoEffects),
            clock: Arc::new(SystemClock),
        },
        engine_rx,
        sink,
    )
    .expect("driver");

    DriverHarness {
        handle,
        engine,
        engine_tx,
        events,
        task: driver.spawn(),
    }
}

async fn next_snapshot_in(events: &mut EventStream, state: ProcessingState) {
    while let Some(event) = events.recv().await {
        if let SessionEvent::Snapshot(snapshot) = event {
            if snapshot.processing_state == state {
                return;
            }
        }
    }
    panic!("stream closed before reaching {:?}", state);
}

#[tokio::test]
async fn test_load_resolves_when_engine_reports_ready() {
    let mut harness = start();

    let load = tokio::spawn({
        let handle = harness.handle.clone();
        async move { handle.load(playlist(2), None, None).await }
    });

    next_snapshot_in(&mut harness.events, ProcessingState::Loading).await;
    harness.engine.lock().state = EngineState::Ready;
    harness.engine_tx.send(EngineEvent::TimelineChanged).unwrap();
    harness
        .engine_tx
        .send(EngineEvent::StateChanged(EngineState::Ready))
        .unwrap();

    let response = load.await.unwrap().unwrap();
    assert_eq!(response.duration_micros, Some(180_000_000));

    harness.handle.set_volume(0.5).await.unwrap();
    harness.handle.pause().await.unwrap();
    assert!(matches!(
        harness.handle.set_speed(-1.0).await,
        Err(SessionError::InvalidArgument(_))
    ));

    harness.handle.dispose().await.unwrap();
    harness.task.await.unwrap();

    assert!(harness.handle.is_closed());
    assert!(matches!(
        harness.handle.play().await,
        Err(SessionError::Disposed)
    ));
    harness.handle.dispose().await.unwrap();

    let mut last = None;
    while let Some(event) = harness.events.recv().await {
        last = Some(event);
    }
    let last = last.expect("final snapshot");
    assert_eq!(
        last.as_snapshot().unwrap().processing_state,
        ProcessingState::None
    );
}

#[tokio::test]
async fn test_engine_error_queued_before_load_does_not_fail_it() {
    let mut harness = start();

    let first = tokio::spawn({
        let handle = harness.handle.clone();
        async move { handle.load(playlist(2), None, None).await }
    });
    next_snapshot_in(&mut harness.events, ProcessingState::Loading).await;
    harness.engine.lock().state = EngineState::Ready;
    harness.engine_tx.send(EngineEvent::TimelineChanged).unwrap();
    harness
        .engine_tx
        .send(EngineEvent::StateChanged(EngineState::Ready))
        .unwrap();
    first.await.unwrap().unwrap();

    // Error for the old item, then a new load, both queued before the
    // driver gets to run.
    harness
        .engine_tx
        .send(EngineEvent::Error {
            kind: EngineErrorKind::Source,
            message: "decode failure".into(),
        })
        .unwrap();
    let mut reload = Box::pin({
        let handle = harness.handle.clone();
        async move { handle.load(playlist(3), None, None).await }
    });
    assert!(futures::poll!(&mut reload).is_pending());

    assert!(
        tokio::time::timeout(Duration::from_millis(50), &mut reload)
            .await
            .is_err(),
        "load resolved before the engine was ready"
    );
    assert_eq!(harness.handle.error_count().await.unwrap(), 0);

    harness.engine.lock().state = EngineState::Ready;
    harness.engine_tx.send(EngineEvent::TimelineChanged).unwrap();
    harness
        .engine_tx
        .send(EngineEvent::StateChanged(EngineState::Ready))
        .unwrap();
    let response = reload.await.unwrap();
    assert_eq!(response.duration_micros, Some(180_000_000));

    harness.handle.dispose().await.unwrap();
    harness.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_poll_ticks_report_buffer_progress() {
    let mut harness = start();

    let load = tokio::spawn({
        let handle = harness.handle.clone();
        async move { handle.load(playlist(1), None, None).await }
    });
    next_snapshot_in(&mut harness.events, ProcessingState::Loading).await;
    harness.engine.lock().state = EngineState::Ready;
    harness
        .engine_tx
        .send(EngineEvent::StateChanged(EngineState::Ready))
        .unwrap();
    load.await.unwrap().unwrap();

    harness.engine.lock().state = EngineState::Buffering;
    harness
        .engine_tx
        .send(EngineEvent::StateChanged(EngineState::Buffering))
        .unwrap();
    next_snapshot_in(&mut harness.events, ProcessingState::Buffering).await;

    harness.engine.lock().buffered_ms = 10_000;
    let progressed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = harness.events.recv().await {
            if let Some(snapshot) = event.as_snapshot() {
                if snapshot.buffered_position_micros == 10_000_000 {
                    return true;
                }
            }
        }
        false
    })
    .await
    .expect("buffer progress within timeout");
    assert!(progressed);

    harness.handle.dispose().await.unwrap();
    harness.task.await.unwrap();
}

#[tokio::test]
async fn test_dropping_every_handle_disposes_session() {
    let DriverHarness {
        handle,
        engine,
        mut events,
        task,
        ..
    } = start();

    handle.set_volume(1.0).await.unwrap();
    drop(handle);
    task.await.unwrap();

    assert_eq!(engine.lock().created, 1);
    let remaining: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        remaining
            .last()
            .and_then(|event| event.as_snapshot())
            .map(|snapshot| snapshot.processing_state),
        Some(ProcessingState::None)
    );
}
