//! Buffered-position poll loop.
//!
//! Engines do not report buffer progress as events, so while buffering or
//! ready the session samples it on a timer. Every tick is tagged with the
//! generation that armed it. Restarting or cancelling the loop bumps the
//! generation, so ticks armed before a new load or teardown are ignored when
//! they fire.

use bridge_traits::platform::PlatformSendSync;
use core_runtime::config::PollIntervals;
use std::time::Duration;

/// Delivers a poll tick back to the session after a delay.
///
/// The session calls [`PlaybackSession::on_poll_tick`] with the generation
/// when the tick fires. [`SessionDriver`] implements this with
/// `tokio::time::sleep`; tests record the requests and fire them by hand.
///
/// [`PlaybackSession::on_poll_tick`]: crate::PlaybackSession::on_poll_tick
/// [`SessionDriver`]: crate::driver::SessionDriver
pub trait TickScheduler: PlatformSendSync {
    fn schedule(&self, delay: Duration, generation: u64);
}

/// Engine condition observed on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Buffering,
    Playing,
    Paused,
    /// Neither buffering nor ready; the loop stops.
    Idle,
}

#[derive(Debug, Clone)]
pub struct BufferPoller {
    intervals: PollIntervals,
    generation: u64,
    active: bool,
}

impl BufferPoller {
    pub fn new(intervals: PollIntervals) -> Self {
        Self {
            intervals,
            generation: 0,
            active: false,
        }
    }

    /// Arm a new loop, invalidating every outstanding tick. Returns the
    /// generation the first tick must carry.
    pub fn restart(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.active = true;
        self.generation
    }

    /// Invalidate every outstanding tick.
    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a tick armed with `generation` should run.
    pub fn accepts(&self, generation: u64) -> bool {
        self.active && generation == self.generation
    }

    /// Delay until the next tick, or `None` to stop the loop.
    pub fn next_delay(&mut self, phase: PollPhase) -> Option<Duration> {
        let delay = match phase {
            PollPhase::Buffering => Some(self.intervals.buffering),
            PollPhase::Playing => Some(self.intervals.playing),
            PollPhase::Paused => Some(self.intervals.paused),
            PollPhase::Idle => None,
        };
        if delay.is_none() {
            self.active = false;
        }
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_invalidates_old_generation() {
        let mut poller = BufferPoller::new(PollIntervals::default());
        let first = poller.restart();
        assert!(poller.accepts(first));

        let second = poller.restart();
        assert!(!poller.accepts(first));
        assert!(poller.accepts(second));

        poller.cancel();
        assert!(!poller.accepts(second));
        assert!(!poller.is_active());
    }

    #[test]
    fn test_intervals_follow_phase() {
        let mut poller = BufferPoller::new(PollIntervals::default());
        let generation = poller.restart();

        assert_eq!(poller.next_delay(PollPhase::Buffering), Some(Duration::from_millis(200)));
        assert_eq!(poller.next_delay(PollPhase::Playing), Some(Duration::from_millis(500)));
        assert_eq!(poller.next_delay(PollPhase::Paused), Some(Duration::from_millis(1000)));
        assert!(poller.accepts(generation));

        assert_eq!(poller.next_delay(PollPhase::Idle), None);
        assert!(!poller.accepts(generation));
    }
}
