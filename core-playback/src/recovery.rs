//! Bounded skip-ahead after engine errors.
//!
//! When an item in a playlist fails the session can keep playing by
//! re-submitting the source graph and seeking to the start of the next item.
//! The error count only resets on a new load, so a playlist full of broken
//! items stops being retried after `max_errors` failures.

use tracing::debug;

/// What the engine looked like when the error arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineProbe {
    pub has_next_item: bool,
    pub current_index: Option<usize>,
    pub timeline_len: usize,
}

#[derive(Debug, Clone)]
pub struct ErrorRecoveryPolicy {
    max_errors: u32,
    error_count: u32,
}

impl ErrorRecoveryPolicy {
    pub fn new(max_errors: u32) -> Self {
        Self {
            max_errors,
            error_count: 0,
        }
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Called by a new load only.
    pub fn reset(&mut self) {
        self.error_count = 0;
    }

    /// Count an engine error and return the index to skip to, if recovery
    /// should run.
    pub fn on_error(&mut self, probe: TimelineProbe) -> Option<usize> {
        self.error_count = self.error_count.saturating_add(1);

        if !probe.has_next_item || self.error_count > self.max_errors {
            debug!(
                error_count = self.error_count,
                has_next = probe.has_next_item,
                "skip-ahead recovery not attempted"
            );
            return None;
        }

        let next = probe.current_index? + 1;
        (next < probe.timeline_len).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(current: Option<usize>, len: usize) -> TimelineProbe {
        TimelineProbe {
            has_next_item: true,
            current_index: current,
            timeline_len: len,
        }
    }

    #[test]
    fn test_skips_to_next_item() {
        let mut policy = ErrorRecoveryPolicy::new(5);
        assert_eq!(policy.on_error(probe(Some(2), 10)), Some(3));
        assert_eq!(policy.error_count(), 1);
    }

    #[test]
    fn test_stops_after_max_errors() {
        let mut policy = ErrorRecoveryPolicy::new(5);
        for index in 0..5 {
            assert_eq!(policy.on_error(probe(Some(index), 20)), Some(index + 1));
        }
        assert_eq!(policy.on_error(probe(Some(5), 20)), None);
        assert_eq!(policy.error_count(), 6);

        policy.reset();
        assert_eq!(policy.on_error(probe(Some(5), 20)), Some(6));
    }

    #[test]
    fn test_requires_known_index_and_room_in_timeline() {
        let mut policy = ErrorRecoveryPolicy::new(5);
        assert_eq!(policy.on_error(probe(None, 3)), None);
        assert_eq!(policy.on_error(probe(Some(2), 3)), None);

        let last = TimelineProbe {
            has_next_item: false,
            current_index: Some(0),
            timeline_len: 3,
        };
        assert_eq!(policy.on_error(last), None);
        assert_eq!(policy.error_count(), 3);
    }
}
