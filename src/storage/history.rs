use alloc::collections::VecDeque;
use alloc::vec::Vec;

use log::debug;

use super::{CounterSample, HistoryQuery, SortOrder, TimeRange};
use crate::clock::Clock;
use crate::config::HistoryConfig;

/// Time-ordered buffer of raw counter readings with age and size limits.
///
/// Samples are appended at the back with the clock's current time, so the
/// buffer is always sorted by timestamp and both eviction policies only ever
/// trim the front.
///
/// ## Retention
///
/// - **Size**: with `max_elements > 0`, pushing into a full window drops the
///   single oldest sample first.
/// - **Age**: [`clean`](Self::clean) drops every sample older than
///   `expiration_secs`, then trims to `max_elements`.
pub struct HistoryWindow<C> {
    samples: VecDeque<CounterSample>,
    expiration_secs: u64,
    max_elements: usize,
    clock: C,
}

impl<C: Clock> HistoryWindow<C> {
    /// Create an empty window. Storage grows with pushes, never up front
    /// from `max_elements`.
    pub fn new(config: HistoryConfig, clock: C) -> Self {
        Self {
            samples: VecDeque::new(),
            expiration_secs: config.expiration_secs,
            max_elements: config.max_elements,
            clock,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now_secs()
    }

    pub fn expiration_secs(&self) -> u64 {
        self.expiration_secs
    }

    pub fn max_elements(&self) -> usize {
        self.max_elements
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<CounterSample> {
        self.samples.back().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Record `value` at the current time.
    pub fn push(&mut self, value: u32) {
        // Never stamp a sample older than its predecessor.
        let timestamp = match self.samples.back() {
            Some(last) => self.clock.now_secs().max(last.timestamp),
            None => self.clock.now_secs(),
        };

        if self.max_elements > 0 && self.samples.len() >= self.max_elements {
            self.samples.pop_front();
        }
        self.samples.push_back(CounterSample::new(value, timestamp));
    }

    /// Copy out the samples selected by `query`.
    pub fn get(&self, query: &HistoryQuery) -> Vec<CounterSample> {
        let mut selected: Vec<CounterSample> = match query.range {
            TimeRange::All => self.samples.iter().copied().collect(),
            TimeRange::Between { start, end } => self
                .samples
                .iter()
                .filter(|s| s.timestamp >= start && s.timestamp <= end)
                .copied()
                .collect(),
            TimeRange::Recent(secs) => {
                let from = self.now().saturating_sub(secs);
                self.samples
                    .iter()
                    .filter(|s| s.timestamp >= from)
                    .copied()
                    .collect()
            }
        };

        if query.order == Some(SortOrder::Descending) {
            selected.reverse();
        }
        if let Some(limit) = query.limit {
            selected.truncate(limit);
        }
        selected
    }

    /// Drop expired samples, then enforce the size limit.
    pub fn clean(&mut self) {
        let before = self.samples.len();

        // Keep samples with timestamp >= now - expiration + 1.
        let cutoff = (self.now() + 1).saturating_sub(self.expiration_secs);
        let expired = self.samples.partition_point(|s| s.timestamp < cutoff);
        self.samples.drain(..expired);

        if self.max_elements > 0 && self.samples.len() > self.max_elements {
            let excess = self.samples.len() - self.max_elements;
            self.samples.drain(..excess);
        }

        let removed = before - self.samples.len();
        if removed > 0 {
            debug!(
                "History clean removed {} samples, {} retained",
                removed,
                self.samples.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualClock;

    fn window(
        expiration_secs: u64,
        max_elements: usize,
    ) -> (HistoryWindow<ManualClock>, ManualClock) {
        let clock = ManualClock::new(1000);
        let history = HistoryWindow::new(
            HistoryConfig {
                expiration_secs,
                max_elements,
            },
            clock.clone(),
        );
        (history, clock)
    }

    fn values(samples: &[CounterSample]) -> Vec<u32> {
        samples.iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_push_never_exceeds_max_elements() {
        for max in 1..=5 {
            let (mut history, clock) = window(600, max);
            for value in 0..20 {
                history.push(value);
                clock.advance(1);
                assert!(history.len() <= max);
            }
            // The newest samples are the ones kept.
            let kept = values(&history.get(&HistoryQuery::all()));
            let expected: Vec<u32> = (20 - max as u32..20).collect();
            assert_eq!(kept, expected);
        }
    }

    #[test]
    fn test_huge_max_elements_does_not_reserve_storage() {
        let (mut history, clock) = window(600, usize::MAX);
        assert!(history.samples.capacity() < 1024);
        for value in 0..3 {
            history.push(value);
            clock.advance(1);
        }
        history.clean();
        assert_eq!(values(&history.get(&HistoryQuery::all())), vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_max_elements_is_unbounded() {
        let (mut history, _clock) = window(600, 0);
        for value in 0..1000 {
            history.push(value);
        }
        assert_eq!(history.len(), 1000);
    }

    #[test]
    fn test_push_stamps_current_time() {
        let (mut history, clock) = window(600, 10);
        history.push(7);
        clock.advance(5);
        history.push(9);
        assert_eq!(
            history.get(&HistoryQuery::all()),
            vec![CounterSample::new(7, 1000), CounterSample::new(9, 1005)]
        );
        assert_eq!(history.latest(), Some(CounterSample::new(9, 1005)));
    }

    #[test]
    fn test_push_keeps_timestamps_ordered_if_clock_steps_back() {
        let (mut history, clock) = window(600, 10);
        history.push(1);
        clock.set(990);
        history.push(2);
        let samples = history.get(&HistoryQuery::all());
        assert_eq!(samples[1].timestamp, 1000);
    }

    #[test]
    fn test_clean_drops_expired_samples() {
        for expiration in [1, 5, 30] {
            let (mut history, clock) = window(expiration, 0);
            for value in 0..60 {
                history.push(value);
                clock.advance(1);
            }
            history.clean();
            let now = clock.now_secs();
            let samples = history.get(&HistoryQuery::all());
            assert!(!samples.is_empty() || expiration == 1);
            assert!(
                samples
                    .iter()
                    .all(|s| s.timestamp + expiration >= now + 1)
            );
        }
    }

    #[test]
    fn test_clean_boundary() {
        let (mut history, clock) = window(10, 0);
        history.push(1); // t=1000
        clock.advance(1);
        history.push(2); // t=1001
        clock.set(1010);
        history.clean();
        // cutoff = 1010 - 10 + 1 = 1001
        assert_eq!(values(&history.get(&HistoryQuery::all())), vec![2]);
    }

    #[test]
    fn test_clean_trims_to_max_elements() {
        let (mut history, _clock) = window(600, 0);
        for value in 0..10 {
            history.push(value);
        }
        history.max_elements = 4;
        history.clean();
        assert_eq!(values(&history.get(&HistoryQuery::all())), vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let (mut history, clock) = window(20, 8);
        for value in 0..40 {
            history.push(value);
            clock.advance(1);
        }
        history.clean();
        let first = history.get(&HistoryQuery::all());
        history.clean();
        assert_eq!(history.get(&HistoryQuery::all()), first);
    }

    #[test]
    fn test_clean_before_expiration_elapsed_keeps_everything() {
        let clock = ManualClock::new(3);
        let mut history = HistoryWindow::new(HistoryConfig::default(), clock.clone());
        history.push(1);
        history.push(2);
        history.clean();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_get_between_is_inclusive() {
        let (mut history, clock) = window(600, 0);
        for value in 0..10 {
            history.push(value);
            clock.advance(10);
        }
        let selected = history.get(&HistoryQuery::between(1020, 1050));
        assert_eq!(values(&selected), vec![2, 3, 4, 5]);

        assert!(history.get(&HistoryQuery::between(1050, 1020)).is_empty());
        assert!(history.get(&HistoryQuery::between(5000, 6000)).is_empty());
    }

    #[test]
    fn test_get_recent() {
        let (mut history, clock) = window(600, 0);
        for value in 0..10 {
            history.push(value);
            clock.advance(10);
        }
        // now = 1100, samples at 1000..=1090
        assert_eq!(values(&history.get(&HistoryQuery::recent(30))), vec![7, 8, 9]);

        // Zero seconds selects only samples taken exactly now.
        assert!(history.get(&HistoryQuery::recent(0)).is_empty());
        history.push(10);
        assert_eq!(values(&history.get(&HistoryQuery::recent(0))), vec![10]);
    }

    #[test]
    fn test_get_order_and_limit() {
        let (mut history, clock) = window(600, 0);
        for value in 0..5 {
            history.push(value);
            clock.advance(1);
        }
        let query = HistoryQuery::all()
            .with_order(SortOrder::Descending)
            .with_limit(3);
        assert_eq!(values(&history.get(&query)), vec![4, 3, 2]);

        let query = HistoryQuery::all()
            .with_order(SortOrder::Ascending)
            .with_limit(2);
        assert_eq!(values(&history.get(&query)), vec![0, 1]);

        let query = HistoryQuery::all().with_limit(0);
        assert!(history.get(&query).is_empty());
    }

    #[test]
    fn test_get_returns_a_copy() {
        let (mut history, _clock) = window(600, 0);
        history.push(1);
        let snapshot = history.get(&HistoryQuery::all());
        history.push(2);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(history.len(), 2);
    }
}
