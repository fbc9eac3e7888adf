pub mod aggregate;
pub mod history;

pub use aggregate::{PeakStep, PulseCount, accumulate, peak_rate};
pub use history::HistoryWindow;

use core::fmt::Display;

use serde::{Deserialize, Serialize};

/// Raw counter reading, stamped with process-local monotonic seconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSample {
    /// Counter value in `[0, 999999]`
    pub value: u32,
    /// Seconds on the sampler's clock
    pub timestamp: u64,
}

impl CounterSample {
    pub const fn new(value: u32, timestamp: u64) -> Self {
        Self { value, timestamp }
    }
}

impl Display for CounterSample {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[CounterSample] timestamp: {}s, value: {}",
            self.timestamp, self.value
        )
    }
}

/// Which part of the history a query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    /// Everything currently retained
    #[default]
    All,
    /// Samples with `start <= timestamp <= end`
    Between { start: u64, end: u64 },
    /// Samples with `timestamp >= now - secs`
    Recent(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first (insertion order)
    Ascending,
    /// Newest first
    Descending,
}

/// Selection of samples from a [`HistoryWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryQuery {
    pub range: TimeRange,
    pub order: Option<SortOrder>,
    /// Keep at most this many samples, counted after ordering.
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub const fn all() -> Self {
        Self {
            range: TimeRange::All,
            order: None,
            limit: None,
        }
    }

    pub const fn between(start: u64, end: u64) -> Self {
        Self {
            range: TimeRange::Between { start, end },
            order: None,
            limit: None,
        }
    }

    pub const fn recent(secs: u64) -> Self {
        Self {
            range: TimeRange::Recent(secs),
            order: None,
            limit: None,
        }
    }

    pub const fn with_order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
