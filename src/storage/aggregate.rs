//! Pulse totals and peak rates over a slice of history
//!
//! Both functions expect samples in ascending timestamp order, as returned by
//! [`HistoryWindow::get`](super::HistoryWindow::get) without a descending sort.

use super::CounterSample;

/// Pulses counted over a window and the window's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseCount {
    pub pulses: u64,
    pub duration_secs: u64,
}

/// The consecutive-sample step with the highest pulse rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeakStep {
    pub step: u64,
    pub time_span: u64,
}

/// Total pulses across `samples`, tolerating counter resets.
///
/// A drop in value means the counter was zeroed between the two readings: the
/// earlier reading is what had accumulated up to the reset, and the later one
/// is counted from zero by the following step.
pub fn accumulate(samples: &[CounterSample]) -> PulseCount {
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return PulseCount::default();
    };
    if samples.len() < 2 {
        return PulseCount::default();
    }

    let pulses = samples
        .windows(2)
        .map(|pair| {
            let (prev, next) = (pair[0].value, pair[1].value);
            if next >= prev {
                (next - prev) as u64
            } else {
                prev as u64
            }
        })
        .sum();

    PulseCount {
        pulses,
        duration_secs: last.timestamp.saturating_sub(first.timestamp),
    }
}

/// The step between consecutive samples with the highest pulses-per-second.
///
/// Pairs without elapsed time are skipped, and so are reset boundaries (a drop
/// in value); they never take part in the comparison. Ties keep the earliest
/// pair. Returns `(0, 0)` when no pair qualifies.
pub fn peak_rate(samples: &[CounterSample]) -> PeakStep {
    let mut peak: Option<PeakStep> = None;

    for pair in samples.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.timestamp <= prev.timestamp || next.value < prev.value {
            continue;
        }
        let candidate = PeakStep {
            step: (next.value - prev.value) as u64,
            time_span: next.timestamp - prev.timestamp,
        };
        match peak {
            Some(best) if !faster(&candidate, &best) => {}
            _ => peak = Some(candidate),
        }
    }

    peak.unwrap_or_default()
}

/// `a.step / a.time_span > b.step / b.time_span`, compared without division.
fn faster(a: &PeakStep, b: &PeakStep) -> bool {
    (a.step as u128) * (b.time_span as u128) > (b.step as u128) * (a.time_span as u128)
}
