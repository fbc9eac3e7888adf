//! Monotonic time source for sample timestamps

/// Source of process-local monotonic seconds.
pub trait Clock {
    /// Seconds elapsed since an arbitrary, fixed origin.
    fn now_secs(&self) -> u64;
}

/// Clock backed by the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_secs(&self) -> u64 {
        embassy_time::Instant::now().as_secs()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_secs(&self) -> u64 {
        (**self).now_secs()
    }
}
