//! Periodic counter sampling with retry and self-healing
//!
//! The [`Sampler`] owns the counter device and the history window. While it
//! is running, every tick cleans the window, reads the counter (retrying on
//! failure), records the reading and zeroes the device before it can wrap.
//! Read failures never leave the tick: after the retry budget is spent the
//! device is re-initialized and a zero sample marks the reset boundary.
//!
//! ## Lifecycle
//!
//! ```text
//! Closed --open()--> Opening --> Running --close()--> Closing --> Closed
//! ```
//!
//! `open()` on anything but `Closed`, or `close()` on anything but `Running`,
//! returns a [`StateError`] instead of being ignored.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let sampler = Sampler::new(counter, &config, MonotonicClock);
//! sampler.open().await?;
//! // Drive the periodic task next to the rest of the application.
//! select(sampler.run(), app_logic(&sampler)).await;
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer, with_timeout};
use log::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::AnemometerConfig;
use crate::error::{Error, StateError};
use crate::sensors::{COUNTER_MAX, CounterDevice, CounterMode, DeviceError};
use crate::storage::{CounterSample, HistoryQuery, HistoryWindow};

/// Error a read-failure callback may report. It is logged and dropped.
pub type CallbackError = heapless::String<64>;

/// Invoked after every failed read attempt.
pub type ReadFailedCallback = Box<dyn Fn(&ReadFailure) -> Result<(), CallbackError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Closed,
    Opening,
    Running,
    Closing,
}

/// Details of one failed read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFailure {
    /// 1-based attempt number within the tick
    pub attempt: u8,
    pub retries: u8,
    pub error: DeviceError,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The reading was recorded.
    Sampled(u32),
    /// The reading was recorded, then the device was zeroed.
    RolledOver(u32),
    /// Every read failed; the device was re-initialized.
    Recovered,
    /// Every read failed and re-initialization failed too. Nothing was recorded.
    RecoveryFailed,
}

pub struct Sampler<D, C> {
    device: Mutex<CriticalSectionRawMutex, D>,
    history: BlockingMutex<CriticalSectionRawMutex, RefCell<HistoryWindow<C>>>,
    state: BlockingMutex<CriticalSectionRawMutex, Cell<SamplerState>>,
    /// Raised by `open()` to start the run loop.
    started: Signal<CriticalSectionRawMutex, ()>,
    /// Raised by `close()` to stop the run loop.
    stop: Signal<CriticalSectionRawMutex, ()>,
    read_interval: Duration,
    read_timeout: Option<Duration>,
    retries: u8,
    rollover_threshold: u32,
    read_failed: Option<ReadFailedCallback>,
}

impl<D: CounterDevice, C: Clock> Sampler<D, C> {
    /// Create a closed sampler. `config` is expected to be validated.
    pub fn new(device: D, config: &AnemometerConfig, clock: C) -> Self {
        Self {
            device: Mutex::new(device),
            history: BlockingMutex::new(RefCell::new(HistoryWindow::new(config.history, clock))),
            state: BlockingMutex::new(Cell::new(SamplerState::Closed)),
            started: Signal::new(),
            stop: Signal::new(),
            read_interval: config.read_interval(),
            read_timeout: config.read_timeout(),
            retries: config.retries,
            rollover_threshold: config.rollover_threshold,
            read_failed: None,
        }
    }

    /// Attach a callback notified of every failed read attempt.
    pub fn with_read_failed(mut self, callback: ReadFailedCallback) -> Self {
        self.read_failed = Some(callback);
        self
    }

    pub fn state(&self) -> SamplerState {
        self.state.lock(|state| state.get())
    }

    pub fn is_running(&self) -> bool {
        self.state() == SamplerState::Running
    }

    /// Copy of the samples selected by `query`.
    pub fn history(&self, query: &HistoryQuery) -> Vec<CounterSample> {
        self.history.lock(|history| history.borrow().get(query))
    }

    pub fn history_len(&self) -> usize {
        self.history.lock(|history| history.borrow().len())
    }

    pub fn expiration_secs(&self) -> u64 {
        self.history.lock(|history| history.borrow().expiration_secs())
    }

    fn set_state(&self, next: SamplerState) {
        self.state.lock(|state| state.set(next));
    }

    fn transition(&self, from: SamplerState, to: SamplerState) -> Result<(), StateError> {
        self.state.lock(|state| match state.get() {
            current if current == from => {
                state.set(to);
                Ok(())
            }
            SamplerState::Running => Err(StateError::AlreadyOpen),
            SamplerState::Closed => Err(StateError::AlreadyClosed),
            SamplerState::Opening | SamplerState::Closing => Err(StateError::Busy),
        })
    }

    fn push(&self, value: u32) {
        self.history.lock(|history| history.borrow_mut().push(value));
    }

    /// Bring the counter to a known zero state.
    async fn initialize(device: &mut D) -> Result<(), DeviceError> {
        device.reset().await?;
        device.set_mode(CounterMode::EventCounter).await?;
        device.set_count(0).await
    }

    /// Open and zero the device, then enable the run loop.
    pub async fn open(&self) -> Result<(), Error> {
        self.transition(SamplerState::Closed, SamplerState::Opening)?;

        let mut device = self.device.lock().await;
        if let Err(e) = device.open().await {
            error!("Failed to open counter device: {}", e);
            self.set_state(SamplerState::Closed);
            return Err(e.into());
        }
        if let Err(e) = Self::initialize(&mut device).await {
            error!("Failed to initialize counter device: {}", e);
            if let Err(e) = device.close().await {
                warn!("Failed to close counter device after init failure: {}", e);
            }
            self.set_state(SamplerState::Closed);
            return Err(e.into());
        }

        self.push(0);
        self.stop.reset();
        self.set_state(SamplerState::Running);
        self.started.signal(());
        info!(
            "Sampler running ({} ms interval, {} retries)",
            self.read_interval.as_millis(),
            self.retries
        );
        Ok(())
    }

    /// Stop the run loop and close the device.
    ///
    /// A tick already holding the device finishes before the device is closed.
    pub async fn close(&self) -> Result<(), Error> {
        self.transition(SamplerState::Running, SamplerState::Closing)?;
        self.started.reset();
        self.stop.signal(());

        let mut device = self.device.lock().await;
        let result = device.close().await;
        self.set_state(SamplerState::Closed);
        info!("Sampler closed");
        result.map_err(Error::from)
    }

    /// Run one tick: clean the window, read the counter and record the result.
    pub async fn sample(&self) -> Result<TickOutcome, Error> {
        if !self.is_running() {
            return Err(StateError::NotRunning.into());
        }
        self.history.lock(|history| history.borrow_mut().clean());

        let mut device = self.device.lock().await;
        // close() may have started while we waited for the device.
        if !self.is_running() {
            return Err(StateError::NotRunning.into());
        }

        for attempt in 1..=self.retries {
            match self.read_count(&mut device).await {
                Ok(value) => return Ok(self.record(&mut device, value).await),
                Err(e) => {
                    warn!(
                        "Counter read attempt {}/{} failed: {}",
                        attempt, self.retries, e
                    );
                    self.notify_read_failed(ReadFailure {
                        attempt,
                        retries: self.retries,
                        error: e,
                    });
                }
            }
        }

        error!(
            "All {} counter reads failed, resetting device",
            self.retries
        );
        match Self::initialize(&mut device).await {
            Ok(()) => {
                self.push(0);
                Ok(TickOutcome::Recovered)
            }
            Err(e) => {
                error!("Counter device recovery failed: {}", e);
                Ok(TickOutcome::RecoveryFailed)
            }
        }
    }

    async fn read_count(&self, device: &mut D) -> Result<u32, DeviceError> {
        let value = match self.read_timeout {
            Some(timeout) => match with_timeout(timeout, device.get_count()).await {
                Ok(result) => result?,
                Err(_) => return Err(DeviceError::Timeout),
            },
            None => device.get_count().await?,
        };
        if value > COUNTER_MAX {
            return Err(DeviceError::InvalidValue(value));
        }
        Ok(value)
    }

    async fn record(&self, device: &mut D, value: u32) -> TickOutcome {
        self.push(value);
        if value <= self.rollover_threshold {
            return TickOutcome::Sampled(value);
        }

        // Zero the counter well before it wraps so the next delta is unambiguous.
        match device.set_count(0).await {
            Ok(()) => {
                self.push(0);
                debug!("Counter rolled over at {}", value);
                TickOutcome::RolledOver(value)
            }
            Err(e) => {
                warn!("Failed to zero counter at {}: {}", value, e);
                TickOutcome::Sampled(value)
            }
        }
    }

    fn notify_read_failed(&self, failure: ReadFailure) {
        if let Some(callback) = &self.read_failed {
            if let Err(e) = callback(&failure) {
                debug!("Read-failure callback reported an error: {}", e);
            }
        }
    }

    /// The periodic task. Never returns.
    ///
    /// Waits for `open()`, then ticks every read interval until `close()`,
    /// then waits for the next `open()`. Ticks run one after another, so at
    /// most one device transaction is in flight.
    pub async fn run(&self) {
        loop {
            self.started.wait().await;
            debug!("Sampling loop started");

            loop {
                if let Either::Second(()) =
                    select(Timer::after(self.read_interval), self.stop.wait()).await
                {
                    break;
                }
                match self.sample().await {
                    Ok(outcome) => debug!("Tick: {:?}", outcome),
                    Err(Error::State(StateError::NotRunning)) => break,
                    Err(e) => error!("Tick failed: {}", e),
                }
            }

            debug!("Sampling loop stopped");
        }
    }
}
