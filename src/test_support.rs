//! Deterministic clock and scripted counter device for unit tests

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU8, Ordering};

use crate::clock::Clock;
use crate::config::AnemometerConfig;
use crate::sensors::{COUNTER_MAX, CounterDevice, CounterMode, DeviceError};

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self(Rc::new(Cell::new(start)))
    }

    pub fn advance(&self, secs: u64) {
        self.0.set(self.0.get() + secs);
    }

    pub fn set(&self, secs: u64) {
        self.0.set(secs);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Open,
    Close,
    Reset,
    SetMode(CounterMode),
    SetCount(u32),
    GetCount,
}

#[derive(Default)]
struct MockState {
    open: bool,
    count: u32,
    /// Queued results for `get_count`; an empty queue reads `count`.
    reads: VecDeque<Result<u32, DeviceError>>,
    fail_reset: bool,
    /// `get_count` never completes while set.
    stall_reads: bool,
    calls: Vec<Call>,
}

/// Counter device whose reads are scripted. Clones share state, so a test can
/// keep a handle after moving the device into a sampler.
#[derive(Clone, Default)]
pub struct MockCounter(Rc<RefCell<MockState>>);

impl MockCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_count(&self, count: u32) {
        self.0.borrow_mut().count = count;
    }

    pub fn queue_read(&self, result: Result<u32, DeviceError>) {
        self.0.borrow_mut().reads.push_back(result);
    }

    pub fn fail_reset(&self, fail: bool) {
        self.0.borrow_mut().fail_reset = fail;
    }

    pub fn stall_reads(&self, stall: bool) {
        self.0.borrow_mut().stall_reads = stall;
    }

    pub fn is_open(&self) -> bool {
        self.0.borrow().open
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.0.borrow_mut().calls.clear();
    }

    fn record(&self, call: Call) -> Result<(), DeviceError> {
        let mut state = self.0.borrow_mut();
        state.calls.push(call);
        let needs_open = !matches!(call, Call::Open | Call::Close);
        if needs_open && !state.open {
            return Err(DeviceError::NotOpen);
        }
        Ok(())
    }
}

impl CounterDevice for MockCounter {
    async fn open(&mut self) -> Result<(), DeviceError> {
        self.record(Call::Open)?;
        let mut state = self.0.borrow_mut();
        if state.open {
            return Err(DeviceError::AlreadyOpen);
        }
        state.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.record(Call::Close)?;
        let mut state = self.0.borrow_mut();
        if !state.open {
            return Err(DeviceError::AlreadyClosed);
        }
        state.open = false;
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), DeviceError> {
        self.record(Call::Reset)?;
        let mut state = self.0.borrow_mut();
        if state.fail_reset {
            return Err(DeviceError::Bus { operation: "reset" });
        }
        state.count = 0;
        Ok(())
    }

    async fn set_mode(&mut self, mode: CounterMode) -> Result<(), DeviceError> {
        self.record(Call::SetMode(mode))
    }

    async fn set_count(&mut self, value: u32) -> Result<(), DeviceError> {
        self.record(Call::SetCount(value))?;
        if value > COUNTER_MAX {
            return Err(DeviceError::InvalidValue(value));
        }
        self.0.borrow_mut().count = value;
        Ok(())
    }

    async fn get_count(&mut self) -> Result<u32, DeviceError> {
        self.record(Call::GetCount)?;
        if self.0.borrow().stall_reads {
            core::future::pending::<()>().await;
        }
        let mut state = self.0.borrow_mut();
        match state.reads.pop_front() {
            Some(result) => result,
            None => Ok(state.count),
        }
    }
}

/// Config with a bus id no other test uses, so bus claims never collide.
pub fn unique_config() -> AnemometerConfig {
    static NEXT_BUS: AtomicU8 = AtomicU8::new(0);
    AnemometerConfig {
        bus: NEXT_BUS.fetch_add(1, Ordering::Relaxed),
        ..Default::default()
    }
}
