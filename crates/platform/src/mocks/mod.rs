//! Simulated hardware.
//!
//! Mock implementations of the platform's hardware seams, used by the unit
//! and integration tests and by the host board simulator. Each mock records
//! what the core did to it and lets a test script what the "hardware" does
//! next.

use crate::indicator::PeriodicCounter;
use crate::serial::SerialHw;
use crate::tick::SubTickReader;

/// Fixed sub-tick progress reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockSubTick {
    nanos: u32,
}

impl MockSubTick {
    /// A reader pinned at `nanos` into the current tick.
    pub const fn fixed(nanos: u32) -> Self {
        MockSubTick { nanos }
    }
}

impl SubTickReader for MockSubTick {
    fn nanos_into_tick(&self) -> u32 {
        self.nanos
    }
}

/// Scriptable free-running up-counter.
#[derive(Debug, Default)]
pub struct MockCounter {
    count: u16,
    period: Option<u16>,
    period_writes: usize,
}

impl MockCounter {
    /// A counter at zero with no period programmed.
    pub const fn new() -> Self {
        MockCounter {
            count: 0,
            period: None,
            period_writes: 0,
        }
    }

    /// Script the current counter value.
    pub fn set_count(&mut self, count: u16) {
        self.count = count;
    }

    /// The last programmed period, if any.
    pub fn period(&self) -> Option<u16> {
        self.period
    }

    /// How many times the period was programmed.
    pub fn period_writes(&self) -> usize {
        self.period_writes
    }
}

impl PeriodicCounter for MockCounter {
    fn set_period(&mut self, period: u16) {
        self.period = Some(period);
        self.period_writes = self.period_writes.saturating_add(1);
    }

    fn count(&self) -> u16 {
        self.count
    }
}

/// Recording output pin.
#[derive(Debug, Default)]
pub struct MockPin {
    level: bool,
}

impl MockPin {
    /// A pin driven low.
    pub const fn new() -> Self {
        MockPin { level: false }
    }

    /// The last level the core drove.
    pub fn is_set_high(&self) -> bool {
        self.level
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level = true;
        Ok(())
    }
}

/// Scriptable serial peripheral: records transmitted bytes, serves a
/// test-provided receive FIFO.
#[derive(Debug)]
pub struct MockSerial {
    tx_ready: bool,
    sent: heapless::Vec<u8, 256>,
    rx_fifo: heapless::Deque<u8, 64>,
}

impl MockSerial {
    /// A peripheral ready to transmit, with nothing received.
    pub fn new() -> Self {
        MockSerial {
            tx_ready: true,
            sent: heapless::Vec::new(),
            rx_fifo: heapless::Deque::new(),
        }
    }

    /// Script whether the transmit data register accepts bytes.
    pub fn set_tx_ready(&mut self, ready: bool) {
        self.tx_ready = ready;
    }

    /// Every byte the core handed to the transmit register, in order.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Forget the recorded transmit bytes.
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Script bytes "arriving" on the line. Bytes beyond the FIFO capacity
    /// are dropped, as a saturated hardware FIFO would.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let _ = self.rx_fifo.push_back(byte);
        }
    }
}

impl Default for MockSerial {
    fn default() -> Self {
        MockSerial::new()
    }
}

impl SerialHw for MockSerial {
    fn tx_ready(&self) -> bool {
        self.tx_ready
    }

    fn write_byte(&mut self, byte: u8) {
        let _ = self.sent.push(byte);
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.rx_fifo.pop_front()
    }
}
