//! Per-iteration service driver.
//!
//! The one control-flow integration point of the platform core: each pass of
//! the application's main loop calls [`LoopDriver::run_once`], which reads
//! the monotonic clock (high-resolution variant) and forwards it to the
//! serial channel's service routine. Nothing else happens here and the
//! driver holds no state of its own.

use crate::serial::{SerialChannel, SerialHw};
use crate::tick::{SubTickReader, TickClock};

/// Ties the clock to the serial channel's periodic service call.
///
/// Borrows the shared [`TickClock`] (the timer interrupt keeps advancing it)
/// and owns the [`SerialChannel`]. Consecutive
/// [`run_once`](LoopDriver::run_once) calls hand the channel non-decreasing
/// instants, modulo the clock's single-wraparound caveat.
pub struct LoopDriver<'clk, 'buf, S, H> {
    clock: &'clk TickClock<S>,
    serial: SerialChannel<'buf, H>,
}

impl<'clk, 'buf, S: SubTickReader, H: SerialHw> LoopDriver<'clk, 'buf, S, H> {
    /// A driver servicing `serial` with instants from `clock`.
    pub fn new(clock: &'clk TickClock<S>, serial: SerialChannel<'buf, H>) -> Self {
        LoopDriver { clock, serial }
    }

    /// One pass: read the clock, service the serial channel.
    ///
    /// Invoke unconditionally and frequently from the main loop.
    pub fn run_once(&mut self) {
        let now = self.clock.hr_now();
        self.serial.tick_handler(now);
    }

    /// The serviced serial channel.
    pub fn serial(&self) -> &SerialChannel<'buf, H> {
        &self.serial
    }

    /// Mutable access to the serviced serial channel.
    pub fn serial_mut(&mut self) -> &mut SerialChannel<'buf, H> {
        &mut self.serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockSerial;
    use crate::serial::TxFragment;

    #[test]
    fn run_once_services_the_serial_channel() {
        let clock = TickClock::new();
        let frags = [TxFragment::new(b"ping")];
        let mut driver = LoopDriver::new(&clock, SerialChannel::new(MockSerial::new()));

        assert!(driver.serial_mut().tx_start(&frags).is_ok());
        clock.advance();
        driver.run_once();

        assert!(!driver.serial().tx_busy());
        assert_eq!(driver.serial().hw().sent(), b"ping");
    }
}
