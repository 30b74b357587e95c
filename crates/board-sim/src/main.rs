//! Host-side board simulator.
//!
//! Runs the platform core against the simulated hardware, reproducing the
//! board's stock application: each press of the user button cycles the LED
//! blink rate (off → slow → medium → fast → on → off), every change is
//! announced over the serial channel, and a received serial command is
//! answered.
//!
//! Time is simulated: every loop iteration stands for one 5 ms tick of the
//! platform time base. Button edges and the incoming serial command are
//! injected on a fixed script so a run is reproducible.
//!
//! ```text
//! RUST_LOG=debug cargo run -p board-sim
//! ```

#![allow(missing_docs)]
// Script tables are fixed-size constants; plain indexing and loop arithmetic
// are fine on the host.
#![allow(clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use platform::mocks::{MockCounter, MockPin, MockSerial};
use platform::{
    ButtonLatch, EventMask, Indicator, IndicatorRate, LoopDriver, PeriodicCounter, RxCompletion,
    RxDescriptor, SerialChannel, TickClock, TxFragment,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Simulated loop iterations: 2000 ticks of 5 ms = 10 s of board time.
const ITERATIONS: u32 = 2_000;

/// Indicator-counter ticks elapsed per loop iteration (23.4375 kHz × 5 ms).
const COUNTER_TICKS_PER_LOOP: u32 = 117;

/// Iterations at which the button is pressed; released 30 iterations later.
const PRESS_SCHEDULE: [u32; 6] = [150, 450, 750, 1_050, 1_350, 1_650];

/// Iteration at which the host "types" a command on the serial line.
const COMMAND_AT: u32 = 900;

fn next_rate(rate: IndicatorRate) -> IndicatorRate {
    match rate {
        IndicatorRate::Off => IndicatorRate::Slow,
        IndicatorRate::Slow => IndicatorRate::Medium,
        IndicatorRate::Medium => IndicatorRate::Fast,
        IndicatorRate::Fast => IndicatorRate::On,
        IndicatorRate::On => IndicatorRate::Off,
    }
}

fn rate_index(rate: IndicatorRate) -> usize {
    match rate {
        IndicatorRate::Off => 0,
        IndicatorRate::Slow => 1,
        IndicatorRate::Medium => 2,
        IndicatorRate::Fast => 3,
        IndicatorRate::On => 4,
    }
}

/// Advance the simulated free-running indicator counter, wrapping at the
/// programmed period the way the hardware compare-reload does.
fn advance_blink_counter(counter: &mut MockCounter) {
    let period = u32::from(counter.period().unwrap_or(u16::MAX).max(1));
    let next = (u32::from(counter.count()) + COUNTER_TICKS_PER_LOOP) % period;
    counter.set_count(next as u16);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let clock = TickClock::new();
    let latch = ButtonLatch::new();
    let mut indicator = Indicator::new(MockCounter::new(), MockPin::new());

    // Transmit messages. Declared ahead of the channel: the channel borrows
    // whichever table entry is in flight.
    let banner = [TxFragment::new(b"nano platform core (simulated board)\r\n")];
    let rate_msgs: [[TxFragment<'_>; 1]; 5] = [
        [TxFragment::new(b"blink: off\r\n")],
        [TxFragment::new(b"blink: slow\r\n")],
        [TxFragment::new(b"blink: medium\r\n")],
        [TxFragment::new(b"blink: fast\r\n")],
        [TxFragment::new(b"blink: on\r\n")],
    ];
    let status_msgs: [[TxFragment<'_>; 3]; 5] = [
        [
            TxFragment::new(b"status: "),
            TxFragment::new(b"off"),
            TxFragment::new(b"\r\n"),
        ],
        [
            TxFragment::new(b"status: "),
            TxFragment::new(b"slow"),
            TxFragment::new(b"\r\n"),
        ],
        [
            TxFragment::new(b"status: "),
            TxFragment::new(b"medium"),
            TxFragment::new(b"\r\n"),
        ],
        [
            TxFragment::new(b"status: "),
            TxFragment::new(b"fast"),
            TxFragment::new(b"\r\n"),
        ],
        [
            TxFragment::new(b"status: "),
            TxFragment::new(b"on"),
            TxFragment::new(b"\r\n"),
        ],
    ];
    let mut rx_buf = [0u8; 32];

    let mut driver = LoopDriver::new(&clock, SerialChannel::new(MockSerial::new()));

    if driver.serial_mut().tx_start(&banner).is_err() {
        warn!("banner transmit refused");
    }
    if driver
        .serial_mut()
        .rx_start(RxDescriptor::new(&mut rx_buf))
        .is_err()
    {
        warn!("initial receive refused");
    }

    let mut rate = IndicatorRate::Off;
    let mut led_lit = false;

    for iteration in 0..ITERATIONS {
        // Hardware the bring-up layer owns on the real board: the periodic
        // timer interrupt and the free-running blink counter.
        clock.advance();
        advance_blink_counter(indicator.counter_mut());

        // The edge interrupt, on its script.
        if PRESS_SCHEDULE.contains(&iteration) {
            latch.record_edge(true);
        }
        if PRESS_SCHEDULE.iter().any(|&at| at + 30 == iteration) {
            latch.record_edge(false);
        }
        // The host typing a command on the serial line.
        if iteration == COMMAND_AT {
            driver.serial_mut().hw_mut().push_rx(b"status");
        }

        // The application loop body.
        driver.run_once();

        let events = latch.poll_events();
        if events.contains(EventMask::PRESS) {
            rate = next_rate(rate);
            indicator.set_rate(rate);
            info!(?rate, iteration, "button pressed, rate changed");
            if driver.serial_mut().tx_start(&rate_msgs[rate_index(rate)]).is_err() {
                warn!("rate announcement refused, channel busy");
            }
        }
        if events.contains(EventMask::RELEASE) {
            debug!(iteration, "button released");
        }

        if let Some(desc) = driver.serial_mut().rx_take() {
            if let RxCompletion::Data { len } = desc.completion() {
                info!(
                    command = %String::from_utf8_lossy(desc.received()),
                    len,
                    iteration,
                    "serial command received"
                );
                if driver
                    .serial_mut()
                    .tx_start(&status_msgs[rate_index(rate)])
                    .is_err()
                {
                    warn!("status reply refused, channel busy");
                }
            }
            if driver.serial_mut().rx_start(desc).is_err() {
                warn!("receive re-arm refused");
            }
        }

        let _ = indicator.apply();
        let lit = indicator.pin().is_set_high();
        if lit != led_lit {
            debug!(lit, iteration, "led level changed");
            led_lit = lit;
        }
    }

    info!(
        transmitted = %String::from_utf8_lossy(driver.serial().hw().sent()),
        "simulation finished"
    );
}
