//! Real-time platform core for the single-board target.
//!
//! This crate is the runtime heart of the board support package: the four
//! pieces of state shared between interrupt context and the cooperative main
//! loop, plus the one routine that ties them together per loop iteration.
//!
//! # Architecture Layers
//!
//! ```text
//! Application main loop
//!         ↓
//! Platform core (this crate - clock, button latch, indicator, serial)
//!         ↓ hardware seams (SubTickReader, PeriodicCounter, OutputPin, SerialHw)
//! Bring-up layer (clock tree, pin mux, peripheral init - out of scope here)
//! ```
//!
//! # Components
//!
//! - [`tick`] - monotonic tick clock with wraparound-safe arithmetic
//! - [`button`] - debounced-edge event latch (interrupt producer, polled consumer)
//! - [`indicator`] - rate-based LED controller off a free-running counter
//! - [`serial`] - descriptor-based asynchronous transmit/receive
//! - [`loop_driver`] - per-iteration service driver
//! - [`mocks`] - simulated hardware for tests and the host board simulator
//!
//! # Execution model
//!
//! Single hardware thread with preemptive interrupts over a cooperative main
//! loop; no scheduler. Nothing in this crate blocks: every operation returns
//! immediately with a success/refusal result or queued state. State shared
//! with interrupt context goes through exactly one ISR-safe primitive per
//! datum (an atomic exchange for the event mask, a critical section for the
//! two-word clock cell).
//!
//! The bring-up layer must have started the tick timer, the debounced-input
//! peripheral, the serial peripheral, and the indicator counter before any
//! operation here is called; none of that is configurable from this crate.
//!
//! # Features
//!
//! - `defmt`: enable `defmt::Format` derives on public types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// Pedantic lints suppressed for this platform-core crate:
#![allow(clippy::must_use_candidate)] // hardware accessors - callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // the only error type documents itself

pub mod button;
pub mod indicator;
pub mod loop_driver;
pub mod mocks;
pub mod serial;
pub mod tick;

// Re-export the public operation surface
pub use button::{ButtonLatch, EventMask};
pub use indicator::{Indicator, IndicatorRate, PeriodicCounter, RatePlan, RateTable};
pub use loop_driver::LoopDriver;
pub use serial::{
    RxCompletion, RxDescriptor, SerialChannel, SerialConfig, SerialHw, TxFragment, TxStartError,
};
pub use tick::{
    NoSubTick, SubTickReader, TickClock, TickTime, NANOS_PER_SEC, TICK_PERIOD_NANOS,
    TICK_PERIOD_US,
};
