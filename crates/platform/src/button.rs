//! Pushbutton event latch.
//!
//! The on-board button line is electrically debounced by the input
//! peripheral's debounce filter (bring-up layer's job), so the edge interrupt
//! fires once per clean transition. This module does the remaining work:
//! race-free bookkeeping of which transitions happened since the application
//! last looked.
//!
//! # Shared-state discipline
//!
//! The mask is a single `AtomicU16`. The interrupt handler ORs one event bit
//! in; [`ButtonLatch::poll_events`] reads and clears the mask with one atomic
//! exchange. The read-then-clear pair is a single indivisible operation, so
//! an edge arriving concurrently with a poll is either reported by that poll
//! or latched for the next one; no event is lost or duplicated.

use core::sync::atomic::{AtomicU16, Ordering};

use bitflags::bitflags;

bitflags! {
    /// Pushbutton transition events accumulated between polls.
    ///
    /// A press immediately followed by a release before the next poll leaves
    /// both bits set: the mask accumulates rather than overwriting on
    /// conflict.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventMask: u16 {
        /// The line became asserted (button pressed).
        const PRESS = 1 << 0;
        /// The line became de-asserted (button released).
        const RELEASE = 1 << 1;
    }
}

/// Latches debounced edge events from interrupt context for thread-mode
/// polling.
///
/// Const-constructible and `Sync`, so it can live in a `static` reachable
/// from the edge interrupt handler.
#[derive(Debug, Default)]
pub struct ButtonLatch {
    events: AtomicU16,
}

impl ButtonLatch {
    /// A latch with no pending events.
    pub const fn new() -> Self {
        ButtonLatch {
            events: AtomicU16::new(0),
        }
    }

    /// Record one debounced edge. Interrupt context.
    ///
    /// `pressed` is the instantaneous line state sampled by the interrupt
    /// handler at edge time (for the on-board active-low button: pin level
    /// low), not a cached value.
    pub fn record_edge(&self, pressed: bool) {
        let event = if pressed {
            EventMask::PRESS
        } else {
            EventMask::RELEASE
        };
        self.events.fetch_or(event.bits(), Ordering::AcqRel);
    }

    /// Take every event accumulated since the previous poll, leaving the
    /// mask empty.
    pub fn poll_events(&self) -> EventMask {
        EventMask::from_bits_truncate(self.events.swap(0, Ordering::AcqRel))
    }
}
