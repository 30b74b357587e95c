//! Descriptor-based asynchronous serial channel.
//!
//! Two independent half-duplex directions, each `Idle` or `Active`, serviced
//! by [`SerialChannel::tick_handler`] once per main-loop iteration. No
//! operation blocks; start requests either take effect immediately or are
//! refused with no side effect.
//!
//! # Buffer ownership
//!
//! Transmit fragments are borrowed shared for the transfer lifetime, so the
//! caller cannot mutate them while the channel holds them. A receive
//! descriptor is *moved* into the channel by [`SerialChannel::rx_start`] and
//! handed back, completion fields filled in, by [`SerialChannel::rx_take`]
//! or [`SerialChannel::rx_abort`]. The borrow
//! checker enforces what the hardware manual can only ask for: nobody
//! touches a buffer the peripheral is filling.
//!
//! # Receive framing
//!
//! A reception completes with [`RxCompletion::Data`] when the buffer fills,
//! or when at least one byte has arrived and the line then stays idle for
//! [`SerialConfig::rx_idle_gap`]. The gap frames a packet; it is not an
//! operation timeout, and a reception that never sees a byte stays active
//! until aborted. Line-break completion is structurally present
//! ([`RxCompletion::Break`]) but reserved: nothing produces it.

use crate::tick::{TickTime, TICK_PERIOD_US};

/// Byte-level seam to the serial peripheral.
///
/// The channel feeds the transmit data register one byte at a time and
/// drains the receive side one byte at a time; FIFO depth and interrupt
/// plumbing stay inside the implementation.
pub trait SerialHw {
    /// The peripheral can accept one more transmit byte.
    fn tx_ready(&self) -> bool;

    /// Hand one byte to the transmit data register.
    ///
    /// Call only after [`tx_ready`](SerialHw::tx_ready) returns true.
    fn write_byte(&mut self, byte: u8);

    /// Pop one received byte, if the peripheral has one.
    fn read_byte(&mut self) -> Option<u8>;
}

/// One transmit fragment: an immutable byte span.
///
/// Fragments in a transmit request are sent in array order, back-to-back,
/// with no framing inserted between them.
#[derive(Debug, Clone, Copy)]
pub struct TxFragment<'a> {
    /// The bytes to send.
    pub buf: &'a [u8],
}

impl<'a> TxFragment<'a> {
    /// A fragment covering `buf`.
    pub const fn new(buf: &'a [u8]) -> Self {
        TxFragment { buf }
    }
}

/// Why a transmit request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStartError {
    /// A transmission is already active.
    #[error("a transmission is already active")]
    Busy,
    /// The fragment list was empty.
    #[error("transmit descriptor list is empty")]
    EmptyRequest,
}

/// Terminal state of a receive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxCompletion {
    /// No completion has occurred.
    #[default]
    None,
    /// Completed with received data.
    Data {
        /// Number of bytes received.
        len: u16,
    },
    /// Completed with a line break. Reserved: no producer emits this.
    Break,
}

/// A receive request: a caller-owned buffer plus its completion record.
///
/// Ownership moves to the channel for the duration of the operation and
/// returns to the caller on completion or abort.
#[derive(Debug)]
pub struct RxDescriptor<'buf> {
    buf: &'buf mut [u8],
    completion: RxCompletion,
}

impl<'buf> RxDescriptor<'buf> {
    /// A descriptor filling `buf`.
    pub fn new(buf: &'buf mut [u8]) -> Self {
        RxDescriptor {
            buf,
            completion: RxCompletion::None,
        }
    }

    /// Maximum number of bytes this descriptor can receive.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// The completion record written by the channel.
    pub fn completion(&self) -> RxCompletion {
        self.completion
    }

    /// The received bytes; empty unless completion is
    /// [`RxCompletion::Data`].
    pub fn received(&self) -> &[u8] {
        match self.completion {
            RxCompletion::Data { len } => self.buf.get(..usize::from(len)).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Give the underlying buffer back to the caller.
    pub fn into_buf(self) -> &'buf mut [u8] {
        self.buf
    }
}

/// Channel tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialConfig {
    /// Line-idle gap after which a partial reception completes.
    pub rx_idle_gap: TickTime,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            rx_idle_gap: TickTime::from_micros(TICK_PERIOD_US),
        }
    }
}

enum TxState<'buf> {
    Idle,
    Active {
        frags: &'buf [TxFragment<'buf>],
        index: usize,
        offset: usize,
    },
}

impl TxState<'_> {
    /// Next byte to hand to the peripheral, advancing the cursor past empty
    /// and exhausted fragments. `None` once the list is spent.
    #[allow(clippy::arithmetic_side_effects)] // cursor increments are bounded by slice lengths via get()
    fn next_byte(&mut self) -> Option<u8> {
        let TxState::Active {
            frags,
            index,
            offset,
        } = self
        else {
            return None;
        };
        while let Some(frag) = frags.get(*index) {
            if let Some(byte) = frag.buf.get(*offset) {
                *offset += 1;
                return Some(*byte);
            }
            *index += 1;
            *offset = 0;
        }
        None
    }
}

enum RxState<'buf> {
    Idle,
    Active {
        desc: RxDescriptor<'buf>,
        len: u16,
        last_byte_at: Option<TickTime>,
    },
    Complete(RxDescriptor<'buf>),
}

/// The serial channel: independent transmit and receive state machines over
/// one [`SerialHw`] seam.
pub struct SerialChannel<'buf, H> {
    hw: H,
    config: SerialConfig,
    tx: TxState<'buf>,
    rx: RxState<'buf>,
}

impl<'buf, H: SerialHw> SerialChannel<'buf, H> {
    /// A channel with default tunables.
    pub fn new(hw: H) -> Self {
        SerialChannel::with_config(hw, SerialConfig::default())
    }

    /// A channel with explicit tunables.
    pub fn with_config(hw: H, config: SerialConfig) -> Self {
        SerialChannel {
            hw,
            config,
            tx: TxState::Idle,
            rx: RxState::Idle,
        }
    }

    /// Enqueue an ordered fragment list for transmission.
    ///
    /// Refused, with no side effect, while a transmission is active or if
    /// the list is empty. The fragment slice and every buffer it references
    /// are borrowed until the transmission completes or is aborted.
    pub fn tx_start(&mut self, frags: &'buf [TxFragment<'buf>]) -> Result<(), TxStartError> {
        if self.tx_busy() {
            return Err(TxStartError::Busy);
        }
        if frags.is_empty() {
            return Err(TxStartError::EmptyRequest);
        }
        self.tx = TxState::Active {
            frags,
            index: 0,
            offset: 0,
        };
        Ok(())
    }

    /// Force the transmit direction to idle, discarding any unsent
    /// remainder. Idempotent.
    pub fn tx_abort(&mut self) {
        self.tx = TxState::Idle;
    }

    /// A transmission is in flight.
    pub fn tx_busy(&self) -> bool {
        matches!(self.tx, TxState::Active { .. })
    }

    /// Enqueue a receive request.
    ///
    /// Refused (the descriptor handed straight back) while a reception is
    /// active or if the descriptor capacity is zero. On success any previous
    /// completion record in the descriptor is cleared and the receive
    /// direction becomes active.
    ///
    /// A completed-but-unclaimed descriptor from an earlier operation is
    /// dropped by a new start; call [`rx_take`](SerialChannel::rx_take)
    /// first.
    pub fn rx_start(&mut self, mut desc: RxDescriptor<'buf>) -> Result<(), RxDescriptor<'buf>> {
        if self.rx_busy() || desc.capacity() == 0 {
            return Err(desc);
        }
        desc.completion = RxCompletion::None;
        self.rx = RxState::Active {
            desc,
            len: 0,
            last_byte_at: None,
        };
        Ok(())
    }

    /// Force the receive direction to idle.
    ///
    /// Returns the in-flight descriptor (completion
    /// [`RxCompletion::None`]) if a reception was active. A completed,
    /// unclaimed descriptor is left for [`rx_take`](SerialChannel::rx_take).
    /// Idempotent.
    pub fn rx_abort(&mut self) -> Option<RxDescriptor<'buf>> {
        match core::mem::replace(&mut self.rx, RxState::Idle) {
            RxState::Active { desc, .. } => Some(desc),
            other => {
                self.rx = other;
                None
            }
        }
    }

    /// A reception is in flight.
    pub fn rx_busy(&self) -> bool {
        matches!(self.rx, RxState::Active { .. })
    }

    /// Claim a completed receive descriptor, if one is waiting.
    pub fn rx_take(&mut self) -> Option<RxDescriptor<'buf>> {
        match core::mem::replace(&mut self.rx, RxState::Idle) {
            RxState::Complete(desc) => Some(desc),
            other => {
                self.rx = other;
                None
            }
        }
    }

    /// Service both directions. Call at least once per main-loop iteration.
    ///
    /// `now` is the current-time reference for the receive idle-gap check
    /// and must be non-decreasing across consecutive calls (modulo the
    /// clock's single-wraparound caveat).
    pub fn tick_handler(&mut self, now: TickTime) {
        self.service_tx();
        self.service_rx(now);
    }

    /// The hardware seam.
    pub fn hw(&self) -> &H {
        &self.hw
    }

    /// Mutable access to the hardware seam.
    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    fn service_tx(&mut self) {
        while self.tx_busy() && self.hw.tx_ready() {
            match self.tx.next_byte() {
                Some(byte) => self.hw.write_byte(byte),
                None => self.tx = TxState::Idle,
            }
        }
    }

    fn service_rx(&mut self, now: TickTime) {
        while let Some(byte) = self.hw.read_byte() {
            if let RxState::Active {
                desc,
                len,
                last_byte_at,
            } = &mut self.rx
            {
                if let Some(slot) = desc.buf.get_mut(usize::from(*len)) {
                    *slot = byte;
                    *len = len.wrapping_add(1);
                    *last_byte_at = Some(now);
                }
            }
            // With no receiver posted the byte is dropped here, so a later
            // receive never observes stale data.
            self.complete_rx_if_full();
        }
        self.complete_rx_if_idle(now);
    }

    fn complete_rx_if_full(&mut self) {
        let full = matches!(
            &self.rx,
            RxState::Active { desc, len, .. } if usize::from(*len) >= desc.capacity()
        );
        if full {
            self.finish_rx();
        }
    }

    fn complete_rx_if_idle(&mut self, now: TickTime) {
        let idle = matches!(
            &self.rx,
            RxState::Active {
                len,
                last_byte_at: Some(at),
                ..
            } if *len > 0 && now.delta(*at) >= self.config.rx_idle_gap
        );
        if idle {
            self.finish_rx();
        }
    }

    fn finish_rx(&mut self) {
        if let RxState::Active { mut desc, len, .. } =
            core::mem::replace(&mut self.rx, RxState::Idle)
        {
            desc.completion = RxCompletion::Data { len };
            self.rx = RxState::Complete(desc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockSerial;
    use crate::tick::TickTime;

    fn channel<'buf>() -> SerialChannel<'buf, MockSerial> {
        SerialChannel::new(MockSerial::new())
    }

    /// Instant of the n-th tick, matching the default idle gap granularity.
    fn tick(n: u32) -> TickTime {
        TickTime::from_micros(n.wrapping_mul(TICK_PERIOD_US))
    }

    #[test]
    fn tx_sends_fragments_in_order_back_to_back() {
        let frags = [
            TxFragment::new(b"one"),
            TxFragment::new(b""),
            TxFragment::new(b"-two"),
        ];
        let mut ch = channel();
        assert_eq!(ch.tx_start(&frags), Ok(()));
        assert!(ch.tx_busy());

        ch.tick_handler(tick(1));
        assert!(!ch.tx_busy());
        assert_eq!(ch.hw().sent(), b"one-two");
    }

    #[test]
    fn tx_start_is_refused_while_busy_and_leaves_the_transfer_intact() {
        let first = [TxFragment::new(b"first")];
        let second = [TxFragment::new(b"second")];
        let mut ch = channel();
        ch.hw_mut().set_tx_ready(false);
        assert_eq!(ch.tx_start(&first), Ok(()));

        assert_eq!(ch.tx_start(&second), Err(TxStartError::Busy));
        assert!(ch.tx_busy());

        ch.hw_mut().set_tx_ready(true);
        ch.tick_handler(tick(1));
        assert_eq!(ch.hw().sent(), b"first");
    }

    #[test]
    fn tx_start_rejects_an_empty_fragment_list() {
        let mut ch = channel();
        assert_eq!(ch.tx_start(&[]), Err(TxStartError::EmptyRequest));
        assert!(!ch.tx_busy());
    }

    #[test]
    fn tx_abort_on_an_idle_channel_is_a_no_op() {
        let mut ch = channel();
        ch.tx_abort();
        assert!(!ch.tx_busy());
    }

    #[test]
    fn tx_abort_discards_the_unsent_remainder() {
        let frags = [TxFragment::new(b"discarded")];
        let mut ch = channel();
        ch.hw_mut().set_tx_ready(false);
        assert_eq!(ch.tx_start(&frags), Ok(()));

        ch.tx_abort();
        assert!(!ch.tx_busy());

        ch.hw_mut().set_tx_ready(true);
        ch.tick_handler(tick(1));
        assert_eq!(ch.hw().sent(), b"");
    }

    #[test]
    fn rx_start_rejects_a_zero_capacity_descriptor() {
        let mut buf = [0u8; 0];
        let mut ch = channel();
        assert!(ch.rx_start(RxDescriptor::new(&mut buf)).is_err());
        assert!(!ch.rx_busy());
    }

    #[test]
    fn rx_start_is_refused_while_busy() {
        let mut first = [0u8; 8];
        let mut second = [0u8; 8];
        let mut ch = channel();
        assert!(ch.rx_start(RxDescriptor::new(&mut first)).is_ok());

        let refused = ch.rx_start(RxDescriptor::new(&mut second));
        assert!(refused.is_err());
        assert!(ch.rx_busy());
    }

    #[test]
    fn rx_completes_when_the_buffer_fills() {
        let mut buf = [0u8; 4];
        let mut ch = channel();
        assert!(ch.rx_start(RxDescriptor::new(&mut buf)).is_ok());

        ch.hw_mut().push_rx(b"full");
        ch.tick_handler(tick(1));

        assert!(!ch.rx_busy());
        let desc = ch.rx_take().unwrap();
        assert_eq!(desc.completion(), RxCompletion::Data { len: 4 });
        assert_eq!(desc.received(), b"full");
    }

    #[test]
    fn rx_completes_a_partial_packet_after_the_idle_gap() {
        let mut buf = [0u8; 8];
        let mut ch = channel();
        assert!(ch.rx_start(RxDescriptor::new(&mut buf)).is_ok());

        ch.hw_mut().push_rx(b"hello");
        ch.tick_handler(tick(1));
        // Five of eight bytes in; the line has not been idle long enough.
        assert!(ch.rx_busy());

        ch.tick_handler(tick(2));
        assert!(!ch.rx_busy());
        let desc = ch.rx_take().unwrap();
        assert_eq!(desc.completion(), RxCompletion::Data { len: 5 });
        assert_eq!(desc.received(), b"hello");
    }

    #[test]
    fn rx_with_no_bytes_never_completes_on_its_own() {
        let mut buf = [0u8; 8];
        let mut ch = channel();
        assert!(ch.rx_start(RxDescriptor::new(&mut buf)).is_ok());

        for n in 1..100 {
            ch.tick_handler(tick(n));
        }
        assert!(ch.rx_busy());
        assert!(ch.rx_take().is_none());
    }

    #[test]
    fn rx_abort_returns_the_descriptor_uncompleted() {
        let mut buf = [0u8; 8];
        let mut ch = channel();
        assert!(ch.rx_start(RxDescriptor::new(&mut buf)).is_ok());
        ch.hw_mut().push_rx(b"xy");
        ch.tick_handler(tick(1));

        let desc = ch.rx_abort().unwrap();
        assert!(!ch.rx_busy());
        assert_eq!(desc.completion(), RxCompletion::None);
        assert!(desc.received().is_empty());
    }

    #[test]
    fn rx_abort_when_idle_returns_nothing() {
        let mut ch = channel();
        assert!(ch.rx_abort().is_none());
        assert!(!ch.rx_busy());
    }

    #[test]
    fn bytes_with_no_posted_descriptor_are_discarded() {
        let mut buf = [0u8; 8];
        let mut ch = channel();
        ch.hw_mut().push_rx(b"stale");
        ch.tick_handler(tick(1));

        assert!(ch.rx_start(RxDescriptor::new(&mut buf)).is_ok());
        ch.hw_mut().push_rx(b"fresh");
        ch.tick_handler(tick(2));
        ch.tick_handler(tick(3));

        let desc = ch.rx_take().unwrap();
        assert_eq!(desc.received(), b"fresh");
    }

    #[test]
    fn descriptor_round_trips_through_completion_and_restart() {
        let mut buf = [0u8; 4];
        let mut ch = channel();
        assert!(ch.rx_start(RxDescriptor::new(&mut buf)).is_ok());
        ch.hw_mut().push_rx(b"abcd");
        ch.tick_handler(tick(1));

        let desc = ch.rx_take().unwrap();
        assert_eq!(desc.completion(), RxCompletion::Data { len: 4 });

        // Resubmitting clears the stale completion record.
        assert!(ch.rx_start(desc).is_ok());
        assert!(ch.rx_busy());
        assert!(ch.rx_take().is_none());
    }
}
