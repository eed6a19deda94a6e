//! Receive half of the pulse-width codec.
//!
//! The capture peripheral restarts its counter on the rising edge and
//! latches it on the falling edge, so each capture interrupt yields the high
//! time of one pulse. The ISR only queues that raw tick count; the main loop
//! classifies it when it drains the queue.

use core::sync::atomic::{AtomicU32, Ordering};

use super::SymbolSource;
use crate::config::{Thresholds, RX_FIFO_SIZE, THRESHOLDS};
use crate::fifo::SpscFifo;
use crate::hal::{InIsr, IrqLine};
use crate::symbol::Symbol;

/// Interval queue shared between the capture ISR and the main loop.
pub struct RxCodec<const N: usize = RX_FIFO_SIZE> {
    fifo: SpscFifo<u32, N>,
    overflows: AtomicU32,
}

impl<const N: usize> RxCodec<N> {
    pub const fn new() -> Self {
        Self {
            fifo: SpscFifo::new(0),
            overflows: AtomicU32::new(0),
        }
    }

    /// Capture ISR: one high pulse of `ticks` just ended.
    #[inline]
    pub fn on_capture(&self, ticks: u32) {
        if !self.fifo.push(ticks, &InIsr) {
            self.overflows.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Captures dropped because the main loop fell behind.
    #[inline]
    pub fn overflows(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for RxCodec<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Main-loop handle on an [`RxCodec`].
pub struct Receiver<'a, I: IrqLine, const N: usize = RX_FIFO_SIZE> {
    codec: &'a RxCodec<N>,
    irq: I,
    thresholds: Thresholds,
}

impl<'a, I: IrqLine, const N: usize> Receiver<'a, I, N> {
    pub fn new(codec: &'a RxCodec<N>, irq: I) -> Self {
        Self::with_thresholds(codec, irq, THRESHOLDS)
    }

    pub fn with_thresholds(codec: &'a RxCodec<N>, irq: I, thresholds: Thresholds) -> Self {
        Self {
            codec,
            irq,
            thresholds,
        }
    }

    /// Pop one capture without classifying it.
    pub fn receive_raw(&mut self) -> Option<u32> {
        self.codec.fifo.pop(&self.irq)
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn codec(&self) -> &'a RxCodec<N> {
        self.codec
    }
}

impl<I: IrqLine, const N: usize> SymbolSource for Receiver<'_, I, N> {
    #[inline]
    fn bits_available(&self) -> u32 {
        self.codec.fifo.len()
    }

    #[inline]
    fn receive_bit(&mut self) -> Option<Symbol> {
        self.receive_raw().map(|ticks| self.thresholds.classify(ticks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_classifies_lazily() {
        let codec = RxCodec::<8>::new();
        let mut rx = Receiver::new(&codec, InIsr);

        codec.on_capture(40);
        codec.on_capture(80);
        codec.on_capture(500);
        codec.on_capture(3);

        assert_eq!(rx.bits_available(), 4);
        assert_eq!(rx.receive_bit(), Some(Symbol::Zero));
        assert_eq!(rx.receive_bit(), Some(Symbol::One));
        assert_eq!(rx.receive_bit(), Some(Symbol::Reset));
        assert_eq!(rx.receive_bit(), Some(Symbol::Error));
        assert_eq!(rx.bits_available(), 0);
    }

    #[test]
    fn test_receive_on_empty_is_none() {
        let codec = RxCodec::<8>::new();
        let mut rx = Receiver::new(&codec, InIsr);

        assert_eq!(rx.receive_bit(), None);
        assert_eq!(rx.receive_raw(), None);
    }

    #[test]
    fn test_capture_overflow_counted() {
        let codec = RxCodec::<4>::new();
        for _ in 0..6 {
            codec.on_capture(40);
        }
        assert_eq!(codec.overflows(), 2);

        let mut rx = Receiver::new(&codec, InIsr);
        assert_eq!(rx.bits_available(), 4);
        assert_eq!(rx.receive_raw(), Some(40));
    }

    #[test]
    fn test_custom_thresholds() {
        let codec = RxCodec::<8>::new();
        let mut rx = Receiver::with_thresholds(
            &codec,
            InIsr,
            Thresholds {
                lower: 10,
                split: 20,
                upper: 30,
            },
        );

        codec.on_capture(19);
        codec.on_capture(20);
        assert_eq!(rx.receive_bit(), Some(Symbol::Zero));
        assert_eq!(rx.receive_bit(), Some(Symbol::One));
    }
}
