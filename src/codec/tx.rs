//! Transmit half of the pulse-width codec.
//!
//! The timer ISR pops one [`Pulse`] per expiry, drives the pin to its level
//! and reloads the timer with its duration. When the queue runs dry the ISR
//! drops the line and disarms itself; the next publish re-arms it.
//!
//! # Timing
//!
//! The ISR is the only thing between timer expiry and the pin write, so its
//! jitter stays well under the shortest high time. Its fixed entry cost is
//! subtracted from every duration when the pulse is queued, not in the ISR.

use core::sync::atomic::{AtomicU32, Ordering};

use super::BitSink;
use crate::config::{Timing, ISR_LATENCY_TICKS, TX_FIFO_SIZE};
use crate::fifo::SpscFifo;
use crate::hal::{InIsr, IrqLine, OutputLine, PulseTimer};
use crate::symbol::{Bit, Pulse};

/// Pulse queue shared between the main loop and the TX timer ISR.
pub struct TxCodec<const N: usize = TX_FIFO_SIZE> {
    fifo: SpscFifo<Pulse, N>,
    latency: u32,
    overflows: AtomicU32,
}

impl<const N: usize> TxCodec<N> {
    pub const fn new() -> Self {
        Self::with_latency(ISR_LATENCY_TICKS)
    }

    /// Codec compensating `latency` ticks of ISR entry cost.
    pub const fn with_latency(latency: u32) -> Self {
        Self {
            fifo: SpscFifo::new(Pulse::EMPTY),
            latency,
            overflows: AtomicU32::new(0),
        }
    }

    /// Timer ISR: the current pulse has elapsed.
    ///
    /// # Timing
    ///
    /// O(1), one queue pop, one pin write, one register write.
    #[inline]
    pub fn on_expiry<T: PulseTimer, O: OutputLine>(&self, timer: &T, line: &mut O) {
        match self.fifo.pop(&InIsr) {
            Some(pulse) => {
                line.set_level(pulse.level());
                timer.reload(pulse.ticks());
            }
            None => {
                line.set_level(false);
                timer.disarm();
            }
        }
    }

    /// Pulses queued and not yet started.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.fifo.len()
    }

    /// Pulses dropped because the queue was full. Non-zero means the queue is undersized.
    #[inline]
    pub fn overflows(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn latency(&self) -> u32 {
        self.latency
    }

    #[inline]
    fn stage(&self, level: bool, ticks: u32) -> bool {
        let reload = ticks.saturating_sub(self.latency).max(1);
        if self.fifo.stage(Pulse::new(level, reload)) {
            true
        } else {
            self.overflows.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

impl<const N: usize> Default for TxCodec<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Main-loop handle on a [`TxCodec`].
///
/// Owns the capability to mask the TX interrupt (for the occupancy update)
/// and to arm the timer when the ISR has gone idle.
pub struct Transmitter<'a, T: PulseTimer, I: IrqLine, const N: usize = TX_FIFO_SIZE> {
    codec: &'a TxCodec<N>,
    timer: T,
    irq: I,
    timing: Timing,
}

impl<'a, T: PulseTimer, I: IrqLine, const N: usize> Transmitter<'a, T, I, N> {
    pub fn new(codec: &'a TxCodec<N>, timer: T, irq: I) -> Self {
        Self::with_timing(codec, timer, irq, Timing::DEFAULT)
    }

    pub fn with_timing(codec: &'a TxCodec<N>, timer: T, irq: I, timing: Timing) -> Self {
        Self {
            codec,
            timer,
            irq,
            timing,
        }
    }

    /// Queue one `(level, ticks)` pulse.
    ///
    /// Returns `false` if the queue was full and the pulse was dropped.
    pub fn schedule(&mut self, level: bool, ticks: u32) -> bool {
        let ok = self.codec.stage(level, ticks);
        self.commit();
        ok
    }

    /// Start a group of pulses that become visible to the ISR together.
    pub fn begin(&mut self) -> Bulk<'_, 'a, T, I, N> {
        Bulk { tx: self, ok: true }
    }

    /// Nothing queued and the timer ISR has gone idle.
    pub fn is_idle(&self) -> bool {
        self.codec.pending() == 0 && !self.timer.is_armed()
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn codec(&self) -> &'a TxCodec<N> {
        self.codec
    }

    fn commit(&mut self) {
        if self.codec.fifo.publish(&self.irq) > 0 && !self.timer.is_armed() {
            // Fires the expiry ISR immediately, which pops the first pulse
            self.timer.arm();
        }
    }
}

impl<T: PulseTimer, I: IrqLine, const N: usize> BitSink for Transmitter<'_, T, I, N> {
    fn bark(&mut self, bit: Bit) {
        self.begin().bit(bit);
    }

    fn burst(&mut self, bits: &[Bit]) {
        let mut bulk = self.begin();
        for &bit in bits {
            bulk.bit(bit);
        }
    }

    fn reset_pulse(&mut self) {
        let t_reset = self.timing.t_reset;
        self.begin().schedule(true, t_reset).schedule(false, t_reset / 2);
    }
}

/// Pulses staged through one [`Transmitter::begin`].
///
/// Published with a single occupancy update on [`Bulk::end`] or drop.
pub struct Bulk<'t, 'a, T: PulseTimer, I: IrqLine, const N: usize> {
    tx: &'t mut Transmitter<'a, T, I, N>,
    ok: bool,
}

impl<T: PulseTimer, I: IrqLine, const N: usize> Bulk<'_, '_, T, I, N> {
    pub fn schedule(&mut self, level: bool, ticks: u32) -> &mut Self {
        self.ok &= self.tx.codec.stage(level, ticks);
        self
    }

    /// Stage the high and low halves of `bit`.
    pub fn bit(&mut self, bit: Bit) -> &mut Self {
        let (high, low) = (self.tx.timing.high(bit), self.tx.timing.low(bit));
        self.schedule(true, high).schedule(false, low)
    }

    /// Publish. Returns `false` if any pulse of the group was dropped.
    pub fn end(self) -> bool {
        self.ok
    }
}

impl<T: PulseTimer, I: IrqLine, const N: usize> Drop for Bulk<'_, '_, T, I, N> {
    fn drop(&mut self) {
        self.tx.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[derive(Default)]
    struct FakeTimer {
        armed: Cell<bool>,
        arms: Cell<u32>,
        reload: Cell<u32>,
    }

    impl PulseTimer for FakeTimer {
        fn is_armed(&self) -> bool {
            self.armed.get()
        }
        fn arm(&self) {
            self.armed.set(true);
            self.arms.set(self.arms.get() + 1);
        }
        fn disarm(&self) {
            self.armed.set(false);
        }
        fn reload(&self, ticks: u32) {
            self.reload.set(ticks);
        }
    }

    #[derive(Default)]
    struct Pin {
        high: bool,
    }

    impl OutputLine for Pin {
        fn set_level(&mut self, high: bool) {
            self.high = high;
        }
    }

    /// Run the ISR until it disarms, returning (level, reload) per expiry.
    fn drain<const N: usize>(codec: &TxCodec<N>, timer: &FakeTimer) -> std::vec::Vec<(bool, u32)> {
        let mut pin = Pin::default();
        let mut out = std::vec::Vec::new();
        while timer.is_armed() {
            codec.on_expiry(timer, &mut pin);
            if timer.is_armed() {
                out.push((pin.high, timer.reload.get()));
            }
        }
        assert!(!pin.high, "line must rest low");
        out
    }

    #[test]
    fn test_schedule_arms_idle_timer_once() {
        let codec = TxCodec::<16>::with_latency(0);
        let timer = FakeTimer::default();
        let mut tx = Transmitter::new(&codec, &timer, InIsr);

        assert!(tx.schedule(true, 40));
        assert!(tx.schedule(false, 85));
        assert_eq!(timer.arms.get(), 1);
        assert_eq!(codec.pending(), 2);

        assert_eq!(drain(&codec, &timer), [(true, 40), (false, 85)]);
        assert!(tx.is_idle());
    }

    #[test]
    fn test_bark_shapes() {
        let codec = TxCodec::<16>::with_latency(0);
        let timer = FakeTimer::default();
        let mut tx = Transmitter::new(&codec, &timer, InIsr);

        tx.bark(Bit::Zero);
        tx.bark(Bit::One);

        let t = Timing::DEFAULT;
        assert_eq!(
            drain(&codec, &timer),
            [(true, t.t0h), (false, t.t0l), (true, t.t1h), (false, t.t1l)]
        );
    }

    #[test]
    fn test_latency_is_subtracted() {
        let codec = TxCodec::<16>::with_latency(10);
        let timer = FakeTimer::default();
        let mut tx = Transmitter::new(&codec, &timer, InIsr);

        tx.schedule(true, 40);
        tx.schedule(false, 5);

        // Never reloads with zero, that would stall the timer
        assert_eq!(drain(&codec, &timer), [(true, 30), (false, 1)]);
    }

    #[test]
    fn test_overflow_drops_and_counts() {
        let codec = TxCodec::<4>::with_latency(0);
        let timer = FakeTimer::default();
        let mut tx = Transmitter::new(&codec, &timer, InIsr);

        for _ in 0..4 {
            assert!(tx.schedule(true, 40));
        }
        assert!(!tx.schedule(true, 40));
        assert_eq!(codec.overflows(), 1);
        assert_eq!(codec.pending(), 4);
    }

    #[test]
    fn test_bulk_publishes_together() {
        let codec = TxCodec::<16>::with_latency(0);
        let timer = FakeTimer::default();
        let mut tx = Transmitter::new(&codec, &timer, InIsr);

        {
            let mut bulk = tx.begin();
            bulk.bit(Bit::One).bit(Bit::Zero);
            assert_eq!(codec.pending(), 0);
            assert!(!timer.is_armed());
            assert!(bulk.end());
        }
        assert_eq!(codec.pending(), 4);
        assert!(timer.is_armed());
    }

    #[test]
    fn test_bulk_reports_partial_drop() {
        let codec = TxCodec::<4>::with_latency(0);
        let timer = FakeTimer::default();
        let mut tx = Transmitter::new(&codec, &timer, InIsr);

        let mut bulk = tx.begin();
        bulk.bit(Bit::One).bit(Bit::One).bit(Bit::One);
        assert!(!bulk.end());
        assert_eq!(codec.pending(), 4);
        assert_eq!(codec.overflows(), 2);
    }

    #[test]
    fn test_reset_pulse() {
        let codec = TxCodec::<16>::with_latency(0);
        let timer = FakeTimer::default();
        let mut tx = Transmitter::new(&codec, &timer, InIsr);

        tx.reset_pulse();
        let t = Timing::DEFAULT;
        assert_eq!(drain(&codec, &timer), [(true, t.t_reset), (false, t.t_reset / 2)]);
    }
}
