//! Hardware Abstraction Layer for RABI.
//!
//! The core never touches registers. It talks to the board through the
//! small traits below; `esp` implements them on ESP-IDF, tests implement
//! them with `Cell`s.
//!
//! All methods take `&self` except pin writes: interrupt control and timer
//! registers are shared between the main loop and an ISR, the output pin is
//! owned by the ISR that drives it.

pub mod gpio;

#[cfg(target_os = "espidf")]
pub mod esp;

pub use gpio::BusPins;

/// Monotonic microsecond clock.
pub trait Clock {
    fn now_us(&self) -> u64;
}

/// One maskable interrupt source.
///
/// Used to make the main-line side of a ring buffer occupancy update
/// atomic with respect to that source only. Never a global lock.
pub trait IrqLine {
    fn mask(&self);
    fn unmask(&self);

    /// Run `f` with this source masked.
    #[inline]
    fn masked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.mask();
        let r = f();
        self.unmask();
        r
    }
}

/// Masking handle for code that already runs inside the interrupt in question.
///
/// The interrupt cannot preempt itself, so there is nothing to mask.
#[derive(Clone, Copy, Debug, Default)]
pub struct InIsr;

impl IrqLine for InIsr {
    #[inline]
    fn mask(&self) {}

    #[inline]
    fn unmask(&self) {}
}

impl<T: IrqLine + ?Sized> IrqLine for &T {
    #[inline]
    fn mask(&self) {
        (**self).mask()
    }

    #[inline]
    fn unmask(&self) {
        (**self).unmask()
    }
}

/// The one-shot timer that paces TX pulses.
///
/// `arm` must raise the expiry interrupt right away so the first queued
/// pulse starts without waiting a full period.
pub trait PulseTimer {
    fn is_armed(&self) -> bool;
    fn arm(&self);
    fn disarm(&self);
    /// Next expiry `ticks` from now.
    fn reload(&self, ticks: u32);
}

impl<T: PulseTimer + ?Sized> PulseTimer for &T {
    #[inline]
    fn is_armed(&self) -> bool {
        (**self).is_armed()
    }

    #[inline]
    fn arm(&self) {
        (**self).arm()
    }

    #[inline]
    fn disarm(&self) {
        (**self).disarm()
    }

    #[inline]
    fn reload(&self, ticks: u32) {
        (**self).reload(ticks)
    }
}

/// Bus output pin.
pub trait OutputLine {
    fn set_level(&mut self, high: bool);
}

/// Plain digital input (the local switch, never protocol bits).
pub trait InputLine {
    fn is_high(&self) -> bool;
}
