//! Bit timing and receive classification thresholds.

use crate::symbol::{Bit, Symbol};

/// Pulse shape of the two logical bits plus the reset waveform, in ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    pub t0h: u32,
    pub t0l: u32,
    pub t1h: u32,
    pub t1l: u32,
    pub t_reset: u32,
}

impl Timing {
    pub const DEFAULT: Self = Self {
        t0h: super::T0H,
        t0l: super::T0L,
        t1h: super::T1H,
        t1l: super::T1L,
        t_reset: super::T_RESET,
    };

    /// High time for `bit`.
    #[inline]
    pub const fn high(&self, bit: Bit) -> u32 {
        match bit {
            Bit::Zero => self.t0h,
            Bit::One => self.t1h,
        }
    }

    /// Low time following `bit`.
    #[inline]
    pub const fn low(&self, bit: Bit) -> u32 {
        match bit {
            Bit::Zero => self.t0l,
            Bit::One => self.t1l,
        }
    }

    /// Full bit period.
    #[inline]
    pub const fn period(&self) -> u32 {
        self.t0h + self.t0l
    }

    /// Convert microseconds to ticks.
    #[inline]
    pub const fn us_to_ticks(us: u32) -> u32 {
        us * 1_000 / super::TICK_NS
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Receive classification bands.
///
/// Lower bounds are inclusive, upper bounds exclusive:
///
/// ```text
///   0 ──Error── lower ──Zero── split ──One── upper ──Reset── ∞
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
    /// Shortest accepted high time.
    pub lower: u32,
    /// First width that reads as ONE.
    pub split: u32,
    /// First width that reads as RESET.
    pub upper: u32,
}

impl Thresholds {
    /// Derive bands from a bit shape: 80% of T0H, the T0H/T1H midpoint and 125% of T1H.
    pub const fn from_timing(t: &Timing) -> Self {
        Self {
            lower: t.t0h * 4 / 5,
            split: (t.t0h + t.t1h) / 2,
            upper: t.t1h * 5 / 4,
        }
    }

    pub const fn is_ordered(&self) -> bool {
        self.lower < self.split && self.split < self.upper
    }

    /// Classify a measured high time.
    #[inline]
    pub const fn classify(&self, ticks: u32) -> Symbol {
        if ticks < self.lower {
            Symbol::Error
        } else if ticks < self.split {
            Symbol::Zero
        } else if ticks < self.upper {
            Symbol::One
        } else {
            Symbol::Reset
        }
    }
}
