//! Module: symbol
//!
//! Purpose: Wire vocabulary of the RABI bus. Logical bits, the classified
//! receive symbols and the packed `(level, duration)` pulses handed to the
//! transmit timer.
//!
//! Architecture:
//! - GROWL, HOWL and BARK are not distinct wire values. They are the meaning a
//!   bit has in a given automaton state, so they are plain `Bit` constants
//! - `Pulse` is a `u32` so a whole TX queue entry is moved with one word copy
//!
//! Safety: Safe. No unsafe blocks. Copy types only.

/// One logical bit on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    /// Start-of-cycle wake marker, also the header preceding every node group.
    pub const GROWL: Bit = Bit::One;

    /// End-of-chain marker.
    pub const HOWL: Bit = Bit::One;

    /// "A payload follows" marker.
    pub const BARK: Bit = Bit::Zero;

    #[inline]
    pub const fn from_bool(value: bool) -> Self {
        if value {
            Bit::One
        } else {
            Bit::Zero
        }
    }

    #[inline]
    pub const fn is_one(self) -> bool {
        matches!(self, Bit::One)
    }

    /// Bit `index` of `word`, counting from the least significant bit.
    #[inline]
    pub const fn of_word(word: u8, index: u32) -> Self {
        Self::from_bool((word >> index) & 1 != 0)
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        Bit::from_bool(value)
    }
}

impl From<Bit> for u8 {
    fn from(bit: Bit) -> Self {
        bit.is_one() as u8
    }
}

/// A received pulse after classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
    Zero,
    One,
    /// Pulse longer than any bit: end of transmission or forced resync.
    Reset,
    /// Pulse too short to be a bit.
    Error,
}

impl Symbol {
    /// The carried bit, if this symbol is one.
    #[inline]
    pub const fn bit(self) -> Option<Bit> {
        match self {
            Symbol::Zero => Some(Bit::Zero),
            Symbol::One => Some(Bit::One),
            Symbol::Reset | Symbol::Error => None,
        }
    }
}

/// A scheduled output level and how long to hold it, in timer ticks.
///
/// Bit layout:
/// ```text
/// [31: level][30..0: ticks]
/// ```
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pulse(u32);

impl Pulse {
    const LEVEL: u32 = 1 << 31;
    const TICKS: u32 = Self::LEVEL - 1;

    /// Placeholder used to initialise queue storage.
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub const fn new(level: bool, ticks: u32) -> Self {
        let level = if level { Self::LEVEL } else { 0 };
        Self(level | (ticks & Self::TICKS))
    }

    #[inline]
    pub const fn high(ticks: u32) -> Self {
        Self::new(true, ticks)
    }

    #[inline]
    pub const fn low(ticks: u32) -> Self {
        Self::new(false, ticks)
    }

    #[inline]
    pub const fn level(&self) -> bool {
        self.0 & Self::LEVEL != 0
    }

    #[inline]
    pub const fn ticks(&self) -> u32 {
        self.0 & Self::TICKS
    }
}
