//! Pulse-width bit codec.
//!
//! ```text
//!   main loop                         interrupts
//!   ─────────                         ──────────
//!   Transmitter ──▶ TxCodec queue ──▶ timer expiry ──▶ bus out
//!   Receiver    ◀── RxCodec queue ◀── edge capture ◀── bus in
//! ```
//!
//! The codecs are meant to live in `static`s: the ISR half takes `&self`,
//! the main-loop half is a [`Transmitter`] / [`Receiver`] handle that also
//! owns the interrupt-masking capability. The automata only see the two
//! traits below, so they run unchanged against test doubles.

pub mod rx;
pub mod tx;

pub use rx::{Receiver, RxCodec};
pub use tx::{Bulk, Transmitter, TxCodec};

use crate::symbol::{Bit, Symbol};

/// Where an automaton sends its bits.
pub trait BitSink {
    /// Queue one full bit.
    fn bark(&mut self, bit: Bit);

    /// Queue a sequence so nothing can interleave with it.
    fn burst(&mut self, bits: &[Bit]) {
        for &bit in bits {
            self.bark(bit);
        }
    }

    /// Queue the bus reset waveform.
    fn reset_pulse(&mut self);
}

/// Where the supervisor reads classified symbols from.
pub trait SymbolSource {
    /// Number of captured pulses waiting. Never blocks.
    fn bits_available(&self) -> u32;

    /// Pop and classify one pulse, `None` if nothing was waiting.
    fn receive_bit(&mut self) -> Option<Symbol>;
}
