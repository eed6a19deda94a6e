//! Coordinator aggregation automaton.
//!
//! Reads the stream that comes back around the chain after a rally,
//!
//! ```text
//! GROWL { BARK payload[K] GROWL }* HOWL
//! ```
//!
//! one bit per [`Akela::listen`] call, and writes each payload word into the
//! key-state write buffer at its chain position. Counting BARK headers is
//! the only way the coordinator learns how long the chain is.

use crate::config::{MAX_NODES, PAYLOAD_BITS};
use crate::keystate::KeyStates;
use crate::symbol::Bit;

/// Outcome of feeding one bit to the aggregator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rally {
    /// More bits expected.
    Continue,

    /// HOWL seen; this many nodes answered.
    Complete(usize),

    /// The stream cannot be a valid cycle. The caller resets the bus.
    Resync,
}

/// Aggregator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listen {
    /// Expecting a GROWL header.
    Rest,

    /// Header seen, expecting BARK (node follows) or HOWL (end of chain).
    Alert,

    /// Shifting in the payload of the current node.
    ReadBits,
}

/// Coordinator automaton for `K`-bit payloads and at most `N` nodes.
#[derive(Debug)]
pub struct Akela<const K: u32 = PAYLOAD_BITS, const N: usize = MAX_NODES> {
    state: Listen,

    /// Chain position of the node being read, -1 before the first BARK.
    wolf_id: i16,

    /// Payload bits still to shift in.
    bits_left: u32,

    /// Payload word under construction, MSB first.
    word: u8,
}

impl<const K: u32, const N: usize> Akela<K, N> {
    pub const fn new() -> Self {
        const { assert!(K >= 1 && K <= 8, "payload words are 1..=8 bits") };
        const { assert!(N <= i16::MAX as usize) };

        Self {
            state: Listen::Rest,
            wolf_id: -1,
            bits_left: 0,
            word: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> Listen {
        self.state
    }

    /// Nodes whose BARK header has been seen in the cycle so far.
    #[inline]
    pub fn wolves_seen(&self) -> usize {
        (self.wolf_id + 1) as usize
    }

    /// Back to the start of a cycle. No side effects on the key buffers.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Feed one received bit.
    pub fn listen(&mut self, bit: Bit, keys: &mut KeyStates<N>) -> Rally {
        match self.state {
            Listen::Rest => {
                if bit != Bit::GROWL {
                    return Rally::Resync;
                }
                self.state = Listen::Alert;
                Rally::Continue
            }

            Listen::Alert if bit == Bit::HOWL => {
                let wolves = self.wolves_seen();
                self.reset();
                Rally::Complete(wolves)
            }

            Listen::Alert => {
                if self.wolves_seen() >= N {
                    return Rally::Resync;
                }
                self.wolf_id += 1;
                self.bits_left = K;
                self.word = 0;
                self.state = Listen::ReadBits;
                Rally::Continue
            }

            Listen::ReadBits => {
                self.word = (self.word << 1) | u8::from(bit);
                self.bits_left -= 1;
                if self.bits_left == 0 {
                    keys.write_slot(self.wolf_id as usize, self.word);
                    self.state = Listen::Rest;
                }
                Rally::Continue
            }
        }
    }
}

impl<const K: u32, const N: usize> Default for Akela<K, N> {
    fn default() -> Self {
        Self::new()
    }
}
