//! Pack node: forwarding automaton, switch debounce and main-loop driver.
//!
//! Each node sits between an upstream input and a downstream output and
//! behaves like one stage of a shift register:
//!
//! ```text
//! REST ──GROWL──▶ ALERT ──BARK──▶ BARK (relay K+1 bits) ──▶ ALERT
//!                   │
//!                   └──HOWL──▶ HOWL (terminus: BARK payload GROWL HOWL) ──▶ REST
//! ```
//!
//! The node that sees HOWL is the current end of the chain, so it appends
//! its own payload. Every other node relays what it hears. Nothing is ever
//! addressed; position in the chain is the address.

use crate::codec::{BitSink, SymbolSource};
use crate::config::{NODE_RESET_US, PAYLOAD_BITS, SWITCH_DEBOUNCE_US};
use crate::hal::InputLine;
use crate::health::{BusHealth, FaultCode};
use crate::logging::LogStream;
use crate::symbol::{Bit, Symbol};
use crate::{bus_debug, bus_trace, bus_warn};

/// Node automaton state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WolfState {
    /// Waiting for a GROWL.
    Rest,
    /// Header forwarded, deciding between relay and terminus.
    Alert,
    /// Terminus, closing the chain.
    Howl,
    /// Relaying another node's payload.
    Bark,
}

/// Supplier of this node's payload word.
pub trait PayloadSource {
    /// Current word; only the low `K` bits are sent.
    fn sample(&mut self) -> u8;
}

impl PayloadSource for u8 {
    fn sample(&mut self) -> u8 {
        *self
    }
}

/// Result of one state step.
enum Flow {
    /// Step done, wait for the next bit.
    Wait,
    /// Run the next state within the same call.
    Proceed,
}

/// Forwarding automaton for `K`-bit payloads.
#[derive(Debug)]
pub struct Wolf<const K: u32 = PAYLOAD_BITS> {
    state: WolfState,

    /// Bits still to relay in `Bark`.
    relay_left: u32,

    /// Gap between bits after which the automaton starts over.
    reset_after_us: u64,
}

impl<const K: u32> Wolf<K> {
    /// Payload plus the header that follows it.
    const RELAY_BITS: u32 = K + 1;

    pub const fn new() -> Self {
        Self::with_reset_after(NODE_RESET_US)
    }

    pub const fn with_reset_after(reset_after_us: u64) -> Self {
        const { assert!(K >= 1 && K <= 8, "payload words are 1..=8 bits") };

        Self {
            state: WolfState::Rest,
            relay_left: 0,
            reset_after_us,
        }
    }

    #[inline]
    pub fn state(&self) -> WolfState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = WolfState::Rest;
        self.relay_left = 0;
    }

    /// Feed one received bit, `elapsed_us` after the previous one.
    pub fn join_cry<S, P>(&mut self, bit: Bit, elapsed_us: u64, out: &mut S, payload: &mut P)
    where
        S: BitSink + ?Sized,
        P: PayloadSource + ?Sized,
    {
        if elapsed_us > self.reset_after_us {
            self.reset();
        }

        let mut input = Some(bit);
        while let Flow::Proceed = self.step(&mut input, out, payload) {}
    }

    fn step<S, P>(&mut self, input: &mut Option<Bit>, out: &mut S, payload: &mut P) -> Flow
    where
        S: BitSink + ?Sized,
        P: PayloadSource + ?Sized,
    {
        match (self.state, input.take()) {
            // Re-entered with the HOWL already consumed
            (WolfState::Howl, _) => {
                out.burst(&[Bit::GROWL, Bit::HOWL]);
                self.state = WolfState::Rest;
                Flow::Wait
            }

            (_, None) => Flow::Wait,

            (WolfState::Rest, Some(bit)) => {
                if bit == Bit::GROWL {
                    out.bark(Bit::GROWL);
                    self.state = WolfState::Alert;
                }
                Flow::Wait
            }

            (WolfState::Alert, Some(Bit::HOWL)) => {
                // Sampled before queueing so BARK and payload leave as one burst
                let word = payload.sample();
                let mut bits = [Bit::BARK; 9];
                for i in 0..K {
                    bits[1 + i as usize] = Bit::of_word(word, K - 1 - i);
                }
                out.burst(&bits[..1 + K as usize]);
                self.state = WolfState::Howl;
                Flow::Proceed
            }

            (WolfState::Alert, Some(_)) => {
                out.bark(Bit::BARK);
                self.relay_left = Self::RELAY_BITS;
                self.state = WolfState::Bark;
                Flow::Wait
            }

            (WolfState::Bark, Some(bit)) => {
                out.bark(bit);
                self.relay_left -= 1;
                if self.relay_left == 0 {
                    self.state = WolfState::Alert;
                }
                Flow::Wait
            }
        }
    }
}

impl<const K: u32> Default for Wolf<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Debounced local switch.
///
/// A level change is accepted immediately, then further changes are ignored
/// for the lockout period.
#[derive(Debug)]
pub struct SwitchDebounce {
    pressed: bool,
    locked_until_us: u64,
    lockout_us: u64,
}

impl SwitchDebounce {
    pub const fn new() -> Self {
        Self::with_lockout(SWITCH_DEBOUNCE_US)
    }

    pub const fn with_lockout(lockout_us: u64) -> Self {
        Self {
            pressed: false,
            locked_until_us: 0,
            lockout_us,
        }
    }

    /// Feed the raw level, returns the debounced one.
    pub fn update(&mut self, raw_pressed: bool, now_us: u64) -> bool {
        if raw_pressed != self.pressed && now_us >= self.locked_until_us {
            self.pressed = raw_pressed;
            self.locked_until_us = now_us + self.lockout_us;
        }
        self.pressed
    }

    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

impl Default for SwitchDebounce {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadSource for SwitchDebounce {
    fn sample(&mut self) -> u8 {
        self.pressed as u8
    }
}

/// One pack node: automaton plus its codec handles and local switch.
pub struct PackNode<'a, R, S, W, const K: u32 = PAYLOAD_BITS>
where
    R: SymbolSource,
    S: BitSink,
    W: InputLine,
{
    wolf: Wolf<K>,
    rx: R,
    tx: S,
    switch_line: W,
    switch_active_low: bool,
    switch: SwitchDebounce,
    last_bit_us: u64,
    health: &'a BusHealth,
    log: &'a LogStream,
}

impl<'a, R, S, W, const K: u32> PackNode<'a, R, S, W, K>
where
    R: SymbolSource,
    S: BitSink,
    W: InputLine,
{
    pub fn new(rx: R, tx: S, switch_line: W, health: &'a BusHealth, log: &'a LogStream) -> Self {
        Self {
            wolf: Wolf::new(),
            rx,
            tx,
            switch_line,
            switch_active_low: true,
            switch: SwitchDebounce::new(),
            last_bit_us: 0,
            health,
            log,
        }
    }

    /// Switch reads pressed when the line is high.
    pub fn with_active_high_switch(mut self) -> Self {
        self.switch_active_low = false;
        self
    }

    /// One main-loop iteration.
    ///
    /// Returns `true` if a received symbol was handled.
    pub fn poll(&mut self, now_us: u64) -> bool {
        if self.rx.bits_available() == 0 {
            let raw = self.switch_line.is_high() != self.switch_active_low;
            self.switch.update(raw, now_us);
            return false;
        }

        let Some(symbol) = self.rx.receive_bit() else {
            return false;
        };

        match symbol {
            Symbol::Zero | Symbol::One => {
                let bit = if symbol == Symbol::One { Bit::One } else { Bit::Zero };
                let elapsed = now_us.saturating_sub(self.last_bit_us);
                self.last_bit_us = now_us;
                bus_trace!(self.log, now_us, "wolf {:?} <- {:?}", self.wolf.state(), bit);
                self.wolf.join_cry(bit, elapsed, &mut self.tx, &mut self.switch);
            }
            Symbol::Reset => {
                self.wolf.reset();
                self.tx.reset_pulse();
                self.health.record(FaultCode::ResetSeen, 0);
                self.health.reset_sent();
                bus_debug!(self.log, now_us, "reset passed downstream");
            }
            Symbol::Error => {
                self.wolf.reset();
                self.health.record(FaultCode::DecodeError, 0);
                bus_warn!(self.log, now_us, "undecodable pulse, back to rest");
            }
        }
        true
    }

    #[inline]
    pub fn state(&self) -> WolfState {
        self.wolf.state()
    }

    /// Debounced switch level.
    #[inline]
    pub fn pressed(&self) -> bool {
        self.switch.is_pressed()
    }

    pub fn tx(&self) -> &S {
        &self.tx
    }
}
