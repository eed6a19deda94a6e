//! Coordinator watchdog and resync supervisor.
//!
//! Wraps [`Akela`] and owns the only timeout on the bus. Every transition
//! re-arms one deadline; whatever state it is in, a deadline that passes in
//! silence sends the bus to RESET.
//!
//! ```text
//!            Complete + rally
//!           ┌──────┐
//!           ▼      │
//!         GOOD ────┘──Resync / timeout──▶ RESET ◀── timeout (re-emit)
//!           ▲                              │  ▲
//!           │ reset echo                   │  │ timeout
//!           └──────────────────────────────┘  │
//!                         RESET/Error ▼       │
//!                                   COOLDOWN ─┘
//! ```
//!
//! COOLDOWN drains whatever is still in flight until the line has been quiet
//! for a whole deadline, so the reset never collides with stale traffic.

use crate::akela::{Akela, Rally};
use crate::codec::{BitSink, SymbolSource};
use crate::config::{MAX_NODES, PATIENCE_US, PAYLOAD_BITS};
use crate::health::{BusHealth, FaultCode};
use crate::keystate::{KeyStates, Snapshot};
use crate::logging::LogStream;
use crate::symbol::{Bit, Symbol};
use crate::{bus_debug, bus_info, bus_trace, bus_warn};

/// Supervisor state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Watch {
    /// A cycle is in flight and the stream makes sense.
    Good = 0,
    /// Discarding until the line goes quiet.
    Cooldown = 1,
    /// Reset waveform sent, waiting for it to come back around the chain.
    Reset = 2,
}

pub struct Supervisor<'a, const K: u32 = PAYLOAD_BITS, const N: usize = MAX_NODES> {
    state: Watch,
    deadline_us: u64,
    patience_us: u64,
    akela: Akela<K, N>,
    keys: KeyStates<N>,
    health: &'a BusHealth,
    log: &'a LogStream,
}

impl<'a, const K: u32, const N: usize> Supervisor<'a, K, N> {
    /// Starts in COOLDOWN with the deadline already expired, so the first
    /// silent poll resets the bus.
    pub fn new(health: &'a BusHealth, log: &'a LogStream) -> Self {
        Self::with_patience(PATIENCE_US, health, log)
    }

    pub fn with_patience(patience_us: u64, health: &'a BusHealth, log: &'a LogStream) -> Self {
        Self {
            state: Watch::Cooldown,
            deadline_us: 0,
            patience_us,
            akela: Akela::new(),
            keys: KeyStates::new(),
            health,
            log,
        }
    }

    #[inline]
    pub fn state(&self) -> Watch {
        self.state
    }

    #[inline]
    pub fn deadline_us(&self) -> u64 {
        self.deadline_us
    }

    /// Key words of the last completed cycle.
    pub fn latest_snapshot(&self) -> Snapshot<'_> {
        self.keys.latest_snapshot()
    }

    /// Per-node change mask of the last completed cycle.
    pub fn edge_events(&self) -> &[u8] {
        self.keys.edge_events()
    }

    pub fn keys(&self) -> &KeyStates<N> {
        &self.keys
    }

    /// One main-loop iteration.
    ///
    /// Handles at most one received symbol. Returns the chain length when
    /// this call completed a cycle.
    pub fn poll<R, T>(&mut self, now_us: u64, rx: &mut R, tx: &mut T) -> Option<usize>
    where
        R: SymbolSource + ?Sized,
        T: BitSink + ?Sized,
    {
        if rx.bits_available() == 0 {
            if now_us >= self.deadline_us {
                self.on_timeout(now_us, tx);
            }
            return None;
        }

        let symbol = rx.receive_bit()?;

        match self.state {
            Watch::Good => self.good(symbol, now_us, rx, tx),
            Watch::Cooldown => {
                self.arm(now_us);
                None
            }
            Watch::Reset => {
                if symbol == Symbol::Reset {
                    bus_debug!(self.log, now_us, "reset echo, starting cycle");
                    self.start_cycle(now_us, tx);
                } else {
                    self.enter(Watch::Cooldown, now_us);
                }
                None
            }
        }
    }

    fn good<R, T>(&mut self, symbol: Symbol, now_us: u64, rx: &mut R, tx: &mut T) -> Option<usize>
    where
        R: SymbolSource + ?Sized,
        T: BitSink + ?Sized,
    {
        let bit = match symbol {
            Symbol::Zero => Bit::Zero,
            Symbol::One => Bit::One,
            Symbol::Reset => {
                self.health.record(FaultCode::ResetSeen, self.akela.wolves_seen() as u32);
                self.enter(Watch::Cooldown, now_us);
                return None;
            }
            Symbol::Error => {
                self.health.record(FaultCode::DecodeError, self.akela.wolves_seen() as u32);
                bus_warn!(
                    self.log,
                    now_us,
                    "undecodable pulse at wolf {}",
                    self.akela.wolves_seen()
                );
                self.enter(Watch::Cooldown, now_us);
                return None;
            }
        };

        match self.akela.listen(bit, &mut self.keys) {
            Rally::Continue => {
                self.arm(now_us);
                None
            }
            Rally::Resync => {
                self.desync(now_us, tx);
                None
            }
            Rally::Complete(rabies) => {
                self.keys.publish(rabies);
                self.health.cycle_completed();
                bus_trace!(self.log, now_us, "cycle complete, {} wolves", rabies);

                if rx.bits_available() > 0 {
                    // Nothing may follow HOWL
                    self.desync(now_us, tx);
                } else {
                    self.start_cycle(now_us, tx);
                }
                Some(rabies)
            }
        }
    }

    fn on_timeout<T: BitSink + ?Sized>(&mut self, now_us: u64, tx: &mut T) {
        match self.state {
            Watch::Good => {
                self.health.record(FaultCode::Timeout, Watch::Good as u32);
                bus_warn!(self.log, now_us, "no answer from the pack");
                self.enter_reset(now_us, tx);
            }
            Watch::Cooldown => {
                bus_debug!(self.log, now_us, "line quiet, resetting bus");
                self.enter_reset(now_us, tx);
            }
            Watch::Reset => {
                self.health.record(FaultCode::Timeout, Watch::Reset as u32);
                bus_debug!(self.log, now_us, "reset echo missing, re-sending");
                self.enter_reset(now_us, tx);
            }
        }
    }

    fn desync<T: BitSink + ?Sized>(&mut self, now_us: u64, tx: &mut T) {
        self.health.record(FaultCode::Desync, self.akela.wolves_seen() as u32);
        bus_warn!(self.log, now_us, "desync at wolf {}", self.akela.wolves_seen());
        self.enter_reset(now_us, tx);
    }

    fn enter_reset<T: BitSink + ?Sized>(&mut self, now_us: u64, tx: &mut T) {
        tx.reset_pulse();
        self.health.reset_sent();
        self.enter(Watch::Reset, now_us);
    }

    /// Only place a cycle starts.
    fn start_cycle<T: BitSink + ?Sized>(&mut self, now_us: u64, tx: &mut T) {
        if self.state != Watch::Good {
            bus_info!(self.log, now_us, "bus up");
        }
        self.akela.reset();
        tx.burst(&[Bit::GROWL, Bit::HOWL]);
        self.enter(Watch::Good, now_us);
    }

    #[inline]
    fn enter(&mut self, state: Watch, now_us: u64) {
        self.state = state;
        self.arm(now_us);
    }

    #[inline]
    fn arm(&mut self, now_us: u64) {
        self.deadline_us = now_us + self.patience_us;
    }
}
