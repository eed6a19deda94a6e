//! Simulated bus shared by the integration tests.
//!
//! Every device gets a [`Port`]: its two codecs and a fake TX timer. After
//! each round of main-loop polls, [`transfer`] runs a device's TX interrupt
//! handler until it idles and hands every high pulse to the next device's
//! capture handler, with the ISR latency the codec subtracted added back
//! the way the real interrupt path adds it.

#![allow(dead_code)]

use std::cell::Cell;

use rabi::codec::{Receiver, RxCodec, Transmitter, TxCodec};
use rabi::hal::{InIsr, InputLine, OutputLine, PulseTimer};
use rabi::health::BusHealth;
use rabi::logging::{LogLevel, LogStream};
use rabi::pack::PackNode;
use rabi::watchdog::Supervisor;

/// Nodes the simulated coordinator accepts.
pub const SIM_MAX_NODES: usize = 8;

/// Simulated time per round of polls.
pub const STEP_US: u64 = 5;

#[derive(Default)]
pub struct SimTimer {
    armed: Cell<bool>,
    reload: Cell<u32>,
}

impl PulseTimer for SimTimer {
    fn is_armed(&self) -> bool {
        self.armed.get()
    }

    fn arm(&self) {
        self.armed.set(true);
    }

    fn disarm(&self) {
        self.armed.set(false);
    }

    fn reload(&self, ticks: u32) {
        self.reload.set(ticks);
    }
}

#[derive(Default)]
pub struct SimPin {
    pub high: bool,
}

impl OutputLine for SimPin {
    fn set_level(&mut self, high: bool) {
        self.high = high;
    }
}

/// Active-low push button.
#[derive(Default)]
pub struct SimSwitch {
    pub pressed: Cell<bool>,
}

impl InputLine for &SimSwitch {
    fn is_high(&self) -> bool {
        !self.pressed.get()
    }
}

/// Both codecs of one device plus its TX timer.
#[derive(Default)]
pub struct Port {
    pub tx: TxCodec,
    pub rx: RxCodec,
    pub timer: SimTimer,
}

pub type SimReceiver<'a> = Receiver<'a, InIsr>;
pub type SimTransmitter<'a> = Transmitter<'a, &'a SimTimer, InIsr>;

impl Port {
    pub fn receiver(&self) -> SimReceiver<'_> {
        Receiver::new(&self.rx, InIsr)
    }

    pub fn transmitter(&self) -> SimTransmitter<'_> {
        Transmitter::new(&self.tx, &self.timer, InIsr)
    }
}

/// Play out everything queued on `from` into `to`, returning the high
/// widths delivered.
pub fn transfer(from: &Port, to: &RxCodec) -> Vec<u32> {
    transfer_with_skew(from, to, 0)
}

/// As [`transfer`], with `skew` ticks added to every high time.
pub fn transfer_with_skew(from: &Port, to: &RxCodec, skew: i32) -> Vec<u32> {
    let mut pin = SimPin::default();
    let mut widths = Vec::new();
    while from.timer.is_armed() {
        from.tx.on_expiry(&from.timer, &mut pin);
        if from.timer.is_armed() && pin.high {
            let width = (from.timer.reload.get() + from.tx.latency()) as i32 + skew;
            let width = width.max(0) as u32;
            to.on_capture(width);
            widths.push(width);
        }
    }
    assert!(!pin.high, "line must rest low");
    widths
}

/// Everything a simulated chain borrows.
pub struct Rig {
    /// `ports[0]` is the coordinator, then the wolves in chain order.
    pub ports: Vec<Port>,
    pub switches: Vec<SimSwitch>,
    pub akela_health: BusHealth,
    pub pack_health: BusHealth,
    pub akela_log: LogStream,
    pub pack_log: LogStream,
}

impl Rig {
    pub fn new(wolves: usize) -> Self {
        Self {
            ports: (0..=wolves).map(|_| Port::default()).collect(),
            switches: (0..wolves).map(|_| SimSwitch::default()).collect(),
            akela_health: BusHealth::new(),
            pack_health: BusHealth::new(),
            akela_log: LogStream::with_level(LogLevel::Debug),
            pack_log: LogStream::with_level(LogLevel::Debug),
        }
    }

    pub fn press(&self, wolf: usize, pressed: bool) {
        self.switches[wolf].pressed.set(pressed);
    }

    pub fn chain(&self) -> Chain<'_> {
        let wolves = self.ports[1..]
            .iter()
            .zip(&self.switches)
            .map(|(port, switch)| {
                PackNode::new(
                    port.receiver(),
                    port.transmitter(),
                    switch,
                    &self.pack_health,
                    &self.pack_log,
                )
            })
            .collect();

        Chain {
            rig: self,
            akela: Supervisor::new(&self.akela_health, &self.akela_log),
            akela_rx: self.ports[0].receiver(),
            akela_tx: self.ports[0].transmitter(),
            wolves,
            now_us: 0,
        }
    }
}

pub type SimWolf<'a> = PackNode<'a, SimReceiver<'a>, SimTransmitter<'a>, &'a SimSwitch, 1>;

/// A coordinator and its pack, stepped in lock-step.
pub struct Chain<'a> {
    rig: &'a Rig,
    pub akela: Supervisor<'a, 1, SIM_MAX_NODES>,
    pub akela_rx: SimReceiver<'a>,
    pub akela_tx: SimTransmitter<'a>,
    pub wolves: Vec<SimWolf<'a>>,
    pub now_us: u64,
}

impl Chain<'_> {
    /// One poll of every device, then every link delivers its pulses.
    ///
    /// Returns the chain length if the coordinator completed a cycle.
    pub fn step(&mut self) -> Option<usize> {
        self.now_us += STEP_US;
        let now = self.now_us;

        let done = self.akela.poll(now, &mut self.akela_rx, &mut self.akela_tx);
        for wolf in &mut self.wolves {
            wolf.poll(now);
        }

        let ports = &self.rig.ports;
        for (i, port) in ports.iter().enumerate() {
            transfer(port, &ports[(i + 1) % ports.len()].rx);
        }
        done
    }

    /// Step until `cycles` cycles complete, returning each chain length.
    ///
    /// Panics if that takes more than `max_steps`.
    pub fn run_cycles(&mut self, cycles: usize, max_steps: usize) -> Vec<usize> {
        let mut lengths = Vec::new();
        for _ in 0..max_steps {
            if let Some(n) = self.step() {
                lengths.push(n);
                if lengths.len() == cycles {
                    return lengths;
                }
            }
        }
        panic!(
            "only {} of {} cycles completed in {} steps",
            lengths.len(),
            cycles,
            max_steps
        );
    }

    /// Words of the last completed cycle.
    pub fn words(&self) -> Vec<u8> {
        self.akela.latest_snapshot().words.to_vec()
    }
}
