//! # RABI
//!
//! Reverse Addressable Binary Input: a single-wire, daisy-chained bus that
//! polls a pack of small controllers from one coordinator.
//!
//! ## Architecture
//!
//! ```text
//!  Akela (coordinator)                        Wolves (pack nodes)
//!  ───────────────────                        ───────────────────
//!  Supervisor ─▶ Transmitter ── bus ──▶ Receiver ─▶ Wolf ─▶ Transmitter ── bus ──▶ …
//!      ▲                                                                            │
//!      └──────── Receiver ◀───────────────────── bus ◀──────────────────────────────┘
//! ```
//!
//! Bits are pulse widths. Interrupts only move raw pulses in and out of
//! [`fifo::SpscFifo`] queues; everything else runs in one cooperative main
//! loop per device and is host-testable through the [`hal`] traits.

#![cfg_attr(not(test), no_std)]

pub mod akela;
pub mod codec;
pub mod config;
pub mod fifo;
pub mod hal;
pub mod health;
pub mod keystate;
pub mod log_globals;
pub mod logging;
pub mod pack;
pub mod selftest;
pub mod symbol;
pub mod uart_logger;
pub mod watchdog;

pub use akela::{Akela, Rally};
pub use codec::{BitSink, Receiver, RxCodec, SymbolSource, Transmitter, TxCodec};
pub use health::{BusHealth, FaultCode};
pub use keystate::{KeyStates, Snapshot};
pub use log_globals::{BUS_HEALTH, BUS_LOG};
pub use pack::{PackNode, PayloadSource, SwitchDebounce, Wolf};
pub use symbol::{Bit, Pulse, Symbol};
pub use watchdog::{Supervisor, Watch};
