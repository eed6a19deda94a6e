//! Module: config
//!
//! Purpose: Compile-time configuration for the RABI bus.
//!
//! Architecture:
//! - Every constant here is fixed at build time, nothing is negotiated on the wire
//! - Durations on the wire are in capture/compare timer ticks (`TICK_NS` each)
//! - Supervisor and node timeouts are in microseconds of the monotonic clock
//! - Invariants between constants are checked with `const` assertions
//!
//! Safety: Safe. Constants and `const fn` only.

mod timing;

pub use timing::{Thresholds, Timing};

/// Length of one timer tick in nanoseconds (10 MHz timer clock).
pub const TICK_NS: u32 = 100;

/// High time of a ZERO bit (4.0 µs).
pub const T0H: u32 = Timing::us_to_ticks(4);
/// Low time following a ZERO bit.
pub const T0L: u32 = 85;
/// High time of a ONE bit (8.0 µs).
pub const T1H: u32 = Timing::us_to_ticks(8);
/// Low time following a ONE bit.
pub const T1L: u32 = 45;

/// High time of the bus reset waveform. Must classify as RESET.
pub const T_RESET: u32 = Timing::us_to_ticks(40);

/// Payload width per node in bits (K).
pub const PAYLOAD_BITS: u32 = 1;

/// Largest chain the coordinator will aggregate.
pub const MAX_NODES: usize = 64;

/// Ticks lost between timer expiry and the GPIO write inside the TX ISR.
///
/// Subtracted from every scheduled duration. Calibrate with
/// [`crate::selftest::LoopbackProbe`].
pub const ISR_LATENCY_TICKS: u32 = 10;

/// TX pulse queue capacity. Power of 2.
pub const TX_FIFO_SIZE: usize = 16;

/// RX interval queue capacity. Power of 2.
pub const RX_FIFO_SIZE: usize = 16;

/// Supervisor patience: the deadline re-armed on every transition.
pub const PATIENCE_US: u64 = 5_000;

/// A node drops back to REST when two bits are further apart than this.
pub const NODE_RESET_US: u64 = 100;

/// Lockout after an accepted change of the local switch.
pub const SWITCH_DEBOUNCE_US: u64 = 2_000;

/// Default bus timing.
pub const TIMING: Timing = Timing::DEFAULT;

/// Default receive thresholds derived from [`TIMING`].
pub const THRESHOLDS: Thresholds = Thresholds::from_timing(&TIMING);

/// Bits a terminus with `payload_bits`-bit words queues while answering one
/// HOWL: BARK, the payload, then the closing GROWL HOWL.
pub const fn terminus_bits(payload_bits: u32) -> usize {
    1 + payload_bits as usize + 2
}

/// Bits the terminus queues for [`PAYLOAD_BITS`].
pub const TERMINUS_BURST_BITS: usize = terminus_bits(PAYLOAD_BITS);

const _: () = assert!(TX_FIFO_SIZE.is_power_of_two(), "TX_FIFO_SIZE must be a power of 2");
const _: () = assert!(RX_FIFO_SIZE.is_power_of_two(), "RX_FIFO_SIZE must be a power of 2");
const _: () = assert!(
    TX_FIFO_SIZE >= 2 * TERMINUS_BURST_BITS,
    "TX_FIFO_SIZE must hold a full terminus answer (two pulses per bit)"
);
const _: () = assert!(PAYLOAD_BITS >= 1 && PAYLOAD_BITS <= 8, "payload words are 1..=8 bits");
const _: () = assert!(MAX_NODES <= i16::MAX as usize);
const _: () = assert!(THRESHOLDS.is_ordered(), "thresholds must satisfy lower < split < upper");
const _: () = assert!(T_RESET >= THRESHOLDS.upper, "T_RESET must classify as RESET");
const _: () = assert!(T0H + T0L == T1H + T1L, "both bit shapes share one period");
