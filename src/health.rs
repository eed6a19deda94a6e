//! Bus health bookkeeping.
//!
//! Every protocol error is recovered inside the core, so nothing here ever
//! stops the bus. What it does is leave a trail: how often each kind of
//! error happened, which one came last, and how many cycles completed in
//! between. A steadily climbing `Timeout` count with no completed cycles
//! means a broken link; an occasional `Desync` is noise being handled.
//!
//! Written only from the main loop, readable from anywhere.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Recoverable error kinds seen on the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// Nothing recorded yet.
    None = 0,

    /// Pulse outside every timing band.
    DecodeError = 1,

    /// Input inconsistent with the frame structure.
    /// Data: chain position where it was detected.
    Desync = 2,

    /// Deadline passed without expected traffic.
    /// Data: supervisor state code.
    Timeout = 3,

    /// A reset waveform arrived (and, on a node, was passed on).
    ResetSeen = 4,
}

impl FaultCode {
    /// Number of codes, including `None`.
    pub const COUNT: usize = 5;

    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::DecodeError,
            2 => FaultCode::Desync,
            3 => FaultCode::Timeout,
            4 => FaultCode::ResetSeen,
            _ => FaultCode::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::None => "none",
            FaultCode::DecodeError => "decode-error",
            FaultCode::Desync => "desync",
            FaultCode::Timeout => "timeout",
            FaultCode::ResetSeen => "reset-seen",
        }
    }
}

/// Counters shared between the protocol loop and diagnostics.
pub struct BusHealth {
    /// Last recorded code.
    last: AtomicU8,

    /// Datum attached to the last code.
    data: AtomicU32,

    /// Occurrences per code (index = code).
    counts: [AtomicU32; FaultCode::COUNT],

    /// Completed polling cycles.
    cycles: AtomicU32,

    /// Reset waveforms this device emitted.
    resets_sent: AtomicU32,
}

impl BusHealth {
    pub const fn new() -> Self {
        Self {
            last: AtomicU8::new(0),
            data: AtomicU32::new(0),
            counts: [const { AtomicU32::new(0) }; FaultCode::COUNT],
            cycles: AtomicU32::new(0),
            resets_sent: AtomicU32::new(0),
        }
    }

    /// Record one occurrence of `code`.
    #[inline]
    pub fn record(&self, code: FaultCode, data: u32) {
        self.data.store(data, Ordering::Release);
        self.last.store(code as u8, Ordering::Release);
        self.counts[code as usize].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn cycle_completed(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn reset_sent(&self) {
        self.resets_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self, code: FaultCode) -> u32 {
        self.counts[code as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn last(&self) -> FaultCode {
        FaultCode::from_u8(self.last.load(Ordering::Acquire))
    }

    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    #[inline]
    pub fn cycles(&self) -> u32 {
        self.cycles.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn resets_sent(&self) -> u32 {
        self.resets_sent.load(Ordering::Relaxed)
    }

    /// Copy every counter at once.
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            last: self.last(),
            data: self.data(),
            cycles: self.cycles(),
            resets_sent: self.resets_sent(),
            decode_errors: self.count(FaultCode::DecodeError),
            desyncs: self.count(FaultCode::Desync),
            timeouts: self.count(FaultCode::Timeout),
            resets_seen: self.count(FaultCode::ResetSeen),
        }
    }
}

impl Default for BusHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`BusHealth`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub last: FaultCode,
    pub data: u32,
    pub cycles: u32,
    pub resets_sent: u32,
    pub decode_errors: u32,
    pub desyncs: u32,
    pub timeouts: u32,
    pub resets_seen: u32,
}
