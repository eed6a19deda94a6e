//! Loopback timing probe.
//!
//! Bring-up aid: with the bus output jumpered to the bus input, send bursts
//! of equal `(high w, low w)` pulses and compare the captured widths with
//! `w`. The width sweeps through a range so both bit shapes and the reset
//! band get covered. A steady offset across all widths is ISR latency that
//! [`ISR_LATENCY_TICKS`](crate::config::ISR_LATENCY_TICKS) should absorb.

use crate::codec::{Receiver, Transmitter};
use crate::hal::{IrqLine, PulseTimer};

/// Result of one probe burst.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeReport {
    /// Scheduled width in ticks.
    pub width: u32,
    /// Captures received for the burst.
    pub samples: u32,
    /// Largest `|captured - width|` seen.
    pub max_deviation: u32,
    /// Signed sum of `captured - width`, for estimating a fixed offset.
    pub total_offset: i64,
    /// Every pulse came back and none deviated more than the tolerance.
    pub passed: bool,
}

impl ProbeReport {
    /// Mean signed offset, zero when nothing came back.
    pub fn mean_offset(&self) -> i64 {
        if self.samples == 0 {
            0
        } else {
            self.total_offset / self.samples as i64
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ProbeConfig {
    pub min_width: u32,
    pub max_width: u32,
    pub step: u32,
    /// Pulses per burst.
    pub pulses: u32,
    /// Allowed deviation per pulse, in ticks.
    pub tolerance: u32,
    /// Pause between bursts.
    pub period_us: u64,
    /// Give up on missing captures after this long.
    pub timeout_us: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            min_width: 20,
            max_width: 500,
            step: 20,
            pulses: 4,
            tolerance: 3,
            period_us: 100_000,
            timeout_us: 10_000,
        }
    }
}

/// Burst in flight.
#[derive(Clone, Copy, Debug)]
struct Burst {
    started_us: u64,
    samples: u32,
    max_deviation: u32,
    total_offset: i64,
}

pub struct LoopbackProbe {
    config: ProbeConfig,
    width: u32,
    next_run_us: u64,
    burst: Option<Burst>,
}

impl LoopbackProbe {
    pub fn new(config: ProbeConfig) -> Self {
        let config = ProbeConfig {
            step: config.step.max(1),
            pulses: config.pulses.max(1),
            max_width: config.max_width.max(config.min_width),
            ..config
        };
        Self {
            width: config.min_width,
            next_run_us: 0,
            burst: None,
            config,
        }
    }

    /// Width the next (or current) burst uses.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// One main-loop iteration. Returns a report when a burst finishes.
    pub fn poll<T, I, J, const TN: usize, const RN: usize>(
        &mut self,
        now_us: u64,
        rx: &mut Receiver<'_, J, RN>,
        tx: &mut Transmitter<'_, T, I, TN>,
    ) -> Option<ProbeReport>
    where
        T: PulseTimer,
        I: IrqLine,
        J: IrqLine,
    {
        let Some(mut burst) = self.burst else {
            if now_us >= self.next_run_us && tx.is_idle() {
                self.launch(now_us, tx);
            }
            return None;
        };

        while let Some(ticks) = rx.receive_raw() {
            let offset = ticks as i64 - self.width as i64;
            burst.samples += 1;
            burst.total_offset += offset;
            burst.max_deviation = burst.max_deviation.max(offset.unsigned_abs() as u32);
        }
        self.burst = Some(burst);

        let timed_out = now_us.saturating_sub(burst.started_us) > self.config.timeout_us;
        if burst.samples >= self.config.pulses || timed_out {
            Some(self.finish(now_us, burst))
        } else {
            None
        }
    }

    fn launch<T: PulseTimer, I: IrqLine, const TN: usize>(
        &mut self,
        now_us: u64,
        tx: &mut Transmitter<'_, T, I, TN>,
    ) {
        // Both halves of every pair must fit the queue at once
        let pulses = self.config.pulses.min((TN / 2) as u32);
        self.config.pulses = pulses;

        let mut bulk = tx.begin();
        for _ in 0..pulses {
            bulk.schedule(true, self.width).schedule(false, self.width);
        }
        drop(bulk);

        self.burst = Some(Burst {
            started_us: now_us,
            samples: 0,
            max_deviation: 0,
            total_offset: 0,
        });
    }

    fn finish(&mut self, now_us: u64, burst: Burst) -> ProbeReport {
        let report = ProbeReport {
            width: self.width,
            samples: burst.samples,
            max_deviation: burst.max_deviation,
            total_offset: burst.total_offset,
            passed: burst.samples == self.config.pulses
                && burst.max_deviation <= self.config.tolerance,
        };

        self.width += self.config.step;
        if self.width > self.config.max_width {
            self.width = self.config.min_width;
        }
        self.burst = None;
        self.next_run_us = now_us + self.config.period_us;
        report
    }
}
