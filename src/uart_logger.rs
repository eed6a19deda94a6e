//! UART log output.
//!
//! Drains [`BUS_LOG`](crate::log_globals::BUS_LOG) onto a TX-only UART and
//! prints a health line every few seconds.
//!
//! # Hardware Setup
//!
//! ```text
//! ESP32 UART1 TX ──────▶ USB-UART RX
//!                         └─▶ PC Serial Monitor
//! ```
//!
//! The bus pins and the log pin must differ; the bus ISRs never touch the UART.

use core::fmt::Write;

use crate::health::HealthSnapshot;
use crate::logging::{BufWriter, LogEntry};

#[cfg(target_os = "espidf")]
use crate::log_globals::{BUS_HEALTH, BUS_LOG};

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::gpio;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::uart::{self, UartTxDriver};

/// Interval between health reports.
pub const HEALTH_REPORT_US: u64 = 10_000_000;

/// UART configuration for logging.
pub struct UartLoggerConfig {
    pub baud_rate: u32,
    pub tx_pin: u8,
}

impl Default for UartLoggerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            tx_pin: 6,
        }
    }
}

/// Format: `[timestamp_us] LEVEL: message\n`
pub fn format_log_entry(entry: &LogEntry, buf: &mut [u8]) -> usize {
    let mut writer = BufWriter { buf, pos: 0 };

    let _ = write!(
        writer,
        "[{:10}] {}: {}\n",
        entry.timestamp_us,
        entry.level.as_str(),
        entry.text()
    );

    writer.pos
}

/// One-line summary of the health counters and lost log messages.
pub fn format_health(snap: &HealthSnapshot, dropped: u32, buf: &mut [u8]) -> usize {
    let mut writer = BufWriter { buf, pos: 0 };

    let _ = write!(
        writer,
        "[HEALTH] cycles={} resets={} decode={} desync={} timeout={} reset_seen={} last={} dropped_logs={}\n",
        snap.cycles,
        snap.resets_sent,
        snap.decode_errors,
        snap.desyncs,
        snap.timeouts,
        snap.resets_seen,
        snap.last.as_str(),
        dropped
    );

    writer.pos
}

/// Initialize UART1 TX-only for logging output.
#[cfg(target_os = "espidf")]
pub fn init_uart_logger<'d>(
    uart: impl Peripheral<P = esp_idf_svc::hal::uart::UART1> + 'd,
    tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'd,
    config: &UartLoggerConfig,
) -> Result<UartTxDriver<'d>, esp_idf_svc::sys::EspError> {
    let uart_config = uart::config::Config::default()
        .baudrate(esp_idf_svc::hal::units::Hertz(config.baud_rate));

    UartTxDriver::new(
        uart,
        tx_pin,
        Option::<gpio::AnyIOPin>::None, // CTS
        Option::<gpio::AnyIOPin>::None, // RTS
        &uart_config,
    )
}

/// UART sink for [`BUS_LOG`], serviced from the idle branch of the protocol loop.
#[cfg(target_os = "espidf")]
pub struct UartLogger<'d> {
    uart: UartTxDriver<'d>,
    format_buf: [u8; 192],
    last_report_us: u64,
}

#[cfg(target_os = "espidf")]
impl<'d> UartLogger<'d> {
    pub fn new(uart: UartTxDriver<'d>) -> Self {
        Self {
            uart,
            format_buf: [0; 192],
            last_report_us: 0,
        }
    }

    /// Write at most one entry, plus the health line when it is due.
    ///
    /// Returns `true` if anything was written.
    pub fn poll(&mut self, now_us: u64) -> bool {
        let mut work_done = false;

        if let Some(entry) = BUS_LOG.drain() {
            let len = format_log_entry(&entry, &mut self.format_buf);
            let _ = self.uart.write(&self.format_buf[..len]);
            work_done = true;
        }

        if now_us.saturating_sub(self.last_report_us) > HEALTH_REPORT_US {
            let len = format_health(
                &BUS_HEALTH.snapshot(),
                BUS_LOG.dropped(),
                &mut self.format_buf,
            );
            let _ = self.uart.write(&self.format_buf[..len]);
            BUS_LOG.reset_dropped();
            self.last_report_us = now_us;
            work_done = true;
        }

        work_done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::BusHealth;
    use crate::health::FaultCode;
    use crate::logging::{LogLevel, MAX_MSG_LEN};

    fn entry(timestamp_us: u64, level: LogLevel, text: &[u8], len: u8) -> LogEntry {
        let mut msg = [0u8; MAX_MSG_LEN];
        msg[..text.len()].copy_from_slice(text);
        LogEntry {
            timestamp_us,
            level,
            len,
            msg,
        }
    }

    #[test]
    fn test_format_log_entry() {
        let entry = entry(1234567, LogLevel::Info, b"Hello world", 11);

        let mut buf = [0u8; 192];
        let len = format_log_entry(&entry, &mut buf);

        let formatted = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(formatted.contains("1234567"));
        assert!(formatted.contains("INFO"));
        assert!(formatted.contains("Hello world"));
        assert!(formatted.ends_with('\n'));
    }

    #[test]
    fn test_format_truncated_message() {
        // Only the first 5 bytes are part of the message
        let entry = entry(999, LogLevel::Error, b"TEST12345X", 5);

        let mut buf = [0u8; 192];
        let len = format_log_entry(&entry, &mut buf);

        let formatted = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("TEST1"));
        assert!(!formatted.contains("X"));
    }

    #[test]
    fn test_format_health() {
        let health = BusHealth::new();
        health.cycle_completed();
        health.record(FaultCode::Timeout, 2);

        let mut buf = [0u8; 192];
        let len = format_health(&health.snapshot(), 3, &mut buf);

        let formatted = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(formatted.contains("cycles=1"));
        assert!(formatted.contains("timeout=1"));
        assert!(formatted.contains("last=timeout"));
        assert!(formatted.contains("dropped_logs=3"));
    }
}
