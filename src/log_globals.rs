//! Global diagnostic instances.
//!
//! One log stream and one health block per device. The protocol loop is
//! the only writer of both; the logger task drains the stream and reports
//! the health snapshot.

use crate::health::BusHealth;
use crate::logging::LogStream;

/// Log stream of the protocol loop.
pub static BUS_LOG: LogStream = LogStream::new();

/// Error counters of the protocol loop.
pub static BUS_HEALTH: BusHealth = BusHealth::new();
