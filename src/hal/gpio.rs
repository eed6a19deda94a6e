//! Pin assignment for a bus participant.

/// GPIO numbers used by one node or the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusPins {
    /// Drives the downstream link.
    pub bus_out: i32,
    /// Reads the upstream link. Needs edge interrupts.
    pub bus_in: i32,
    /// Local switch sampled into the payload (pack nodes only).
    pub switch: Option<i32>,
    /// Switch pulls the line low when pressed.
    pub switch_active_low: bool,
}

impl BusPins {
    /// Coordinator wiring: no local switch.
    pub const fn akela(bus_out: i32, bus_in: i32) -> Self {
        Self {
            bus_out,
            bus_in,
            switch: None,
            switch_active_low: true,
        }
    }

    /// Pack node wiring with a pulled-up, active-low switch.
    pub const fn wolf(bus_out: i32, bus_in: i32, switch: i32) -> Self {
        Self {
            bus_out,
            bus_in,
            switch: Some(switch),
            switch_active_low: true,
        }
    }
}

impl Default for BusPins {
    fn default() -> Self {
        Self::wolf(4, 3, 1)
    }
}
