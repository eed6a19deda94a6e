//! Akela firmware: the pack coordinator.
//!
//! Keeps the chain polled, publishes each completed cycle and logs every
//! key change. Consumers of the key state (HID, LEDs) hook in where the
//! edges are handled.

#![cfg_attr(target_os = "espidf", no_std)]
#![cfg_attr(target_os = "espidf", no_main)]

#[cfg(target_os = "espidf")]
mod firmware {
    use core::convert::Infallible;

    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::sys::EspError;

    use rabi::codec::{Receiver, RxCodec, Transmitter, TxCodec};
    use rabi::hal::esp::{self, EspClock, EspPulseTimer, RxIrq, RxIsr, TxIrq, TxIsr};
    use rabi::hal::{BusPins, Clock};
    use rabi::uart_logger::{init_uart_logger, UartLogger, UartLoggerConfig};
    use rabi::{bus_debug, bus_error, bus_info, Supervisor, SymbolSource, BUS_HEALTH, BUS_LOG};

    const PINS: BusPins = BusPins::akela(4, 3);

    static TX_CODEC: TxCodec = TxCodec::new();
    static RX_CODEC: RxCodec = RxCodec::new();
    static TX_TIMER: EspPulseTimer = EspPulseTimer::new();
    static TX_ISR: TxIsr = TxIsr {
        codec: &TX_CODEC,
        timer: &TX_TIMER,
        pin: PINS.bus_out,
    };
    static RX_ISR: RxIsr = RxIsr::new(&RX_CODEC, PINS.bus_in);

    #[no_mangle]
    fn main() {
        esp_idf_svc::sys::link_patches();

        let Ok(peripherals) = Peripherals::take() else {
            return;
        };
        let mut logger = init_uart_logger(
            peripherals.uart1,
            peripherals.pins.gpio6,
            &UartLoggerConfig::default(),
        )
        .ok()
        .map(UartLogger::new);

        let clock = EspClock;
        if let Err(err) = run(&clock, &mut logger) {
            bus_error!(BUS_LOG, clock.now_us(), "akela stopped: {}", err);
        }

        loop {
            if let Some(logger) = logger.as_mut() {
                logger.poll(clock.now_us());
            }
            // SAFETY: FreeRTOS delay from task context
            unsafe {
                esp_idf_svc::sys::vTaskDelay(10);
            }
        }
    }

    fn run(clock: &EspClock, logger: &mut Option<UartLogger<'_>>) -> Result<Infallible, EspError> {
        esp::init_bus(&PINS, &TX_ISR, &RX_ISR)?;

        let mut rx = Receiver::new(&RX_CODEC, RxIrq(PINS.bus_in));
        let mut tx = Transmitter::new(&TX_CODEC, &TX_TIMER, TxIrq);
        let mut supervisor: Supervisor<'_> = Supervisor::new(&BUS_HEALTH, &BUS_LOG);
        let mut rabies = 0;

        bus_info!(BUS_LOG, clock.now_us(), "{} akela up", env!("VERSION_STRING"));

        loop {
            let now = clock.now_us();
            match supervisor.poll(now, &mut rx, &mut tx) {
                Some(count) => {
                    if count != rabies {
                        bus_info!(BUS_LOG, now, "pack size {} -> {}", rabies, count);
                        rabies = count;
                    }
                    let snap = supervisor.latest_snapshot();
                    let edges = &supervisor.edge_events()[..snap.rabies];
                    for (wolf, &edge) in edges.iter().enumerate() {
                        if edge != 0 {
                            bus_debug!(BUS_LOG, now, "wolf {} -> {}", wolf, snap.words[wolf]);
                        }
                    }
                }
                None => {
                    if rx.bits_available() == 0 {
                        if let Some(logger) = logger.as_mut() {
                            logger.poll(now);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    println!(
        "{}: akela firmware, build for an ESP-IDF target to run it",
        env!("VERSION_STRING")
    );
}
