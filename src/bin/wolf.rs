//! Wolf firmware: one pack node.
//!
//! Relays the bus and answers each rally with the state of its switch.
//! The main loop busy-polls; the UART logger only runs when no bit is waiting.
//!
//! Built with the `loopback` feature it joins no chain and instead sweeps
//! [`LoopbackProbe`](rabi::selftest::LoopbackProbe) widths over a jumper from
//! bus output to bus input, logging each report.

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
    use rabi::{bus_error, bus_info, BUS_LOG};

    #[cfg(not(feature = "loopback"))]
    use rabi::hal::esp::EspPin;
    #[cfg(not(feature = "loopback"))]
    use rabi::{PackNode, BUS_HEALTH};

    #[cfg(feature = "loopback")]
    use rabi::bus_warn;
    #[cfg(feature = "loopback")]
    use rabi::selftest::{LoopbackProbe, ProbeConfig};

    const SWITCH_PIN: i32 = 1;
    const PINS: BusPins = BusPins::wolf(4, 3, SWITCH_PIN);

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
        #[cfg(not(feature = "loopback"))]
        let result = run(&clock, &mut logger);
        #[cfg(feature = "loopback")]
        let result = run_loopback(&clock, &mut logger);
        if let Err(err) = result {
            bus_error!(BUS_LOG, clock.now_us(), "wolf stopped: {}", err);
        }

        // Keep reporting whatever went wrong
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

    #[cfg(not(feature = "loopback"))]
    fn run(clock: &EspClock, logger: &mut Option<UartLogger<'_>>) -> Result<Infallible, EspError> {
        esp::init_bus(&PINS, &TX_ISR, &RX_ISR)?;
        let switch = EspPin::input_pull_up(SWITCH_PIN)?;

        let rx = Receiver::new(&RX_CODEC, RxIrq(PINS.bus_in));
        let tx = Transmitter::new(&TX_CODEC, &TX_TIMER, TxIrq);
        let mut node: PackNode<'_, _, _, _> = PackNode::new(rx, tx, switch, &BUS_HEALTH, &BUS_LOG);
        if !PINS.switch_active_low {
            node = node.with_active_high_switch();
        }

        bus_info!(BUS_LOG, clock.now_us(), "{} wolf up", env!("VERSION_STRING"));

        loop {
            let now = clock.now_us();
            if !node.poll(now) {
                if let Some(logger) = logger.as_mut() {
                    logger.poll(now);
                }
            }
        }
    }

    /// Width sweep with bus output jumpered to bus input, nothing else attached.
    #[cfg(feature = "loopback")]
    fn run_loopback(
        clock: &EspClock,
        logger: &mut Option<UartLogger<'_>>,
    ) -> Result<Infallible, EspError> {
        esp::init_bus(&PINS, &TX_ISR, &RX_ISR)?;

        let mut rx = Receiver::new(&RX_CODEC, RxIrq(PINS.bus_in));
        let mut tx = Transmitter::new(&TX_CODEC, &TX_TIMER, TxIrq);
        let mut probe = LoopbackProbe::new(ProbeConfig::default());

        bus_info!(BUS_LOG, clock.now_us(), "{} loopback sweep", env!("VERSION_STRING"));

        loop {
            let now = clock.now_us();
            match probe.poll(now, &mut rx, &mut tx) {
                Some(report) if report.passed => {
                    bus_info!(
                        BUS_LOG,
                        now,
                        "width {} offset {} max {}",
                        report.width,
                        report.mean_offset(),
                        report.max_deviation
                    );
                }
                Some(report) => {
                    bus_warn!(
                        BUS_LOG,
                        now,
                        "width {} failed: {} samples, max {}",
                        report.width,
                        report.samples,
                        report.max_deviation
                    );
                }
                None => {
                    if let Some(logger) = logger.as_mut() {
                        logger.poll(now);
                    }
                }
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    println!(
        "{}: wolf firmware, build for an ESP-IDF target to run it",
        env!("VERSION_STRING")
    );
}
