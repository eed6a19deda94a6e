//! ESP-IDF implementations of the HAL traits.
//!
//! # Resources
//!
//! ```text
//! TIMG0 timer 0  TX pacing, 10 MHz, alarm + auto-reload, ISR pops TxCodec
//! TIMG0 timer 1  free-running 10 MHz capture clock
//! bus_in GPIO    any-edge ISR: rising edge latches timer 1, falling edge pushes the width
//! bus_out GPIO   written only from the TX ISR
//! ```
//!
//! Both ISR contexts are `static`s built in the binaries and handed to the
//! driver as the callback argument.

use core::ffi::c_void;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use esp_idf_svc::sys::{self, esp, EspError};

use super::{BusPins, Clock, InputLine, IrqLine, OutputLine, PulseTimer};
use crate::codec::{RxCodec, TxCodec};

const GROUP: sys::timer_group_t = sys::timer_group_t_TIMER_GROUP_0;
const TX_TIMER: sys::timer_idx_t = sys::timer_idx_t_TIMER_0;
const CAPTURE_TIMER: sys::timer_idx_t = sys::timer_idx_t_TIMER_1;

/// APB 80 MHz / 8 = 10 MHz, one tick per 100 ns.
const TIMER_DIVIDER: u32 = 8;

/// `esp_timer` microseconds since boot.
#[derive(Clone, Copy, Debug, Default)]
pub struct EspClock;

impl Clock for EspClock {
    #[inline]
    fn now_us(&self) -> u64 {
        // SAFETY: plain read of the system timer
        unsafe { sys::esp_timer_get_time() as u64 }
    }
}

/// A GPIO used as a plain digital line.
#[derive(Clone, Copy, Debug)]
pub struct EspPin(pub i32);

impl EspPin {
    /// Push-pull output, driven low.
    pub fn output(pin: i32) -> Result<Self, EspError> {
        // SAFETY: pin configuration before any ISR uses it
        unsafe {
            esp!(sys::gpio_reset_pin(pin))?;
            esp!(sys::gpio_set_direction(pin, sys::gpio_mode_t_GPIO_MODE_OUTPUT))?;
            esp!(sys::gpio_set_level(pin, 0))?;
        }
        Ok(Self(pin))
    }

    /// Input with the internal pull-up enabled.
    pub fn input_pull_up(pin: i32) -> Result<Self, EspError> {
        // SAFETY: pin configuration before any ISR uses it
        unsafe {
            esp!(sys::gpio_reset_pin(pin))?;
            esp!(sys::gpio_set_direction(pin, sys::gpio_mode_t_GPIO_MODE_INPUT))?;
            esp!(sys::gpio_set_pull_mode(pin, sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY))?;
        }
        Ok(Self(pin))
    }
}

impl OutputLine for EspPin {
    #[inline]
    fn set_level(&mut self, high: bool) {
        // SAFETY: register write on a configured output
        unsafe {
            sys::gpio_set_level(self.0, high as u32);
        }
    }
}

impl InputLine for EspPin {
    #[inline]
    fn is_high(&self) -> bool {
        // SAFETY: register read
        unsafe { sys::gpio_get_level(self.0) != 0 }
    }
}

/// TX pacing timer.
pub struct EspPulseTimer {
    armed: AtomicBool,
}

impl EspPulseTimer {
    pub const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
        }
    }
}

impl Default for EspPulseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseTimer for EspPulseTimer {
    #[inline]
    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Main loop only: alarm one tick from now.
    fn arm(&self) {
        self.armed.store(true, Ordering::Release);
        // SAFETY: driver calls on an initialised timer
        unsafe {
            sys::timer_set_counter_value(GROUP, TX_TIMER, 0);
            sys::timer_set_alarm_value(GROUP, TX_TIMER, 1);
            sys::timer_set_alarm(GROUP, TX_TIMER, sys::timer_alarm_t_TIMER_ALARM_EN);
        }
    }

    /// ISR only: the alarm disables itself when it fires, so leaving it
    /// un-rearmed is enough.
    #[inline]
    fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// ISR only. Auto-reload has already zeroed the counter.
    #[inline]
    fn reload(&self, ticks: u32) {
        // SAFETY: ISR-safe driver calls
        unsafe {
            sys::timer_group_set_alarm_value_in_isr(GROUP, TX_TIMER, ticks as u64);
            sys::timer_group_enable_alarm_in_isr(GROUP, TX_TIMER);
        }
    }
}

/// Masks the TX timer interrupt.
#[derive(Clone, Copy, Debug, Default)]
pub struct TxIrq;

impl IrqLine for TxIrq {
    #[inline]
    fn mask(&self) {
        // SAFETY: interrupt enable bit of an initialised timer
        unsafe {
            sys::timer_disable_intr(GROUP, TX_TIMER);
        }
    }

    #[inline]
    fn unmask(&self) {
        // SAFETY: as above
        unsafe {
            sys::timer_enable_intr(GROUP, TX_TIMER);
        }
    }
}

/// Masks the capture edge interrupt of one pin.
#[derive(Clone, Copy, Debug)]
pub struct RxIrq(pub i32);

impl IrqLine for RxIrq {
    #[inline]
    fn mask(&self) {
        // SAFETY: interrupt enable bit of a configured pin
        unsafe {
            sys::gpio_intr_disable(self.0);
        }
    }

    #[inline]
    fn unmask(&self) {
        // SAFETY: as above
        unsafe {
            sys::gpio_intr_enable(self.0);
        }
    }
}

/// State the TX ISR needs.
pub struct TxIsr {
    pub codec: &'static TxCodec,
    pub timer: &'static EspPulseTimer,
    pub pin: i32,
}

/// State the capture ISR needs.
pub struct RxIsr {
    pub codec: &'static RxCodec,
    pub pin: i32,
    /// Capture clock at the last rising edge (low 32 bits).
    rise: AtomicU32,
}

impl RxIsr {
    pub const fn new(codec: &'static RxCodec, pin: i32) -> Self {
        Self {
            codec,
            pin,
            rise: AtomicU32::new(0),
        }
    }
}

unsafe extern "C" fn tx_isr(arg: *mut c_void) -> bool {
    // SAFETY: `arg` is the `&'static TxIsr` registered in `init_bus`
    let ctx = unsafe { &*(arg as *const TxIsr) };
    let mut pin = EspPin(ctx.pin);
    ctx.codec.on_expiry(ctx.timer, &mut pin);
    false
}

unsafe extern "C" fn rx_isr(arg: *mut c_void) {
    // SAFETY: `arg` is the `&'static RxIsr` registered in `init_bus`
    let ctx = unsafe { &*(arg as *const RxIsr) };
    // SAFETY: ISR-safe register reads
    let (now, high) = unsafe {
        (
            sys::timer_group_get_counter_value_in_isr(GROUP, CAPTURE_TIMER) as u32,
            sys::gpio_get_level(ctx.pin) != 0,
        )
    };

    if high {
        ctx.rise.store(now, Ordering::Relaxed);
    } else {
        let width = now.wrapping_sub(ctx.rise.load(Ordering::Relaxed));
        ctx.codec.on_capture(width);
    }
}

fn timer_config(auto_reload: bool) -> sys::timer_config_t {
    sys::timer_config_t {
        alarm_en: sys::timer_alarm_t_TIMER_ALARM_DIS,
        counter_en: sys::timer_start_t_TIMER_PAUSE,
        intr_type: sys::timer_intr_mode_t_TIMER_INTR_LEVEL,
        counter_dir: sys::timer_count_dir_t_TIMER_COUNT_UP,
        auto_reload: if auto_reload {
            sys::timer_autoreload_t_TIMER_AUTORELOAD_EN
        } else {
            sys::timer_autoreload_t_TIMER_AUTORELOAD_DIS
        },
        divider: TIMER_DIVIDER,
        ..Default::default()
    }
}

/// Configure both timers, the bus pins and their interrupts.
pub fn init_bus(pins: &BusPins, tx: &'static TxIsr, rx: &'static RxIsr) -> Result<(), EspError> {
    EspPin::output(pins.bus_out)?;
    EspPin::input_pull_up(pins.bus_in)?;

    // SAFETY: one-time driver setup; the contexts outlive the ISRs
    unsafe {
        esp!(sys::timer_init(GROUP, TX_TIMER, &timer_config(true)))?;
        esp!(sys::timer_set_counter_value(GROUP, TX_TIMER, 0))?;
        esp!(sys::timer_isr_callback_add(
            GROUP,
            TX_TIMER,
            Some(tx_isr),
            tx as *const TxIsr as *mut c_void,
            0,
        ))?;
        esp!(sys::timer_enable_intr(GROUP, TX_TIMER))?;
        esp!(sys::timer_start(GROUP, TX_TIMER))?;

        esp!(sys::timer_init(GROUP, CAPTURE_TIMER, &timer_config(false)))?;
        esp!(sys::timer_set_counter_value(GROUP, CAPTURE_TIMER, 0))?;
        esp!(sys::timer_start(GROUP, CAPTURE_TIMER))?;

        esp!(sys::gpio_set_intr_type(pins.bus_in, sys::gpio_int_type_t_GPIO_INTR_ANYEDGE))?;
        esp!(sys::gpio_install_isr_service(0))?;
        esp!(sys::gpio_isr_handler_add(
            pins.bus_in,
            Some(rx_isr),
            rx as *const RxIsr as *mut c_void,
        ))?;
        esp!(sys::gpio_intr_enable(pins.bus_in))?;
    }

    Ok(())
}
