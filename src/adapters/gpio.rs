//! GPIO adapter.
//!
//! Implements [`PinPort`] and [`DelayNs`] for the relay state machine.
//!
//! - **`target_os = "espidf"`** — raw `gpio_*` sys calls, any-edge ISR on
//!   the control-interrupt pin feeding the adapter's [`ControlLine`]. The
//!   line is boxed so the pointer handed to the ISR stays put.
//! - **`not(target_os = "espidf")`** — an in-memory pin table for host
//!   simulation; outputs read back what was written, inputs can be driven
//!   with [`GpioAdapter::set_input`].

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::{PinMode, PinPort};
use crate::control_line::ControlLine;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

pub struct GpioAdapter {
    interrupt_pin: Option<u8>,
    #[cfg(target_os = "espidf")]
    line: Box<ControlLine>,
    #[cfg(not(target_os = "espidf"))]
    line: ControlLine,
    #[cfg(not(target_os = "espidf"))]
    levels: HashMap<u8, bool>,
}

// ── Construction ──────────────────────────────────────────────

impl GpioAdapter {
    /// Install the per-pin GPIO ISR service.
    #[cfg(target_os = "espidf")]
    pub fn new() -> crate::error::Result<Self> {
        // SAFETY: called once from main() before the idle loop starts.
        // ESP_ERR_INVALID_STATE means the service is already installed.
        let ret = unsafe { gpio_install_isr_service(0) };
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(crate::error::Error::Init("GPIO ISR service"));
        }
        info!("GPIO: ISR service installed");
        Ok(Self {
            interrupt_pin: None,
            line: Box::new(ControlLine::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> crate::error::Result<Self> {
        info!("GPIO: simulation backend");
        Ok(Self {
            interrupt_pin: None,
            line: ControlLine::new(),
            levels: HashMap::new(),
        })
    }

    /// Drive a simulated input.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_input(&mut self, pin: u8, level: bool) {
        self.levels.insert(pin, level);
        if self.interrupt_pin == Some(pin) {
            self.line.on_edge(level);
        }
    }

    pub fn interrupt_pin(&self) -> Option<u8> {
        self.interrupt_pin
    }
}

// ── ISR ───────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn control_gpio_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the adapter's boxed line; the handler is removed
    // before the box is dropped.
    let line = unsafe { &*(arg as *const ControlLine) };
    // SAFETY: gpio_get_level is a register read; safe in ISR context.
    let level = unsafe { gpio_get_level(i32::from(line.pin())) } != 0;
    line.on_edge(level);
}

#[cfg(target_os = "espidf")]
impl Drop for GpioAdapter {
    fn drop(&mut self) {
        if let Some(pin) = self.interrupt_pin.take() {
            // SAFETY: detaches the ISR that borrows `self.line`.
            unsafe {
                gpio_isr_handler_remove(i32::from(pin));
            }
        }
    }
}

// ── PinPort ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl PinPort for GpioAdapter {
    fn configure(&mut self, pin: u8, mode: PinMode) {
        let (gpio_mode, pull_up) = match mode {
            PinMode::Input => (gpio_mode_t_GPIO_MODE_INPUT, false),
            PinMode::InputPullUp => (gpio_mode_t_GPIO_MODE_INPUT, true),
            PinMode::Output => (gpio_mode_t_GPIO_MODE_INPUT_OUTPUT, false),
        };
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode,
            pull_up_en: if pull_up {
                gpio_pullup_t_GPIO_PULLUP_ENABLE
            } else {
                gpio_pullup_t_GPIO_PULLUP_DISABLE
            },
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: pin numbers come from validated relay settings and are
        // outside the reserved set.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            log::warn!("GPIO{}: config failed (rc={})", pin, ret);
        }
    }

    fn read_digital(&mut self, pin: u8) -> bool {
        // SAFETY: read-only register access on a configured pin.
        (unsafe { gpio_get_level(i32::from(pin)) }) != 0
    }

    fn write_digital(&mut self, pin: u8, level: bool) {
        // SAFETY: pin was configured as an output; main-loop only.
        unsafe {
            gpio_set_level(i32::from(pin), u32::from(level));
        }
    }

    fn attach_control_interrupt(&mut self, pin: u8) {
        // SAFETY: the ISR service was installed in new(); handlers are only
        // added and removed from the main loop.
        unsafe {
            if let Some(old) = self.interrupt_pin.take() {
                gpio_isr_handler_remove(i32::from(old));
                gpio_set_intr_type(i32::from(old), gpio_int_type_t_GPIO_INTR_DISABLE);
            }
            self.line.arm(pin, gpio_get_level(i32::from(pin)) != 0);
            gpio_set_intr_type(i32::from(pin), gpio_int_type_t_GPIO_INTR_ANYEDGE);
            let ret = gpio_isr_handler_add(
                i32::from(pin),
                Some(control_gpio_isr),
                core::ptr::from_ref::<ControlLine>(&self.line).cast_mut().cast(),
            );
            if ret != ESP_OK as i32 {
                log::warn!("GPIO{}: ISR attach failed (rc={})", pin, ret);
                return;
            }
            gpio_intr_enable(i32::from(pin));
        }
        self.interrupt_pin = Some(pin);
        info!("GPIO{}: control interrupt attached", pin);
    }

    fn wait_control_edge(&mut self, timeout_ms: u32) -> bool {
        // SAFETY: esp_timer_get_time only reads the system timer.
        let start = unsafe { esp_timer_get_time() };
        let limit = i64::from(timeout_ms) * 1000;
        loop {
            if self.line.is_pending() {
                return true;
            }
            // SAFETY: as above.
            if unsafe { esp_timer_get_time() } - start >= limit {
                return false;
            }
            // One tick; an edge is picked up at most a tick late.
            esp_idf_hal::delay::FreeRtos::delay_ms(1);
        }
    }

    fn take_control_edge(&mut self) -> bool {
        self.line.take_pending()
    }
}

#[cfg(not(target_os = "espidf"))]
impl PinPort for GpioAdapter {
    fn configure(&mut self, pin: u8, mode: PinMode) {
        if mode == PinMode::InputPullUp {
            self.levels.entry(pin).or_insert(true);
        }
    }

    fn read_digital(&mut self, pin: u8) -> bool {
        self.levels.get(&pin).copied().unwrap_or(false)
    }

    fn write_digital(&mut self, pin: u8, level: bool) {
        self.levels.insert(pin, level);
    }

    fn attach_control_interrupt(&mut self, pin: u8) {
        let level = self.read_digital(pin);
        self.line.arm(pin, level);
        self.interrupt_pin = Some(pin);
    }

    /// Simulated time does not pass here; only reports a pending edge.
    fn wait_control_edge(&mut self, _timeout_ms: u32) -> bool {
        self.line.is_pending()
    }

    fn take_control_edge(&mut self) -> bool {
        self.line.take_pending()
    }
}

// ── DelayNs ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl DelayNs for GpioAdapter {
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_hal::delay::Ets::delay_us(ns.div_ceil(1000));
    }

    fn delay_ms(&mut self, ms: u32) {
        // Settle delays are long enough to yield to the scheduler.
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }
}

#[cfg(not(target_os = "espidf"))]
impl DelayNs for GpioAdapter {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
