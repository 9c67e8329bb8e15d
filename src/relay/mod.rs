//! Relay control state machine.
//!
//! ```text
//!   idle ──(control ≠ settled)──▶ debouncing ──(reverted)──▶ idle
//!                                     │
//!                               (stable for delay)
//!                                     ▼
//!                              rate-limit check ──(full)──▶ deferred, retried
//!                                     │
//!                                     ▼
//!            apply: drive set pin · log event · signal · reset self-heal
//! ```
//!
//! Independently of the control input, every pass compares each relay's
//! monitor pin with its commanded state and nudges the set pin when they
//! disagree (see [`heal`]).
//!
//! [`RelayController`] owns all runtime-only state. Persisted settings are
//! passed in by reference on every call so the controller never holds a
//! stale copy.

pub mod debounce;
pub mod heal;
pub mod limiter;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::{PinMode, PinPort, SignalSink};
use crate::app::signals::Signal;
use crate::history::{EventLog, EventRecord};
use crate::pins::{MAX_RELAYS, PinRole, RelayConfig};
use crate::settings::Settings;

use debounce::Debounce;
use heal::HealState;
use limiter::{SwitchLimiter, SwitchWheel};

/// The two clocks every pass needs: local milliseconds for timing and
/// remote-epoch seconds for timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Now {
    pub ms: u32,
    pub epoch: u32,
}

const MONITOR_BIT: u8 = 1 << 0;
const COMMANDED_BIT: u8 = 1 << 1;
const TEMP_DISABLED_BIT: u8 = 1 << 2;
const CONTROL_BIT: u8 = 1 << 3;

#[derive(Debug, Clone, Copy, Default)]
struct RelayRuntime {
    commanded: bool,
    temp_disabled: bool,
    /// Control level the output was last reconciled against.
    settled_control: bool,
    /// Control level seen on the latest pass.
    control: bool,
    monitor: bool,
    debounce: Debounce,
    limiter: SwitchLimiter,
    heal: HealState,
}

fn read_role(hw: &mut impl PinPort, role: PinRole) -> bool {
    role.physical(hw.read_digital(role.pin()))
}

/// Active-low inputs idle high on the internal pull-up.
fn input_mode(role: PinRole) -> PinMode {
    if role.is_inversed() {
        PinMode::InputPullUp
    } else {
        PinMode::Input
    }
}

pub struct RelayController {
    relays: [RelayRuntime; MAX_RELAYS],
    wheel: SwitchWheel,
    events: EventLog,
}

impl RelayController {
    pub fn new(settings: &Settings, now_ms: u32) -> Self {
        Self {
            relays: [RelayRuntime::default(); MAX_RELAYS],
            wheel: SwitchWheel::new(settings.switch_rate.interval_secs, now_ms),
            events: EventLog::new(),
        }
    }

    // ── Configuration ─────────────────────────────────────────

    /// Bring pins and runtime state in line with a (new) relay table.
    ///
    /// Slots beyond the relay count are cleared. Active slots keep their
    /// commanded state, re-sample their inputs and restart debounce and
    /// self-heal tracking.
    pub fn configure(&mut self, settings: &Settings, hw: &mut impl PinPort, now_ms: u32) {
        let count = settings.relay_count();
        for (index, rt) in self.relays.iter_mut().enumerate() {
            if index >= count {
                *rt = RelayRuntime::default();
                continue;
            }
            let cfg = settings.relays[index];
            if cfg.set.is_enabled() {
                hw.configure(cfg.set.pin(), PinMode::Output);
                hw.write_digital(cfg.set.pin(), cfg.set.physical(rt.commanded));
            }
            if cfg.monitor.is_enabled() {
                hw.configure(cfg.monitor.pin(), input_mode(cfg.monitor));
                rt.monitor = read_role(hw, cfg.monitor);
            }
            if cfg.control.is_enabled() {
                hw.configure(cfg.control.pin(), input_mode(cfg.control));
                rt.control = read_role(hw, cfg.control);
                rt.settled_control = rt.control;
            }
            rt.debounce.reset();
            rt.heal.reset(now_ms);
        }

        hw.configure(settings.interrupt_pin, PinMode::InputPullUp);
        hw.attach_control_interrupt(settings.interrupt_pin);
        info!(
            "RELAY: configured {} relay(s), interrupt on GPIO{}",
            count, settings.interrupt_pin
        );
    }

    /// Restart the switch-rate window, e.g. after the interval changed.
    pub fn reset_switch_counts(&mut self, settings: &Settings, now_ms: u32) {
        self.wheel = SwitchWheel::new(settings.switch_rate.interval_secs, now_ms);
        for rt in &mut self.relays {
            rt.limiter.clear();
        }
    }

    pub fn clear_switch_count(&mut self, index: usize) {
        self.relays[index].limiter.clear();
    }

    // ── Reconciliation ────────────────────────────────────────

    /// One evaluation pass over every active relay.
    pub fn reconcile(
        &mut self,
        settings: &Settings,
        hw: &mut (impl PinPort + DelayNs),
        now: Now,
        sink: &mut impl SignalSink,
    ) {
        let step = self.wheel.advance(now.ms);
        for rt in &mut self.relays {
            rt.limiter.update(step);
        }
        for index in 0..settings.relay_count() {
            self.reconcile_relay(index, settings, hw, now, sink);
        }
    }

    fn reconcile_relay(
        &mut self,
        index: usize,
        settings: &Settings,
        hw: &mut (impl PinPort + DelayNs),
        now: Now,
        sink: &mut impl SignalSink,
    ) {
        let cfg = settings.relays[index];
        let rt = &mut self.relays[index];

        if cfg.monitor.is_enabled() {
            let level = read_role(hw, cfg.monitor);
            if level != rt.monitor {
                rt.monitor = level;
                sink.emit(&Signal::MonitorStateChanged {
                    index: index as u8,
                    level,
                    timestamp: now.epoch,
                });
            }
        }

        if cfg.control.is_enabled() {
            rt.control = read_role(hw, cfg.control);
        }
        if cfg.control.is_enabled() && !rt.temp_disabled {
            let level = rt.control;
            let settled = rt.debounce.poll(
                level,
                rt.settled_control,
                now.ms,
                settings.self_heal.debounce_ms,
            );
            if let Some(level) = settled {
                self.on_control_settled(index, cfg, level, settings, hw, now, sink);
            }
        }

        let rt = &mut self.relays[index];
        if cfg.monitor.is_enabled()
            && cfg.set.is_enabled()
            && rt.monitor != rt.commanded
            && rt.heal.should_nudge(&settings.self_heal, now.ms)
        {
            let on = rt.commanded;
            hw.write_digital(cfg.set.pin(), cfg.set.physical(!on));
            hw.delay_ms(u32::from(settings.self_heal.settle_delay_ms));
            hw.write_digital(cfg.set.pin(), cfg.set.physical(on));
            let attempt = rt.heal.record(now.ms, now.epoch);
            warn!(
                "RELAY[{}]: monitor disagrees with commanded {}, nudge {}/{}",
                index, on, attempt, settings.self_heal.max_attempts
            );
            sink.emit(&Signal::SelfHealAttempt {
                index: index as u8,
                monitor: rt.monitor,
                attempt,
                timestamp: now.epoch,
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_control_settled(
        &mut self,
        index: usize,
        cfg: RelayConfig,
        level: bool,
        settings: &Settings,
        hw: &mut impl PinPort,
        now: Now,
        sink: &mut impl SignalSink,
    ) {
        let rt = &mut self.relays[index];
        let target = if cfg.is_push_mode() {
            level.then_some(!rt.commanded)
        } else {
            Some(level)
        };

        if let Some(on) = target.filter(|&on| on != rt.commanded) {
            let max = settings.switch_rate.max_switches;
            if !rt.limiter.try_add(self.wheel.bucket(), max) {
                debug!("RELAY[{}]: switch deferred, {} in window", index, max);
                return;
            }
            self.apply(index, cfg, on, true, hw, now, sink);
        }

        self.relays[index].settled_control = level;
        sink.emit(&Signal::ControlStateChanged {
            index: index as u8,
            level,
            timestamp: now.epoch,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        &mut self,
        index: usize,
        cfg: RelayConfig,
        on: bool,
        external: bool,
        hw: &mut impl PinPort,
        now: Now,
        sink: &mut impl SignalSink,
    ) {
        if cfg.set.is_enabled() {
            hw.write_digital(cfg.set.pin(), cfg.set.physical(on));
        }
        let rt = &mut self.relays[index];
        rt.heal.reset(now.ms);
        if rt.commanded == on {
            return;
        }
        rt.commanded = on;
        self.events.push(EventRecord {
            index: index as u8,
            on,
            external,
            timestamp: now.epoch,
        });
        info!(
            "RELAY[{}]: {} ({})",
            index,
            if on { "on" } else { "off" },
            if external { "control" } else { "host" }
        );
        sink.emit(&Signal::RelayStateChanged {
            index: index as u8,
            on,
            external,
            timestamp: now.epoch,
        });
    }

    // ── Host commands ─────────────────────────────────────────

    /// Explicit host command. Bypasses the rate limiter and always starts
    /// a new self-heal episode.
    pub fn command(
        &mut self,
        index: usize,
        on: bool,
        settings: &Settings,
        hw: &mut impl PinPort,
        now: Now,
        sink: &mut impl SignalSink,
    ) {
        self.apply(index, settings.relays[index], on, false, hw, now, sink);
    }

    /// Suspend or resume control-input handling for one relay.
    ///
    /// On resume the live control level becomes the settled one, so a
    /// switch moved while suspended does not flip the output.
    pub fn set_temp_disabled(
        &mut self,
        index: usize,
        disabled: bool,
        settings: &Settings,
        hw: &mut impl PinPort,
    ) {
        let cfg = settings.relays[index];
        let rt = &mut self.relays[index];
        if rt.temp_disabled && !disabled && cfg.control.is_enabled() {
            rt.control = read_role(hw, cfg.control);
            rt.settled_control = rt.control;
        }
        rt.temp_disabled = disabled;
        rt.debounce.reset();
    }

    // ── Queries ───────────────────────────────────────────────

    /// `bit0` monitor, `bit1` commanded, `bit2` temporarily disabled,
    /// `bit3` control.
    pub fn state_bits(&self, index: usize) -> u8 {
        let rt = &self.relays[index];
        let mut bits = 0;
        if rt.monitor {
            bits |= MONITOR_BIT;
        }
        if rt.commanded {
            bits |= COMMANDED_BIT;
        }
        if rt.temp_disabled {
            bits |= TEMP_DISABLED_BIT;
        }
        if rt.control {
            bits |= CONTROL_BIT;
        }
        bits
    }

    pub fn is_on(&self, index: usize) -> bool {
        self.relays[index].commanded
    }

    pub fn is_temp_disabled(&self, index: usize) -> bool {
        self.relays[index].temp_disabled
    }

    pub fn monitor_level(&self, index: usize) -> bool {
        self.relays[index].monitor
    }

    pub fn control_level(&self, index: usize) -> bool {
        self.relays[index].control
    }

    pub fn heal(&self, index: usize) -> &HealState {
        &self.relays[index].heal
    }

    pub fn debounce(&self, index: usize) -> &Debounce {
        &self.relays[index].debounce
    }

    pub fn switch_count(&self, index: usize) -> u8 {
        self.relays[index].limiter.count()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }
}
