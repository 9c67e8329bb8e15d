//! Persisted controller settings.
//!
//! [`SettingsStore`] owns the in-memory copy and writes every accepted
//! change through to the [`StoragePort`] at its fixed offset (see
//! [`layout`]). Values read back at boot are sanitised: anything out of
//! range falls back to its default instead of being trusted.
//!
//! Mutators validate first and only then touch storage, so a rejected
//! command never leaves a partial write behind. Changes spanning several
//! fields are staged on a copy and committed as one image write; the
//! in-memory settings only move once that write succeeded.

pub mod layout;

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::{SelfHealSettings, SwitchRateSettings};
use crate::pins::{self, DEFAULT_INTERRUPT_PIN, MAX_RELAYS, RelayConfig};
use crate::protocol::codes::ErrorCode;

/// Everything the controller persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub controller_id: u32,
    pub interrupt_pin: u8,
    pub relay_count: u8,
    pub self_heal: SelfHealSettings,
    pub switch_rate: SwitchRateSettings,
    pub relays: [RelayConfig; MAX_RELAYS],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            controller_id: 0,
            interrupt_pin: DEFAULT_INTERRUPT_PIN,
            relay_count: 0,
            self_heal: SelfHealSettings::default(),
            switch_rate: SwitchRateSettings::default(),
            relays: [RelayConfig::DISABLED; MAX_RELAYS],
        }
    }
}

impl Settings {
    pub fn relay_count(&self) -> usize {
        self.relay_count as usize
    }

    /// Configs of the active relay slots.
    pub fn active_relays(&self) -> &[RelayConfig] {
        &self.relays[..self.relay_count()]
    }

    /// Map a host-supplied index to a slot, rejecting inactive ones.
    pub fn check_index(&self, index: u8) -> Result<usize, ErrorCode> {
        let index = index as usize;
        if index < self.relay_count() {
            Ok(index)
        } else {
            Err(ErrorCode::RelayIndexOutOfRange)
        }
    }

    /// Decode and sanitise a raw storage image.
    fn from_image(image: &[u8; layout::TOTAL]) -> Self {
        let mut s = Self::default();

        let count = image[layout::RELAY_COUNT];
        if count as usize <= MAX_RELAYS {
            s.relay_count = count;
        } else {
            warn!("SETTINGS: stored relay count {} invalid, using 0", count);
        }

        s.controller_id = u32::from_be_bytes(field(image, layout::CONTROLLER_ID));

        let pin = image[layout::INTERRUPT_PIN];
        if pins::is_allowed_interrupt_pin(pin) {
            s.interrupt_pin = pin;
        } else {
            warn!("SETTINGS: stored interrupt pin {} invalid, using default", pin);
        }

        let heal = SelfHealSettings::from_bytes(field(image, layout::SELF_HEAL));
        if heal.validate().is_ok() {
            s.self_heal = heal;
        } else {
            warn!("SETTINGS: stored self-heal record invalid, using defaults");
        }

        let rate = SwitchRateSettings::from_bytes(field(image, layout::SWITCH_RATE));
        if rate.validate().is_ok() {
            s.switch_rate = rate;
        } else {
            warn!("SETTINGS: stored switch-rate record invalid, using defaults");
        }

        let count = s.relay_count();
        for (i, slot) in s.relays[..count].iter_mut().enumerate() {
            *slot = RelayConfig::from_bytes(field(image, layout::relay(i))).sanitized();
        }
        s
    }

    /// Encode into a raw storage image. Inactive slots are stored disabled.
    fn to_image(&self) -> [u8; layout::TOTAL] {
        let mut image = [0u8; layout::TOTAL];
        image[layout::RELAY_COUNT] = self.relay_count;
        put(&mut image, layout::CONTROLLER_ID, &self.controller_id.to_be_bytes());
        image[layout::INTERRUPT_PIN] = self.interrupt_pin;
        put(&mut image, layout::SELF_HEAL, &self.self_heal.to_bytes());
        put(&mut image, layout::SWITCH_RATE, &self.switch_rate.to_bytes());
        for (i, cfg) in self.relays.iter().enumerate() {
            put(&mut image, layout::relay(i), &cfg.to_bytes());
        }
        image
    }

    fn with_relays(&self, configs: &[RelayConfig]) -> Self {
        let mut next = self.clone();
        next.relays = [RelayConfig::DISABLED; MAX_RELAYS];
        next.relays[..configs.len()].copy_from_slice(configs);
        next.relay_count = configs.len() as u8;
        next
    }
}

fn put(image: &mut [u8; layout::TOTAL], offset: usize, bytes: &[u8]) {
    image[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn field<const N: usize>(image: &[u8; layout::TOTAL], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&image[offset..offset + N]);
    out
}

/// Count and pin checks for a relay table.
pub fn validate_relays(configs: &[RelayConfig]) -> Result<(), ErrorCode> {
    if configs.len() > MAX_RELAYS {
        return Err(ErrorCode::RelayCountOverflow);
    }
    match configs.iter().find_map(|c| c.forbidden_pin()) {
        Some(pin) => Err(ErrorCode::NotAllowedPin(pin)),
        None => Ok(()),
    }
}

pub fn validate_interrupt_pin(pin: u8) -> Result<(), ErrorCode> {
    if pins::is_allowed_interrupt_pin(pin) {
        Ok(())
    } else {
        Err(ErrorCode::InterruptPinNotAllowed)
    }
}

impl From<StorageError> for ErrorCode {
    fn from(_: StorageError) -> Self {
        Self::WriteFailed
    }
}

// ───────────────────────────────────────────────────────────────
// SettingsStore
// ───────────────────────────────────────────────────────────────

pub struct SettingsStore<S> {
    storage: S,
    settings: Settings,
}

impl<S: StoragePort> SettingsStore<S> {
    /// Read the image from `storage`, falling back to defaults on failure.
    pub fn load(storage: S) -> Self {
        let mut image = [0xFF; layout::TOTAL];
        let settings = match storage.read(0, &mut image) {
            Ok(()) => Settings::from_image(&image),
            Err(e) => {
                warn!("SETTINGS: load failed ({}), using defaults", e);
                Settings::default()
            }
        };
        info!(
            "SETTINGS: id=0x{:08X} relays={} int_pin={}",
            settings.controller_id, settings.relay_count, settings.interrupt_pin
        );
        Self { storage, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn set_controller_id(&mut self, id: u32) -> Result<(), ErrorCode> {
        self.storage.write(layout::CONTROLLER_ID, &id.to_be_bytes())?;
        self.settings.controller_id = id;
        Ok(())
    }

    pub fn set_interrupt_pin(&mut self, pin: u8) -> Result<(), ErrorCode> {
        validate_interrupt_pin(pin)?;
        self.storage.write(layout::INTERRUPT_PIN, &[pin])?;
        self.settings.interrupt_pin = pin;
        Ok(())
    }

    /// Replace the relay table. Returns the number of slots stored.
    pub fn set_relays(&mut self, configs: &[RelayConfig]) -> Result<u8, ErrorCode> {
        validate_relays(configs)?;
        self.commit(self.settings.with_relays(configs))?;
        info!("SETTINGS: {} relay(s) configured", configs.len());
        Ok(configs.len() as u8)
    }

    /// Replace id, interrupt pin and relay table together.
    pub fn set_all(&mut self, id: u32, interrupt_pin: u8, configs: &[RelayConfig]) -> Result<u8, ErrorCode> {
        validate_interrupt_pin(interrupt_pin)?;
        validate_relays(configs)?;
        let mut next = self.settings.with_relays(configs);
        next.controller_id = id;
        next.interrupt_pin = interrupt_pin;
        self.commit(next)?;
        info!("SETTINGS: id=0x{:08X} int_pin={} relays={}", id, interrupt_pin, configs.len());
        Ok(configs.len() as u8)
    }

    fn commit(&mut self, next: Settings) -> Result<(), ErrorCode> {
        self.storage.write(0, &next.to_image())?;
        self.settings = next;
        Ok(())
    }

    pub fn set_self_heal(&mut self, heal: SelfHealSettings) -> Result<(), ErrorCode> {
        heal.validate()?;
        self.storage.write(layout::SELF_HEAL, &heal.to_bytes())?;
        self.settings.self_heal = heal;
        Ok(())
    }

    pub fn set_switch_rate(&mut self, rate: SwitchRateSettings) -> Result<(), ErrorCode> {
        rate.validate()?;
        self.storage.write(layout::SWITCH_RATE, &rate.to_bytes())?;
        self.settings.switch_rate = rate;
        Ok(())
    }
}
