//! Pin-role encoding for relay slots.
//!
//! Every relay slot is described by three role bytes (set, monitor, control).
//! Each byte packs a pin number and flags:
//!
//! ```text
//!  bit  7   6      5        4..0
//!      ─┬─ ─────── ──────── ──────
//!       │  push    inversed pin (31 = disabled)
//!       └ reserved
//! ```
//!
//! The push flag is only meaningful on the control role.
//!
//! Reserved pins are those the ESP32-S3 needs for itself: GPIO0 is a boot
//! strapping pin, GPIO19/20 carry native USB and GPIO26–30 are wired to the
//! SPI flash/PSRAM.

use serde::{Deserialize, Serialize};

/// Hardware maximum number of relay slots.
pub const MAX_RELAYS: usize = 16;

/// Pin number that marks a role as not wired.
pub const DISABLED_PIN: u8 = 31;

/// GPIOs that may never be assigned to a relay role.
pub const FORBIDDEN_PINS: [u8; 8] = [0, 19, 20, 26, 27, 28, 29, 30];

/// GPIOs that may raise the shared control-change interrupt.
pub const ALLOWED_INTERRUPT_PINS: [u8; 4] = [2, 3, 4, 5];

/// Interrupt pin used when none (or an invalid one) is stored.
pub const DEFAULT_INTERRUPT_PIN: u8 = 2;

const PIN_MASK: u8 = 0b0001_1111;
const INVERSED_BIT: u8 = 1 << 5;
const PUSH_BIT: u8 = 1 << 6;

pub fn is_forbidden_pin(pin: u8) -> bool {
    FORBIDDEN_PINS.contains(&pin)
}

pub fn is_allowed_interrupt_pin(pin: u8) -> bool {
    ALLOWED_INTERRUPT_PINS.contains(&pin)
}

// ---------------------------------------------------------------------------
// PinRole
// ---------------------------------------------------------------------------

/// One role byte (see module docs for the bit layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRole(u8);

impl PinRole {
    pub const DISABLED: Self = Self(DISABLED_PIN);

    pub const fn new(pin: u8, inversed: bool) -> Self {
        let mut raw = pin & PIN_MASK;
        if inversed {
            raw |= INVERSED_BIT;
        }
        Self(raw)
    }

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn pin(self) -> u8 {
        self.0 & PIN_MASK
    }

    pub const fn is_enabled(self) -> bool {
        self.pin() != DISABLED_PIN
    }

    pub const fn is_inversed(self) -> bool {
        self.0 & INVERSED_BIT != 0
    }

    pub const fn is_push(self) -> bool {
        self.0 & PUSH_BIT != 0
    }

    #[must_use]
    pub const fn with_push(self, push: bool) -> Self {
        if push {
            Self(self.0 | PUSH_BIT)
        } else {
            Self(self.0 & !PUSH_BIT)
        }
    }

    /// Enabled and pointing at a reserved GPIO.
    pub fn is_forbidden(self) -> bool {
        self.is_enabled() && is_forbidden_pin(self.pin())
    }

    /// Physical level that represents the logical `level` for this role.
    pub const fn physical(self, level: bool) -> bool {
        level ^ self.is_inversed()
    }
}

impl Default for PinRole {
    fn default() -> Self {
        Self::DISABLED
    }
}

// ---------------------------------------------------------------------------
// RelayConfig
// ---------------------------------------------------------------------------

/// Pin assignment for one relay slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    pub set: PinRole,
    pub monitor: PinRole,
    pub control: PinRole,
}

impl RelayConfig {
    /// Encoded size in bytes, on the wire and in storage.
    pub const SIZE: usize = 3;

    pub const DISABLED: Self = Self {
        set: PinRole::DISABLED,
        monitor: PinRole::DISABLED,
        control: PinRole::DISABLED,
    };

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            set: PinRole::from_raw(bytes[0]),
            monitor: PinRole::from_raw(bytes[1]),
            control: PinRole::from_raw(bytes[2]),
        }
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [self.set.raw(), self.monitor.raw(), self.control.raw()]
    }

    /// Output toggles on each press instead of following the level.
    pub const fn is_push_mode(self) -> bool {
        self.control.is_push()
    }

    /// The first reserved pin named by any role, if any.
    pub fn forbidden_pin(self) -> Option<u8> {
        [self.set, self.monitor, self.control]
            .into_iter()
            .find(|role| role.is_forbidden())
            .map(PinRole::pin)
    }

    /// Copy with any role that names a reserved pin switched off.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let clean = |role: PinRole| if role.is_forbidden() { PinRole::DISABLED } else { role };
        Self {
            set: clean(self.set),
            monitor: clean(self.monitor),
            control: clean(self.control),
        }
    }
}
