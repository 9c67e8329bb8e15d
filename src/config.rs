//! Tunable parameters.
//!
//! [`SelfHealSettings`] and [`SwitchRateSettings`] are persisted alongside
//! the relay assignments and can be changed by the host. [`RuntimeConfig`]
//! is fixed at build time and describes the serial link and loop timing.

use serde::{Deserialize, Serialize};

use crate::protocol::codes::ErrorCode;

// ---------------------------------------------------------------------------
// Self-heal
// ---------------------------------------------------------------------------

/// Mismatch recovery and control-input debounce tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfHealSettings {
    /// How long the set pin is held in the opposite state during a nudge.
    pub settle_delay_ms: u16,
    /// Nudges allowed per mismatch episode; 0 disables self-heal.
    pub max_attempts: u8,
    /// Minimum spacing between nudges, and after an explicit command.
    pub min_wait_secs: u8,
    /// Control input must be stable this long before it is acted on.
    pub debounce_ms: u16,
}

impl SelfHealSettings {
    /// Encoded size in bytes, on the wire and in storage.
    pub const SIZE: usize = 6;
    pub const MAX_SETTLE_DELAY_MS: u16 = 5_000;
    pub const MAX_DEBOUNCE_MS: u16 = 10_000;

    pub fn validate(&self) -> Result<(), ErrorCode> {
        if self.settle_delay_ms > Self::MAX_SETTLE_DELAY_MS
            || self.debounce_ms > Self::MAX_DEBOUNCE_MS
        {
            return Err(ErrorCode::ValueOutOfRange);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let settle = self.settle_delay_ms.to_be_bytes();
        let debounce = self.debounce_ms.to_be_bytes();
        [
            settle[0],
            settle[1],
            self.max_attempts,
            self.min_wait_secs,
            debounce[0],
            debounce[1],
        ]
    }

    pub fn from_bytes(b: [u8; Self::SIZE]) -> Self {
        Self {
            settle_delay_ms: u16::from_be_bytes([b[0], b[1]]),
            max_attempts: b[2],
            min_wait_secs: b[3],
            debounce_ms: u16::from_be_bytes([b[4], b[5]]),
        }
    }
}

impl Default for SelfHealSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 100,
            max_attempts: 3,
            min_wait_secs: 5,
            debounce_ms: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Switch-rate limiting
// ---------------------------------------------------------------------------

/// Caps how often the control input may flip a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRateSettings {
    /// Length of the sliding window in seconds.
    pub interval_secs: u16,
    /// Switches allowed per window; 0 means unlimited.
    pub max_switches: u8,
}

impl SwitchRateSettings {
    /// Encoded size in bytes, on the wire and in storage.
    pub const SIZE: usize = 3;
    /// Depth of the per-relay switch history ring.
    pub const MAX_SWITCHES: u8 = 20;

    pub fn validate(&self) -> Result<(), ErrorCode> {
        if self.interval_secs == 0 || self.max_switches > Self::MAX_SWITCHES {
            return Err(ErrorCode::ValueOutOfRange);
        }
        Ok(())
    }

    pub fn is_limited(&self) -> bool {
        self.max_switches > 0
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let interval = self.interval_secs.to_be_bytes();
        [interval[0], interval[1], self.max_switches]
    }

    pub fn from_bytes(b: [u8; Self::SIZE]) -> Self {
        Self {
            interval_secs: u16::from_be_bytes([b[0], b[1]]),
            max_switches: b[2],
        }
    }
}

impl Default for SwitchRateSettings {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            max_switches: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Build-time link and loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// UART baud rate of the host link.
    pub uart_baud: u32,
    /// Silence that terminates an inbound command.
    pub quiet_interval_ms: u32,
    /// Spacing of time-sync requests while no host time is known.
    pub time_sync_request_interval_ms: u32,
    /// Idle loop sleep between passes.
    pub loop_interval_ms: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            uart_baud: 115_200,
            quiet_interval_ms: 50,
            time_sync_request_interval_ms: 10_000,
            loop_interval_ms: 1,
        }
    }
}
