//! Byte offsets of the persisted settings image.
//!
//! ```text
//! 0   relay count          u8
//! 1   controller id        u32 BE
//! 5   interrupt pin        u8
//! 6   self-heal record     6 bytes
//! 12  switch-rate record   3 bytes
//! 15  relay records        3 bytes × MAX_RELAYS
//! ```

use crate::config::{SelfHealSettings, SwitchRateSettings};
use crate::pins::{MAX_RELAYS, RelayConfig};

pub const RELAY_COUNT: usize = 0;
pub const CONTROLLER_ID: usize = RELAY_COUNT + 1;
pub const INTERRUPT_PIN: usize = CONTROLLER_ID + 4;
pub const SELF_HEAL: usize = INTERRUPT_PIN + 1;
pub const SWITCH_RATE: usize = SELF_HEAL + SelfHealSettings::SIZE;
pub const RELAYS: usize = SWITCH_RATE + SwitchRateSettings::SIZE;

/// Total image size.
pub const TOTAL: usize = relay(MAX_RELAYS);

pub const fn relay(index: usize) -> usize {
    RELAYS + index * RelayConfig::SIZE
}
