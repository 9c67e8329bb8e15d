//! Port traits — the hexagonal boundary between relay logic and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RelayNode (domain)
//! ```
//!
//! Driven adapters (GPIO, settings storage, the signal path) implement
//! these traits. The [`RelayNode`](super::service::RelayNode) and the
//! [`RelayController`](crate::relay::RelayController) consume them via
//! generics, so the domain core never touches hardware directly.

use super::signals::Signal;

// ───────────────────────────────────────────────────────────────
// Pin port (driven adapter: domain ↔ GPIO)
// ───────────────────────────────────────────────────────────────

/// Electrical configuration requested for a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    InputPullUp,
    Output,
}

/// Raw digital I/O. Levels are physical; polarity inversion is applied by
/// the caller from the pin's [`PinRole`](crate::pins::PinRole).
pub trait PinPort {
    fn configure(&mut self, pin: u8, mode: PinMode);

    fn read_digital(&mut self, pin: u8) -> bool;

    fn write_digital(&mut self, pin: u8, level: bool);

    /// Route any-edge interrupts on `pin` to the adapter's
    /// [`ControlLine`](crate::control_line::ControlLine), replacing a
    /// previously attached pin.
    fn attach_control_interrupt(&mut self, pin: u8);

    /// Block for up to `timeout_ms`. Returns `true` as soon as a control
    /// edge is pending, without consuming it.
    fn wait_control_edge(&mut self, timeout_ms: u32) -> bool;

    /// Consume the pending control edge.
    fn take_control_edge(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / EEPROM)
// ───────────────────────────────────────────────────────────────

/// Byte-addressable persistent storage holding the settings image.
///
/// Never-written bytes read back as `0xFF`, like erased flash.
pub trait StoragePort {
    /// Fill `buf` from `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` at `offset` and commit it.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Signal sink (driven adapter: domain → host link)
// ───────────────────────────────────────────────────────────────

/// Unsolicited notifications leave the state machine through this port.
pub trait SignalSink {
    fn emit(&mut self, signal: &Signal);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Access falls outside the settings image.
    OutOfBounds,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "access out of bounds"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
