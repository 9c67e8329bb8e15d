//! Unified error types for the relay controller firmware.
//!
//! Protocol handlers report [`ErrorCode`](crate::protocol::codes::ErrorCode)
//! values that go straight onto the wire. Everything that happens outside a
//! single command (peripheral bring-up, storage, the serial link) funnels
//! into [`Error`] so the entry point can propagate it with `?`.

use core::fmt;

use crate::app::ports::StorageError;
use crate::protocol::codes::ErrorCode;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Settings storage could not be read or written.
    Storage(StorageError),
    /// A command was rejected with a wire-level code.
    Protocol(ErrorCode),
    /// The serial link failed.
    Transport(TransportError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ErrorCode> for Error {
    fn from(e: ErrorCode) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// UART driver install or configuration failed (ESP-IDF return code).
    DriverInstall(i32),
    /// A read from the receive FIFO failed.
    ReadFailed,
    /// A write to the transmit FIFO failed or was short.
    WriteFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DriverInstall(rc) => write!(f, "UART driver install failed (rc={rc})"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::WriteFailed => write!(f, "write failed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
