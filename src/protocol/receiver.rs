//! Silence-delimited command framing.
//!
//! Commands carry no length prefix. The receiver samples the transport's
//! fill level once per idle pass and treats a command as complete once the
//! level has stopped growing for longer than the quiet interval:
//!
//! ```text
//!  available:  0  3  7  7  7 ... 7        → ready once now − t(7) > quiet
//!                    └─ last growth t(7)
//! ```
//!
//! Framing failures drain whatever is still buffered so the next command
//! starts from a clean stream.

use log::warn;

use super::codes::{ErrorCode, FRAME_MARKER, Verb};
use super::transport::{Transport, drain};

/// Bytes accepted after the leading marker.
pub const COMMAND_CAPACITY: usize = 64;

/// Outcome of a completed read.
#[derive(Debug, PartialEq, Eq)]
pub enum Incoming<'a> {
    /// A well-formed command.
    Command {
        verb: Verb,
        kind: u8,
        payload: &'a [u8],
    },
    /// Too short or an unknown verb; the raw bytes are echoed to the host.
    Unrecognized(&'a [u8]),
    /// Framing failure that is reported without an echo.
    Rejected(ErrorCode),
}

pub struct FrameReceiver {
    quiet_ms: u32,
    last_size: usize,
    last_change_ms: Option<u32>,
    buf: [u8; COMMAND_CAPACITY],
}

impl FrameReceiver {
    pub const fn new(quiet_ms: u32) -> Self {
        Self {
            quiet_ms,
            last_size: 0,
            last_change_ms: None,
            buf: [0; COMMAND_CAPACITY],
        }
    }

    /// Sample the transport; returns a frame once one is complete.
    pub fn poll<T: Transport>(&mut self, transport: &mut T, now_ms: u32) -> Option<Incoming<'_>> {
        let available = transport.available();
        if available == 0 {
            self.reset();
            return None;
        }
        if available != self.last_size {
            self.last_size = available;
            self.last_change_ms = Some(now_ms);
            return None;
        }
        let changed_at = self.last_change_ms?;
        if now_ms.wrapping_sub(changed_at) <= self.quiet_ms {
            return None;
        }
        self.reset();
        Some(self.read_frame(transport, available))
    }

    /// Forget any partially observed arrival.
    pub fn reset(&mut self) {
        self.last_size = 0;
        self.last_change_ms = None;
    }

    fn read_frame<T: Transport>(&mut self, transport: &mut T, available: usize) -> Incoming<'_> {
        let mut marker = [0u8; 1];
        match transport.read(&mut marker) {
            Ok(1) if marker[0] == FRAME_MARKER => {}
            Ok(1) => {
                drain(transport);
                warn!("RX: wrong start byte 0x{:02X}", marker[0]);
                return Incoming::Rejected(ErrorCode::InstructionWrongStart);
            }
            other => {
                // No start byte could be read at all; still answered as a
                // bad start so the host gets a reply.
                drain(transport);
                warn!("RX: start byte unreadable ({:?})", other);
                return Incoming::Rejected(ErrorCode::InstructionWrongStart);
            }
        }

        let len = available - 1;
        if len == 0 {
            return Incoming::Rejected(ErrorCode::CommandEmpty);
        }
        if len > COMMAND_CAPACITY {
            drain(transport);
            warn!("RX: command of {} bytes exceeds buffer", len);
            return Incoming::Rejected(ErrorCode::CommandSizeOverflow);
        }

        let mut filled = 0;
        while filled < len {
            match transport.read(&mut self.buf[filled..len]) {
                Ok(0) | Err(_) => break,
                Ok(n) => filled += n,
            }
        }
        let raw = &self.buf[..filled];

        match raw {
            [verb, kind, payload @ ..] => match Verb::try_from(*verb) {
                Ok(verb) => Incoming::Command {
                    verb,
                    kind: *kind,
                    payload,
                },
                Err(_) => Incoming::Unrecognized(raw),
            },
            _ => Incoming::Unrecognized(raw),
        }
    }
}
