//! Payload decoding and frame encoding.
//!
//! All multi-byte integers are big-endian with a fixed width. Reads check
//! the remaining length first and report
//! [`ErrorCode::RequestDataNoValue`] instead of running past the buffer.

use crate::app::signals::Signal;

use super::codes::{DataKind, ErrorCode, FRAME_MARKER, FrameTag, INFORMATIONAL_THRESHOLD};

/// Largest frame the controller emits (an event log drain with 32 records).
pub const MAX_FRAME_SIZE: usize = 192;

// ---------------------------------------------------------------------------
// PayloadReader
// ---------------------------------------------------------------------------

/// Cursor over a command payload.
pub struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ErrorCode> {
        if self.remaining() < len {
            return Err(ErrorCode::RequestDataNoValue);
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], ErrorCode> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, ErrorCode> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ErrorCode> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, ErrorCode> {
        Ok(u32::from_be_bytes(self.array()?))
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// An outbound frame under construction.
#[derive(Debug, Clone)]
pub struct Frame {
    buf: heapless::Vec<u8, MAX_FRAME_SIZE>,
}

impl Frame {
    fn with_header(tag: FrameTag, kind: u8) -> Self {
        let mut buf = heapless::Vec::new();
        // Capacity is far above the three header bytes.
        let _ = buf.extend_from_slice(&[FRAME_MARKER, tag as u8, kind]);
        Self { buf }
    }

    pub fn response(kind: DataKind) -> Self {
        Self::with_header(FrameTag::Response, kind.code())
    }

    pub fn signal(kind: DataKind) -> Self {
        Self::with_header(FrameTag::Signal, kind.code())
    }

    /// Plain success without a status byte.
    pub fn success(kind: u8) -> Self {
        Self::with_header(FrameTag::Success, kind)
    }

    /// Error frame for codes below the informational threshold, success
    /// frame carrying the code otherwise.
    pub fn status(kind: u8, code: u8) -> Self {
        let tag = if code < INFORMATIONAL_THRESHOLD {
            FrameTag::Error
        } else {
            FrameTag::Success
        };
        let mut frame = Self::with_header(tag, kind);
        let _ = frame.buf.push(code);
        frame
    }

    pub fn error(kind: u8, error: ErrorCode) -> Self {
        Self::status(kind, error.code())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<(), ErrorCode> {
        self.buf.push(v).map_err(|_| ErrorCode::CommandSizeOverflow)
    }

    pub fn put_bytes(&mut self, v: &[u8]) -> Result<(), ErrorCode> {
        self.buf
            .extend_from_slice(v)
            .map_err(|_| ErrorCode::CommandSizeOverflow)
    }

    pub fn put_u16(&mut self, v: u16) -> Result<(), ErrorCode> {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<(), ErrorCode> {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn put_u64(&mut self, v: u64) -> Result<(), ErrorCode> {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

// ---------------------------------------------------------------------------
// Packing helpers
// ---------------------------------------------------------------------------

/// `[index | value << 4]`, the per-relay attribute byte.
pub const fn pack_indexed(index: u8, value: u8) -> u8 {
    (value << 4) | (index & 0x0F)
}

/// Split a per-relay attribute byte into `(index, value)`.
pub const fn unpack_indexed(byte: u8) -> (u8, u8) {
    (byte & 0x0F, byte >> 4)
}

/// Pack one nibble per relay, even index in the low nibble.
pub fn pack_nibbles(frame: &mut Frame, nibbles: impl IntoIterator<Item = u8>) -> Result<(), ErrorCode> {
    let mut pending: Option<u8> = None;
    for n in nibbles {
        match pending.take() {
            None => pending = Some(n & 0x0F),
            Some(low) => frame.put_u8(low | (n << 4))?,
        }
    }
    if let Some(low) = pending {
        frame.put_u8(low)?;
    }
    Ok(())
}

/// Two bits per relay, relay 0 in the least significant bits.
pub fn crumb(bytes: &[u8], index: usize) -> u8 {
    (bytes[index / 4] >> ((index % 4) * 2)) & 0b11
}

/// Serialize a signal into its frame.
pub fn encode_signal(signal: &Signal) -> Result<Frame, ErrorCode> {
    let mut frame = Frame::signal(signal.kind());
    match *signal {
        Signal::RelayStateChanged {
            index,
            on,
            external,
            timestamp,
        } => {
            frame.put_u8(pack_indexed(index, u8::from(on) | (u8::from(external) << 1)))?;
            frame.put_u32(timestamp)?;
        }
        Signal::MonitorStateChanged {
            index,
            level,
            timestamp,
        }
        | Signal::ControlStateChanged {
            index,
            level,
            timestamp,
        } => {
            frame.put_u8(pack_indexed(index, u8::from(level)))?;
            frame.put_u32(timestamp)?;
        }
        Signal::SelfHealAttempt {
            index,
            monitor,
            attempt,
            timestamp,
        } => {
            frame.put_u8(pack_indexed(index, u8::from(monitor)))?;
            frame.put_u8(attempt)?;
            frame.put_u32(timestamp)?;
        }
        Signal::TimeSyncRequest => {}
    }
    Ok(frame)
}
