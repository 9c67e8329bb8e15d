//! Transport abstraction — the byte stream to the host.
//!
//! Concrete implementations:
//! - UART (see [`crate::adapters::uart`])
//! - the simulated UART and in-memory pipes used by tests and fuzzing
//!
//! Framing relies on the receive-buffer fill level, so unlike a plain
//! reader the transport must report how many bytes are waiting.

/// Byte-oriented transport channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns 0 if no data is available (non-blocking).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data` to the transport.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Number of received bytes waiting to be read.
    fn available(&self) -> usize;
}

/// Discard everything currently buffered on the receive side.
pub fn drain<T: Transport>(transport: &mut T) {
    let mut scratch = [0u8; 32];
    while transport.available() > 0 {
        match transport.read(&mut scratch) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

/// Write all of `data`, stopping early only if the transport accepts nothing.
pub fn write_all<T: Transport>(transport: &mut T, mut data: &[u8]) -> Result<(), T::Error> {
    while !data.is_empty() {
        match transport.write(data)? {
            0 => break,
            n => data = &data[n.min(data.len())..],
        }
    }
    transport.flush()
}
