//! Mock board, link and storage for integration tests.
//!
//! Records every pin write and delay so tests can assert on the full
//! actuation history without touching real GPIO registers, and wraps a
//! [`RelayNode`] in a [`Harness`] that drives it pass by pass on a
//! simulated clock.

use std::collections::{HashMap, VecDeque};

use embedded_hal::delay::DelayNs;
use relayctl::app::ports::{PinMode, PinPort, StorageError, StoragePort};
use relayctl::app::service::RelayNode;
use relayctl::config::RuntimeConfig;
use relayctl::control_line::ControlLine;
use relayctl::protocol::transport::Transport;
use relayctl::settings::layout;

// ── MockBoard ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBoard {
    pub levels: HashMap<u8, bool>,
    pub modes: HashMap<u8, PinMode>,
    pub writes: Vec<(u8, bool)>,
    pub delays_ms: Vec<u32>,
    pub interrupt_pin: Option<u8>,
    pub line: ControlLine,
    /// Time spent in each idle wait.
    pub waits_ms: Vec<u32>,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive an input. Changes on the interrupt pin reach the control line
    /// the way the ISR would deliver them.
    pub fn set(&mut self, pin: u8, level: bool) {
        self.levels.insert(pin, level);
        if self.interrupt_pin == Some(pin) {
            self.line.on_edge(level);
        }
    }

    pub fn level(&self, pin: u8) -> bool {
        self.levels.get(&pin).copied().unwrap_or(false)
    }

    pub fn writes_to(&self, pin: u8) -> Vec<bool> {
        self.writes
            .iter()
            .filter(|(p, _)| *p == pin)
            .map(|(_, level)| *level)
            .collect()
    }
}

impl PinPort for MockBoard {
    fn configure(&mut self, pin: u8, mode: PinMode) {
        self.modes.insert(pin, mode);
    }

    fn read_digital(&mut self, pin: u8) -> bool {
        self.level(pin)
    }

    fn write_digital(&mut self, pin: u8, level: bool) {
        self.levels.insert(pin, level);
        self.writes.push((pin, level));
    }

    fn attach_control_interrupt(&mut self, pin: u8) {
        self.line.arm(pin, self.level(pin));
        self.interrupt_pin = Some(pin);
    }

    fn wait_control_edge(&mut self, timeout_ms: u32) -> bool {
        let woken = self.line.is_pending();
        self.waits_ms.push(if woken { 0 } else { timeout_ms });
        woken
    }

    fn take_control_edge(&mut self) -> bool {
        self.line.take_pending()
    }
}

impl DelayNs for MockBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.delays_ms.push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
    }
}

// ── MockLink ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLink {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

impl MockLink {
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }
}

impl Transport for MockLink {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        self.tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn available(&self) -> usize {
        self.rx.len()
    }
}

// ── MemStorage ────────────────────────────────────────────────

#[derive(Clone)]
pub struct MemStorage {
    pub bytes: [u8; layout::TOTAL],
    pub fail_writes: bool,
}

impl MemStorage {
    pub fn blank() -> Self {
        Self {
            bytes: [0xFF; layout::TOTAL],
            fail_writes: false,
        }
    }
}

impl StoragePort for MemStorage {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let src = self
            .bytes
            .get(offset..offset + buf.len())
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.bytes
            .get_mut(offset..offset + data.len())
            .ok_or(StorageError::OutOfBounds)?
            .copy_from_slice(data);
        Ok(())
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness {
    pub node: RelayNode<MemStorage>,
    pub board: MockBoard,
    pub link: MockLink,
    pub now: u32,
}

#[allow(dead_code)]
impl Harness {
    /// Started node with the boot preamble and first time-sync request
    /// already consumed.
    pub fn new() -> Self {
        let mut h = Self::boot(MemStorage::blank(), MockBoard::new());
        h.tick();
        h.link.take_output();
        h
    }

    /// Started node, nothing consumed.
    pub fn boot(storage: MemStorage, mut board: MockBoard) -> Self {
        let mut node = RelayNode::new(storage, RuntimeConfig::default(), 0);
        let mut link = MockLink::default();
        node.start(&mut board, &mut link, 0);
        Self {
            node,
            board,
            link,
            now: 0,
        }
    }

    pub fn tick(&mut self) {
        self.node.tick(&mut self.board, &mut self.link, self.now);
    }

    pub fn advance(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
        self.tick();
    }

    /// One idle-loop iteration: a pass, then the idle wait. The simulated
    /// clock moves by however long the wait lasted.
    pub fn cycle(&mut self) {
        self.tick();
        self.node.idle(&mut self.board);
        let waited = self.board.waits_ms.last().copied().unwrap_or(0);
        self.now = self.now.wrapping_add(waited);
    }

    /// Tick every `step` ms until `duration` has elapsed.
    pub fn run_for(&mut self, duration: u32, step: u32) {
        let mut elapsed = 0;
        while elapsed < duration {
            self.advance(step);
            elapsed += step;
        }
    }

    /// Send one command and return everything written while it was
    /// framed and handled.
    pub fn exchange(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.link.inject(bytes);
        self.tick();
        let quiet = self.node.config().quiet_interval_ms;
        self.advance(quiet + 1);
        self.link.take_output()
    }

    /// Install a relay table through the protocol.
    pub fn configure(&mut self, relays: &[[u8; 3]]) {
        let mut cmd = vec![0, 2, 1, relays.len() as u8];
        for r in relays {
            cmd.extend_from_slice(r);
        }
        let out = self.exchange(&cmd);
        assert!(
            out.ends_with(&[0, 3, 1, 0x80 | relays.len() as u8]),
            "relay table refused: {:?}",
            out
        );
    }
}

/// `true` if `needle` appears contiguously in `haystack`.
#[allow(dead_code)]
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
