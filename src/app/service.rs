//! Node service — the hexagonal core.
//!
//! [`RelayNode`] owns the settings store, the relay state machine, the
//! time base and the command receiver. It exposes a hardware-agnostic
//! API. All I/O flows through port traits injected at call sites, so the
//! whole node is testable with mock adapters.
//!
//! ```text
//!   PinPort ──▶ ┌──────────────────────────┐ ──▶ Transport
//!               │         RelayNode         │      (signals, responses)
//!   DelayNs ◀── │ Relays · Settings · Time  │ ◀── Transport
//!               └──────────────────────────┘      (commands)
//! ```

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::diagnostics::CycleStats;
use crate::protocol::codec::{Frame, encode_signal};
use crate::protocol::codes::ErrorCode;
use crate::protocol::dispatch::{Context, dispatch};
use crate::protocol::receiver::{FrameReceiver, Incoming};
use crate::protocol::transport::{Transport, write_all};
use crate::relay::{Now, RelayController};
use crate::settings::{Settings, SettingsStore};
use crate::timesync::TimeSync;

use super::ports::{PinPort, SignalSink, StoragePort};
use super::signals::Signal;

/// Written once at start so the host can resynchronise on a fresh stream.
pub const BOOT_PREAMBLE: [u8; 8] = [0; 8];

/// Kind byte used for framing errors, which have no command kind.
const FRAMING_KIND: u8 = 0;

// ───────────────────────────────────────────────────────────────
// LinkSink
// ───────────────────────────────────────────────────────────────

/// [`SignalSink`] that serializes signals straight onto the host link.
pub struct LinkSink<'a, T> {
    transport: &'a mut T,
}

impl<'a, T: Transport> LinkSink<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }

    pub fn send(&mut self, bytes: &[u8]) {
        if let Err(e) = write_all(self.transport, bytes) {
            warn!("LINK: write failed: {:?}", e);
        }
    }
}

impl<T: Transport> SignalSink for LinkSink<'_, T> {
    fn emit(&mut self, signal: &Signal) {
        match encode_signal(signal) {
            Ok(frame) => self.send(frame.as_bytes()),
            Err(e) => warn!("LINK: cannot encode {:?}: {}", signal.kind(), e),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// RelayNode
// ───────────────────────────────────────────────────────────────

pub struct RelayNode<S> {
    store: SettingsStore<S>,
    relays: RelayController,
    time: TimeSync,
    receiver: FrameReceiver,
    stats: CycleStats,
    config: RuntimeConfig,
}

impl<S: StoragePort> RelayNode<S> {
    /// Load settings from `storage` and build the runtime state.
    ///
    /// Does **not** touch pins or the link. Call [`start`](Self::start) next.
    pub fn new(storage: S, config: RuntimeConfig, now_ms: u32) -> Self {
        let store = SettingsStore::load(storage);
        let relays = RelayController::new(store.settings(), now_ms);
        Self {
            store,
            relays,
            time: TimeSync::new(config.time_sync_request_interval_ms),
            receiver: FrameReceiver::new(config.quiet_interval_ms),
            stats: CycleStats::new(),
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Configure relay pins and announce the node on the link.
    pub fn start(&mut self, hw: &mut impl PinPort, transport: &mut impl Transport, now_ms: u32) {
        self.relays.configure(self.store.settings(), hw, now_ms);
        LinkSink::new(transport).send(&BOOT_PREAMBLE);
        info!(
            "NODE: started, id=0x{:08X}, {} relay(s)",
            self.store.settings().controller_id,
            self.store.settings().relay_count
        );
    }

    // ── Per-pass orchestration ────────────────────────────────

    /// One idle-loop pass: control interrupt → time-sync request →
    /// reconciliation → at most one command.
    pub fn tick(
        &mut self,
        hw: &mut (impl PinPort + DelayNs),
        transport: &mut impl Transport,
        now_ms: u32,
    ) {
        self.stats.record(now_ms);

        if hw.take_control_edge() {
            debug!("NODE: pass triggered by control edge");
        }

        let mut link = LinkSink::new(transport);
        if self.time.poll_request(now_ms) {
            link.emit(&Signal::TimeSyncRequest);
        }

        let now = Now {
            ms: now_ms,
            epoch: self.time.remote_now(now_ms),
        };
        self.relays
            .reconcile(self.store.settings(), hw, now, &mut link);

        self.poll_command(hw, transport, now_ms);
    }

    /// Wait for the next pass: one loop interval, cut short by a control
    /// edge. Returns `true` if an edge ended the wait.
    pub fn idle(&self, hw: &mut impl PinPort) -> bool {
        hw.wait_control_edge(self.config.loop_interval_ms)
    }

    fn poll_command(
        &mut self,
        hw: &mut (impl PinPort + DelayNs),
        transport: &mut impl Transport,
        now_ms: u32,
    ) {
        let Some(incoming) = self.receiver.poll(transport, now_ms) else {
            return;
        };
        let mut link = LinkSink::new(transport);

        match incoming {
            Incoming::Command {
                verb,
                kind,
                payload,
            } => {
                let mut ctx = Context {
                    store: &mut self.store,
                    relays: &mut self.relays,
                    time: &mut self.time,
                    stats: &self.stats,
                    hw,
                    sink: &mut link,
                    now_ms,
                };
                let frame = dispatch(&mut ctx, verb, kind, payload);
                link.send(frame.as_bytes());
            }
            Incoming::Unrecognized(raw) => {
                warn!("NODE: unrecognized instruction ({} bytes)", raw.len());
                link.send(raw);
                link.send(Frame::error(FRAMING_KIND, ErrorCode::InstructionUnrecognized).as_bytes());
            }
            Incoming::Rejected(code) => {
                warn!("NODE: frame rejected: {}", code);
                link.send(Frame::error(FRAMING_KIND, code).as_bytes());
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        self.store.settings()
    }

    pub fn store(&self) -> &SettingsStore<S> {
        &self.store
    }

    pub fn relays(&self) -> &RelayController {
        &self.relays
    }

    pub fn time(&self) -> &TimeSync {
        &self.time
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
