//! Control-change interrupt hand-off.
//!
//! The GPIO ISR only records the line level and raises a pending flag. The
//! idle wait returns early while the flag is up, and the pass that follows
//! consumes it and runs the same reconciliation as every other cycle. Both
//! sides touch the shared state inside a `critical_section`, so an edge
//! landing between the loop's read and clear of the flag is never lost.
//!
//! Each pin adapter owns its own line; there is no process-wide instance.

use core::cell::Cell;

use critical_section::Mutex;

#[derive(Debug, Clone, Copy)]
struct LineState {
    pin: u8,
    level: bool,
    pending: bool,
}

pub struct ControlLine {
    state: Mutex<Cell<LineState>>,
}

impl ControlLine {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(LineState {
                pin: 0,
                level: false,
                pending: false,
            })),
        }
    }

    /// ISR entry point. Returns `true` if the level differs from the last
    /// one seen and a pass was requested.
    pub fn on_edge(&self, level: bool) -> bool {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut s = cell.get();
            if s.level == level {
                return false;
            }
            s.level = level;
            s.pending = true;
            cell.set(s);
            true
        })
    }

    /// Consume the pending flag.
    pub fn take_pending(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut s = cell.get();
            let pending = s.pending;
            s.pending = false;
            cell.set(s);
            pending
        })
    }

    /// Peek without consuming.
    pub fn is_pending(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).get().pending)
    }

    pub fn level(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).get().level)
    }

    /// Pin the interrupt is attached to.
    pub fn pin(&self) -> u8 {
        critical_section::with(|cs| self.state.borrow(cs).get().pin)
    }

    /// Record a (re)attached pin and its current level, dropping any edge
    /// seen on the previous one.
    pub fn arm(&self, pin: u8, level: bool) {
        critical_section::with(|cs| {
            self.state.borrow(cs).set(LineState {
                pin,
                level,
                pending: false,
            });
        });
    }
}

impl Default for ControlLine {
    fn default() -> Self {
        Self::new()
    }
}
