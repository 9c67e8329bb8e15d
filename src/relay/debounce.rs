//! Control-input debounce.
//!
//! The window restarts on every level change, so an input only counts once
//! it has been stable for the full delay. This waits for contact bounce to
//! die down rather than timing out from the first edge.

/// Debounce record for one control input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Debounce {
    waiting: bool,
    level: bool,
    last_change_ms: u32,
    wait_start_ms: u32,
}

impl Debounce {
    const WAITING_BIT: u8 = 1 << 0;
    const LEVEL_BIT: u8 = 1 << 1;

    /// Feed the current input `level`. `settled` is the last level acted on.
    ///
    /// Returns the new level once it has been stable for `delay_ms` and
    /// differs from `settled`.
    pub fn poll(&mut self, level: bool, settled: bool, now_ms: u32, delay_ms: u16) -> Option<bool> {
        if !self.waiting {
            if level == settled {
                return None;
            }
            self.waiting = true;
            self.level = level;
            self.wait_start_ms = now_ms;
            self.last_change_ms = now_ms;
        } else if level != self.level {
            self.level = level;
            self.last_change_ms = now_ms;
        }

        if now_ms.wrapping_sub(self.last_change_ms) < u32::from(delay_ms) {
            return None;
        }
        self.waiting = false;
        (self.level != settled).then_some(self.level)
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// When the current wait began.
    pub fn wait_start_ms(&self) -> u32 {
        self.wait_start_ms
    }

    /// `bit0` waiting, `bit1` tracked level.
    pub fn flags(&self) -> u8 {
        let mut f = 0;
        if self.waiting {
            f |= Self::WAITING_BIT;
        }
        if self.level {
            f |= Self::LEVEL_BIT;
        }
        f
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
