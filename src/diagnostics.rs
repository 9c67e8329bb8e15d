//! Runtime diagnostics.
//!
//! [`CycleStats`] tracks how long each idle-loop pass takes so the host can
//! spot passes stalled by self-heal settle delays or slow storage commits.

/// Idle-loop pass duration statistics, in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    last_ms: Option<u32>,
    min_ms: u32,
    max_ms: u32,
    total_ms: u64,
    cycles: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            last_ms: None,
            min_ms: 0,
            max_ms: 0,
            total_ms: 0,
            cycles: 0,
        }
    }

    /// Mark the start of a pass; the time since the previous mark is recorded.
    pub fn record(&mut self, now_ms: u32) {
        if let Some(last) = self.last_ms {
            let elapsed = now_ms.wrapping_sub(last);
            if self.cycles == 0 {
                self.min_ms = elapsed;
                self.max_ms = elapsed;
            } else {
                self.min_ms = self.min_ms.min(elapsed);
                self.max_ms = self.max_ms.max(elapsed);
            }
            self.total_ms += u64::from(elapsed);
            self.cycles += 1;
        }
        self.last_ms = Some(now_ms);
    }

    pub fn min_ms(&self) -> u32 {
        self.min_ms
    }

    pub fn max_ms(&self) -> u32 {
        self.max_ms
    }

    pub fn average_ms(&self) -> u32 {
        if self.cycles == 0 {
            0
        } else {
            (self.total_ms / self.cycles) as u32
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
