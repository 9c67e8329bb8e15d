//! Bounded log of relay state changes, drained by the host.

use heapless::Deque;
use log::warn;

use crate::protocol::codec::pack_indexed;

pub const EVENT_LOG_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub index: u8,
    pub on: bool,
    /// Caused by the control input rather than a host command.
    pub external: bool,
    /// Remote-epoch seconds.
    pub timestamp: u32,
}

impl EventRecord {
    /// `[index | on << 4 | external << 5]`
    pub const fn packed(&self) -> u8 {
        pack_indexed(self.index, (self.on as u8) | ((self.external as u8) << 1))
    }
}

/// Ring of the most recent records; the oldest is dropped when full.
pub struct EventLog {
    records: Deque<EventRecord, EVENT_LOG_CAPACITY>,
    dropped: u32,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub const fn new() -> Self {
        Self {
            records: Deque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, record: EventRecord) {
        if self.records.is_full() {
            let _ = self.records.pop_front();
            self.dropped = self.dropped.wrapping_add(1);
        }
        // Cannot fail: a slot was freed above.
        let _ = self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records discarded because the log was full since the last drain.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Remove and yield every record, oldest first. Overwritten records
    /// are reported once and the count restarts.
    pub fn drain(&mut self) -> impl Iterator<Item = EventRecord> + '_ {
        if self.dropped > 0 {
            warn!("EVENTS: {} record(s) overwritten before the host read them", self.dropped);
            self.dropped = 0;
        }
        core::iter::from_fn(move || self.records.pop_front())
    }
}
