//! Host time base.
//!
//! The controller only has a free-running millisecond counter. The host
//! supplies epoch seconds; every sync re-bases the mapping so drift never
//! accumulates:
//!
//! ```text
//! remote = host_epoch_at_sync + (now_ms − local_ms_at_sync) / 1000
//! ```
//!
//! Elapsed time is computed with wrapping arithmetic, so the mapping stays
//! correct across a counter wrap as long as the host re-syncs at least once
//! every ~49 days.

use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncPoint {
    local_ms: u32,
    host_epoch: u32,
}

pub struct TimeSync {
    sync: Option<SyncPoint>,
    request_interval_ms: u32,
    last_request_ms: Option<u32>,
}

impl TimeSync {
    pub const fn new(request_interval_ms: u32) -> Self {
        Self {
            sync: None,
            request_interval_ms,
            last_request_ms: None,
        }
    }

    /// Re-base on a host-supplied epoch value.
    pub fn sync(&mut self, now_ms: u32, host_epoch: u32) {
        self.sync = Some(SyncPoint {
            local_ms: now_ms,
            host_epoch,
        });
        info!("TIME: synced to {} at local {} ms", host_epoch, now_ms);
    }

    pub fn is_synced(&self) -> bool {
        self.sync.is_some()
    }

    /// Host epoch received at the last sync, 0 before the first one.
    pub fn host_epoch_at_sync(&self) -> u32 {
        self.sync.map_or(0, |s| s.host_epoch)
    }

    /// Remote-epoch seconds for `now_ms`; uptime seconds until synced.
    pub fn remote_now(&self, now_ms: u32) -> u32 {
        match self.sync {
            Some(s) => s
                .host_epoch
                .wrapping_add(now_ms.wrapping_sub(s.local_ms) / 1000),
            None => now_ms / 1000,
        }
    }

    /// `true` when a sync request should be sent now.
    pub fn poll_request(&mut self, now_ms: u32) -> bool {
        if self.sync.is_some() {
            return false;
        }
        let due = self
            .last_request_ms
            .is_none_or(|last| now_ms.wrapping_sub(last) >= self.request_interval_ms);
        if due {
            self.last_request_ms = Some(now_ms);
        }
        due
    }
}
