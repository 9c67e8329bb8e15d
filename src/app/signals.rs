//! Unsolicited notifications raised by the relay state machine.
//!
//! Timestamps are remote-epoch seconds from
//! [`TimeSync`](crate::timesync::TimeSync).

use crate::protocol::codes::DataKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The set pin was driven to a new commanded state.
    RelayStateChanged {
        index: u8,
        on: bool,
        /// Caused by the control input rather than a host command.
        external: bool,
        timestamp: u32,
    },
    /// The monitor pin changed level.
    MonitorStateChanged { index: u8, level: bool, timestamp: u32 },
    /// The control input settled on a new level.
    ControlStateChanged { index: u8, level: bool, timestamp: u32 },
    /// A self-heal nudge was performed.
    SelfHealAttempt {
        index: u8,
        monitor: bool,
        attempt: u8,
        timestamp: u32,
    },
    /// No host time is known yet.
    TimeSyncRequest,
}

impl Signal {
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::RelayStateChanged { .. } => DataKind::RelayStateChanged,
            Self::MonitorStateChanged { .. } => DataKind::MonitorStateChanged,
            Self::ControlStateChanged { .. } => DataKind::ControlStateChanged,
            Self::SelfHealAttempt { .. } => DataKind::SelfHealAttempt,
            Self::TimeSyncRequest => DataKind::RemoteTimestamp,
        }
    }
}
