//! Wire-level codes: frame tags, verbs, data kinds and status codes.
//!
//! ```text
//! command   [0x00][verb][kind][payload…]
//! response  [0x00][0x07][kind][payload…]
//! success   [0x00][0x03][kind]( [code] )
//! error     [0x00][0x04][kind][code]
//! signal    [0x00][0x06][kind][payload…]
//! ```

use core::fmt;

/// Leading byte of every frame in both directions.
pub const FRAME_MARKER: u8 = 0x00;

/// Reported by [`DataKind::Version`].
pub const PROTOCOL_VERSION: u8 = 2;

/// Status codes at or above this value are informational, not failures.
pub const INFORMATIONAL_THRESHOLD: u8 = 0x80;

// ---------------------------------------------------------------------------
// Verbs and frame tags
// ---------------------------------------------------------------------------

/// Command verbs accepted from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Verb {
    Read = 1,
    Set = 2,
}

impl TryFrom<u8> for Verb {
    type Error = ErrorCode;

    fn try_from(value: u8) -> Result<Self, ErrorCode> {
        match value {
            1 => Ok(Self::Read),
            2 => Ok(Self::Set),
            _ => Err(ErrorCode::InstructionUnrecognized),
        }
    }
}

/// Second byte of every controller-originated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameTag {
    Success = 3,
    Error = 4,
    Signal = 6,
    Response = 7,
}

// ---------------------------------------------------------------------------
// Data kinds
// ---------------------------------------------------------------------------

/// Selects the handler for a command, or the meaning of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataKind {
    Settings = 1,
    State = 2,
    Id = 3,
    All = 4,
    RelayState = 5,
    RelayDisabledTemp = 6,
    RelaySwitchedOn = 7,
    RelayMonitorOn = 8,
    RelayControlOn = 9,
    InterruptPin = 10,
    SwitchCountingSettings = 11,
    ClearSwitchCount = 12,
    StateFixSettings = 13,
    RelayStateChanged = 14,
    RemoteTimestamp = 15,
    Version = 16,
    FixData = 17,
    EventLog = 18,
    CurrentTime = 19,
    ContactWaitData = 20,
    CycleStatistics = 21,
    MonitorStateChanged = 22,
    ControlStateChanged = 23,
    SelfHealAttempt = 24,
}

impl DataKind {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DataKind {
    type Error = ErrorCode;

    fn try_from(value: u8) -> Result<Self, ErrorCode> {
        Ok(match value {
            1 => Self::Settings,
            2 => Self::State,
            3 => Self::Id,
            4 => Self::All,
            5 => Self::RelayState,
            6 => Self::RelayDisabledTemp,
            7 => Self::RelaySwitchedOn,
            8 => Self::RelayMonitorOn,
            9 => Self::RelayControlOn,
            10 => Self::InterruptPin,
            11 => Self::SwitchCountingSettings,
            12 => Self::ClearSwitchCount,
            13 => Self::StateFixSettings,
            14 => Self::RelayStateChanged,
            15 => Self::RemoteTimestamp,
            16 => Self::Version,
            17 => Self::FixData,
            18 => Self::EventLog,
            19 => Self::CurrentTime,
            20 => Self::ContactWaitData,
            21 => Self::CycleStatistics,
            22 => Self::MonitorStateChanged,
            23 => Self::ControlStateChanged,
            24 => Self::SelfHealAttempt,
            _ => return Err(ErrorCode::UndefinedOperation),
        })
    }
}

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Failure codes carried in error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Payload shorter than the fields it must carry.
    RequestDataNoValue,
    InstructionUnrecognized,
    CommandEmpty,
    CommandSizeOverflow,
    InstructionWrongStart,
    /// Settings storage rejected the write.
    WriteFailed,
    /// The verb is not defined for this data kind.
    UndefinedOperation,
    RelayCountOverflow,
    RelayCountAndDataMismatch,
    RelayIndexOutOfRange,
    InterruptPinNotAllowed,
    ValueOutOfRange,
    /// A relay record names a reserved pin.
    NotAllowedPin(u8),
}

impl ErrorCode {
    pub const fn code(self) -> u8 {
        match self {
            Self::RequestDataNoValue => 1,
            Self::InstructionUnrecognized => 2,
            Self::CommandEmpty => 3,
            Self::CommandSizeOverflow => 4,
            Self::InstructionWrongStart => 5,
            Self::WriteFailed => 6,
            Self::UndefinedOperation => 7,
            Self::RelayCountOverflow => 8,
            Self::RelayCountAndDataMismatch => 9,
            Self::RelayIndexOutOfRange => 10,
            Self::InterruptPinNotAllowed => 11,
            Self::ValueOutOfRange => 12,
            Self::NotAllowedPin(pin) => 0x20 | (pin & 0x1F),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestDataNoValue => write!(f, "request data missing"),
            Self::InstructionUnrecognized => write!(f, "instruction unrecognized"),
            Self::CommandEmpty => write!(f, "command empty"),
            Self::CommandSizeOverflow => write!(f, "command size overflow"),
            Self::InstructionWrongStart => write!(f, "instruction wrong start"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::UndefinedOperation => write!(f, "undefined operation"),
            Self::RelayCountOverflow => write!(f, "relay count overflow"),
            Self::RelayCountAndDataMismatch => write!(f, "relay count and data mismatch"),
            Self::RelayIndexOutOfRange => write!(f, "relay index out of range"),
            Self::InterruptPinNotAllowed => write!(f, "interrupt pin not allowed"),
            Self::ValueOutOfRange => write!(f, "value out of range"),
            Self::NotAllowedPin(pin) => write!(f, "pin {pin} not allowed"),
        }
    }
}
