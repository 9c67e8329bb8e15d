//! Application core — domain orchestration, zero direct I/O.
//!
//! The node ties the relay state machine, the settings store and the
//! protocol together. All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod ports;
pub mod service;
pub mod signals;
