//! Relay controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control_line;
pub mod diagnostics;
pub mod error;
pub mod history;
pub mod pins;
pub mod protocol;
pub mod relay;
pub mod settings;
pub mod timesync;

// The adapters carry simulation backends, so they compile on the host too.
pub mod adapters;
