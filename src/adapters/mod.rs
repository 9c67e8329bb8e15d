//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter | Implements         | Connects to                 |
//! |---------|--------------------|-----------------------------|
//! | `gpio`  | PinPort, DelayNs   | ESP32 GPIO, GPIO ISR        |
//! | `nvs`   | StoragePort        | NVS / in-memory image       |
//! | `time`  | —                  | ESP32 system timer          |
//! | `uart`  | Transport          | UART0 host link             |

pub mod gpio;
pub mod nvs;
pub mod time;
pub mod uart;
