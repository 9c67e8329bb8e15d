//! Relay Controller Firmware — Main Entry Point
//!
//! Composition root: builds the adapters, hands them to the node and runs
//! the cooperative idle loop. Each pass is followed by an idle wait that a
//! control-pin edge cuts short.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Adapters (outer ring)                    │
//! │                                                          │
//! │  GpioAdapter       UartTransport   NvsStorage  Clock     │
//! │  (PinPort+Delay)   (Transport)     (Storage)   (ms)      │
//! │                                                          │
//! │  ─────────────── Port Trait Boundary ───────────────     │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │             RelayNode (pure logic)                 │  │
//! │  │  Relays · Settings · Protocol · TimeSync           │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::info;

use relayctl::adapters::gpio::GpioAdapter;
use relayctl::adapters::nvs::NvsStorage;
use relayctl::adapters::time::SystemClock;
use relayctl::adapters::uart::UartTransport;
use relayctl::app::service::RelayNode;
use relayctl::config::RuntimeConfig;
use relayctl::error::Error;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  relayctl v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = RuntimeConfig::default();
    info!("Runtime config: {}", serde_json::to_string(&config)?);

    // ── 2. Adapters ───────────────────────────────────────────
    let clock = SystemClock::new();
    let mut gpio = GpioAdapter::new()?;
    let storage = NvsStorage::new()?;
    let mut uart = UartTransport::new(config.uart_baud).map_err(Error::from)?;

    // ── 3. Node ───────────────────────────────────────────────
    let mut node = RelayNode::new(storage, config, clock.now_ms());
    node.start(&mut gpio, &mut uart, clock.now_ms());

    info!("System ready. Entering idle loop.");

    // ── 4. Idle loop ──────────────────────────────────────────
    loop {
        node.tick(&mut gpio, &mut uart, clock.now_ms());
        node.idle(&mut gpio);
    }
}
