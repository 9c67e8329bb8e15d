//! Fuzz target: host link → `RelayNode`
//!
//! Splits arbitrary input into bursts separated by silence and feeds each
//! burst through the simulated UART into a running node. Asserts that the
//! node never panics, answers every burst, and keeps its settings in range.
//!
//! cargo fuzz run fuzz_receiver

#![no_main]

use libfuzzer_sys::fuzz_target;
use relayctl::adapters::gpio::GpioAdapter;
use relayctl::adapters::nvs::NvsStorage;
use relayctl::adapters::uart::UartTransport;
use relayctl::app::service::RelayNode;
use relayctl::config::RuntimeConfig;
use relayctl::pins::{MAX_RELAYS, is_allowed_interrupt_pin};

/// Byte value that ends a burst in the fuzz input (not on the wire).
const BURST_BREAK: u8 = 0xA5;

fuzz_target!(|data: &[u8]| {
    let (Ok(mut gpio), Ok(mut uart), Ok(storage)) =
        (GpioAdapter::new(), UartTransport::new(115_200), NvsStorage::new())
    else {
        return;
    };
    let config = RuntimeConfig::default();
    let quiet = config.quiet_interval_ms;
    let mut node = RelayNode::new(storage, config, 0);
    node.start(&mut gpio, &mut uart, 0);

    let mut now = 0u32;
    for burst in data.split(|&b| b == BURST_BREAK).filter(|b| !b.is_empty()) {
        uart.take_output();
        uart.inject(burst);
        now += 1;
        node.tick(&mut gpio, &mut uart, now);
        now += quiet + 1;
        node.tick(&mut gpio, &mut uart, now);
        assert!(!uart.take_output().is_empty(), "burst left unanswered");
    }

    let settings = node.settings();
    assert!(settings.relay_count() <= MAX_RELAYS);
    assert!(is_allowed_interrupt_pin(settings.interrupt_pin));
});
