//! Fuzz target: `SettingsStore::load`
//!
//! Loads arbitrary flash contents and asserts that every value that comes
//! out is usable: in-range counts, allowed pins and valid tuning records.
//!
//! cargo fuzz run fuzz_settings_image

#![no_main]

use libfuzzer_sys::fuzz_target;
use relayctl::adapters::nvs::NvsStorage;
use relayctl::pins::{MAX_RELAYS, is_allowed_interrupt_pin};
use relayctl::settings::{SettingsStore, layout};

fuzz_target!(|data: &[u8]| {
    let mut image = [0xFFu8; layout::TOTAL];
    let n = data.len().min(layout::TOTAL);
    image[..n].copy_from_slice(&data[..n]);

    let store = SettingsStore::load(NvsStorage::with_image(image));
    let s = store.settings();
    assert!(s.relay_count() <= MAX_RELAYS);
    assert!(is_allowed_interrupt_pin(s.interrupt_pin));
    assert!(s.self_heal.validate().is_ok());
    assert!(s.switch_rate.validate().is_ok());
    assert!(s.active_relays().iter().all(|r| r.forbidden_pin().is_none()));
});
