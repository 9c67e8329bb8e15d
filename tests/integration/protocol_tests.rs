//! Command-level tests: bytes in on the mock link, frames out.
//!
//! Every test drives a full [`RelayNode`](relayctl::app::service::RelayNode)
//! through [`Harness::exchange`], so framing, dispatch and rendering are
//! exercised together.

use super::mock_hw::{Harness, MemStorage, MockBoard, contains};

use relayctl::settings::layout;

const OFF: u8 = 0x1F;

/// Relay 0: set on GPIO4, nothing else wired.
const PLAIN: [u8; 3] = [4, OFF, OFF];

// ── Framing ───────────────────────────────────────────────────

#[test]
fn wrong_start_byte_is_rejected() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[5, 1, 16]), vec![0, 4, 0, 5]);
    assert_eq!(h.link.rx.len(), 0, "buffer must be drained");
}

#[test]
fn lone_marker_is_empty_command() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0]), vec![0, 4, 0, 3]);
}

#[test]
fn oversized_command_is_rejected_and_drained() {
    let mut h = Harness::new();
    let mut cmd = vec![0u8];
    cmd.extend(std::iter::repeat_n(1u8, 65));
    assert_eq!(h.exchange(&cmd), vec![0, 4, 0, 4]);
    assert_eq!(h.link.rx.len(), 0);

    // The link recovers for the next command.
    assert_eq!(h.exchange(&[0, 1, 16]), vec![0, 7, 16, 2]);
}

#[test]
fn unknown_verb_is_echoed_then_reported() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 9, 1]), vec![9, 1, 0, 4, 0, 2]);
}

#[test]
fn verb_without_kind_is_unrecognized() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 1]), vec![1, 0, 4, 0, 2]);
}

#[test]
fn bytes_arriving_in_pieces_form_one_command() {
    let mut h = Harness::new();
    h.link.inject(&[0, 2]);
    h.advance(10);
    h.link.inject(&[3, 0xAB]);
    h.advance(40);
    h.link.inject(&[0xCD, 0, 1]);
    h.advance(40);
    assert!(h.link.take_output().is_empty(), "must wait for silence");
    assert_eq!(h.exchange(&[]), vec![0, 3, 3]);
    assert_eq!(h.node.settings().controller_id, 0xABCD_0001);
}

// ── Dispatch errors ───────────────────────────────────────────

#[test]
fn unknown_kind_is_undefined_operation() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 1, 99]), vec![0, 4, 99, 7]);
    assert_eq!(h.exchange(&[0, 1, 0]), vec![0, 4, 0, 7]);
}

#[test]
fn set_without_payload_reports_missing_data() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 2, 3]), vec![0, 4, 3, 1]);
    // Checked before the kind is looked up.
    assert_eq!(h.exchange(&[0, 2, 99]), vec![0, 4, 99, 1]);
}

#[test]
fn verbs_outside_the_table_are_undefined() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 1, 12]), vec![0, 4, 12, 7]);
    assert_eq!(h.exchange(&[0, 2, 16, 1]), vec![0, 4, 16, 7]);
    assert_eq!(h.exchange(&[0, 2, 8, 0x10]), vec![0, 4, 8, 7]);
    // Signal-only kinds are never commands.
    assert_eq!(h.exchange(&[0, 1, 14]), vec![0, 4, 14, 7]);
}

#[test]
fn short_payload_reports_missing_data() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 2, 3, 1, 2]), vec![0, 4, 3, 1]);
    assert_eq!(h.exchange(&[0, 2, 11, 0]), vec![0, 4, 11, 1]);
}

// ── Identity and version ──────────────────────────────────────

#[test]
fn version_is_reported() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 1, 16]), vec![0, 7, 16, 2]);
}

#[test]
fn controller_id_round_trips() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 2, 3, 0xCA, 0xFE, 0x00, 0x01]), vec![0, 3, 3]);
    assert_eq!(h.exchange(&[0, 1, 3]), vec![0, 7, 3, 0xCA, 0xFE, 0x00, 0x01]);
}

// ── Relay table ───────────────────────────────────────────────

#[test]
fn relay_table_is_stored_and_read_back() {
    let mut h = Harness::new();
    let out = h.exchange(&[0, 2, 1, 2, 4, OFF, 0x46, 8, OFF, OFF]);
    assert_eq!(out, vec![0, 3, 1, 0x82]);
    assert_eq!(
        h.exchange(&[0, 1, 1]),
        vec![0, 7, 1, 2, 4, OFF, 0x46, 8, OFF, OFF]
    );
    assert_eq!(h.board.modes.get(&4), Some(&relayctl::app::ports::PinMode::Output));
}

#[test]
fn relay_table_shorter_than_count_is_mismatch() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 2, 1, 2, 4, OFF, OFF]), vec![0, 4, 1, 9]);
    assert_eq!(h.node.settings().relay_count, 0);
}

#[test]
fn relay_count_above_sixteen_overflows() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 2, 1, 17]), vec![0, 4, 1, 8]);
}

#[test]
fn reserved_pin_is_named_in_the_error() {
    let mut h = Harness::new();
    h.configure(&[PLAIN]);
    let out = h.exchange(&[0, 2, 1, 2, 8, OFF, OFF, 4, 27, OFF]);
    assert_eq!(out, vec![0, 4, 1, 0x20 | 27]);
    // Nothing was replaced.
    assert_eq!(h.node.settings().relay_count, 1);
    assert_eq!(h.node.settings().relays[0].set.pin(), 4);
}

#[test]
fn relay_table_survives_reboot() {
    let mut h = Harness::new();
    h.configure(&[PLAIN, [8, 9, 0x4A]]);
    h.exchange(&[0, 2, 3, 0, 0, 0, 42]);

    let image = h.node.store().storage().clone();
    let reborn = Harness::boot(image, MockBoard::new());
    assert_eq!(reborn.node.settings(), h.node.settings());
}

#[test]
fn failed_storage_write_reports_write_failed() {
    let mut storage = MemStorage::blank();
    storage.fail_writes = true;
    let mut h = Harness::boot(storage, MockBoard::new());
    h.tick();
    h.link.take_output();
    assert_eq!(h.exchange(&[0, 2, 3, 0, 0, 0, 1]), vec![0, 4, 3, 6]);
}

// ── Relay state ───────────────────────────────────────────────

#[test]
fn switching_a_relay_signals_before_the_response() {
    let mut h = Harness::new();
    h.configure(&[PLAIN]);
    let out = h.exchange(&[0, 2, 7, 0x10]);
    assert_eq!(out, vec![0, 6, 14, 0x10, 0, 0, 0, 0, 0, 3, 7]);
    assert!(h.board.level(4));
    assert_eq!(h.exchange(&[0, 1, 7, 0]), vec![0, 7, 7, 0x10]);

    // Repeating the command changes nothing, so no signal.
    assert_eq!(h.exchange(&[0, 2, 7, 0x10]), vec![0, 3, 7]);
}

#[test]
fn inversed_set_pin_drives_low_for_on() {
    let mut h = Harness::new();
    h.configure(&[[4 | 0x20, OFF, OFF]]);
    assert!(h.board.level(4), "off is high on an inversed pin");
    h.exchange(&[0, 2, 7, 0x10]);
    assert!(!h.board.level(4));
}

#[test]
fn relay_index_is_checked() {
    let mut h = Harness::new();
    h.configure(&[PLAIN]);
    assert_eq!(h.exchange(&[0, 1, 7, 1]), vec![0, 4, 7, 10]);
    assert_eq!(h.exchange(&[0, 2, 5, 0x31]), vec![0, 4, 5, 10]);
    assert_eq!(h.exchange(&[0, 2, 12, 3]), vec![0, 4, 12, 10]);
}

#[test]
fn state_block_packs_nibbles() {
    let mut h = Harness::new();
    h.configure(&[PLAIN, [8, OFF, OFF], [10, OFF, OFF]]);
    h.exchange(&[0, 2, 7, 0x11]);
    h.exchange(&[0, 2, 6, 0x12]);
    // Relay 1 commanded (bit1), relay 2 temporarily disabled (bit2).
    assert_eq!(h.exchange(&[0, 1, 2]), vec![0, 7, 2, 3, 0x20, 0x04]);
}

#[test]
fn state_block_sets_every_relay() {
    let mut h = Harness::new();
    h.configure(&[PLAIN, [8, OFF, OFF]]);
    // Relay 0 on, relay 1 on and temporarily disabled.
    let out = h.exchange(&[0, 2, 2, 2, 0b1101]);
    assert!(out.ends_with(&[0, 3, 2]));
    assert!(h.node.relays().is_on(0));
    assert!(h.node.relays().is_on(1));
    assert!(!h.node.relays().is_temp_disabled(0));
    assert!(h.node.relays().is_temp_disabled(1));
}

#[test]
fn state_block_count_must_match() {
    let mut h = Harness::new();
    h.configure(&[PLAIN]);
    assert_eq!(h.exchange(&[0, 2, 2, 2, 0]), vec![0, 4, 2, 9]);
}

#[test]
fn single_relay_state_sets_both_flags() {
    let mut h = Harness::new();
    h.configure(&[PLAIN]);
    h.exchange(&[0, 2, 5, 0x30]);
    assert_eq!(h.exchange(&[0, 1, 5, 0]), vec![0, 7, 5, 0x60]);
    assert_eq!(h.exchange(&[0, 1, 6, 0]), vec![0, 7, 6, 0x10]);
}

#[test]
fn monitor_and_control_levels_are_readable() {
    let mut h = Harness::new();
    h.board.set(5, true);
    h.board.set(6, true);
    h.configure(&[[4, 5, 6]]);
    assert_eq!(h.exchange(&[0, 1, 8, 0]), vec![0, 7, 8, 0x10]);
    assert_eq!(h.exchange(&[0, 1, 9, 0]), vec![0, 7, 9, 0x10]);
}

// ── Combined settings ─────────────────────────────────────────

#[test]
fn all_block_replaces_everything_at_once() {
    let mut h = Harness::new();
    let out = h.exchange(&[0, 2, 4, 1, 0, 0, 0, 9, 3, 4, OFF, OFF, 0b01]);
    assert!(out.ends_with(&[0, 3, 4]), "{:?}", out);
    assert_eq!(
        h.exchange(&[0, 1, 4]),
        vec![0, 7, 4, 0, 0, 0, 9, 3, 1, 4, OFF, OFF, 0x02]
    );
    assert_eq!(h.board.interrupt_pin, Some(3));
}

#[test]
fn all_block_validates_before_writing() {
    let mut h = Harness::new();
    assert_eq!(
        h.exchange(&[0, 2, 4, 1, 0, 0, 0, 9, 7, 4, OFF, OFF, 0]),
        vec![0, 4, 4, 11]
    );
    assert_eq!(
        h.exchange(&[0, 2, 4, 1, 0, 0, 0, 9, 3, 26, OFF, OFF, 0]),
        vec![0, 4, 4, 0x20 | 26]
    );
    assert_eq!(h.node.settings().controller_id, 0xFFFF_FFFF);
    assert_eq!(h.node.settings().relay_count, 0);
}

#[test]
fn failed_all_block_write_keeps_previous_configuration() {
    let mut storage = MemStorage::blank();
    storage.bytes[layout::RELAY_COUNT] = 1;
    storage.bytes[layout::relay(0)..layout::relay(1)].copy_from_slice(&PLAIN);
    storage.fail_writes = true;
    let mut h = Harness::boot(storage, MockBoard::new());
    h.tick();
    h.link.take_output();

    let out = h.exchange(&[0, 2, 4, 2, 0, 0, 0, 9, 3, 8, OFF, OFF, 10, OFF, OFF, 0]);
    assert_eq!(out, vec![0, 4, 4, 6]);

    let s = h.node.settings();
    assert_eq!(s.controller_id, 0xFFFF_FFFF);
    assert_eq!(s.interrupt_pin, 2);
    assert_eq!(s.relay_count, 1);
    assert_eq!(s.relays[0].set.pin(), 4);
    assert_eq!(h.node.store().storage().bytes[layout::relay(0)], 4);
    assert_eq!(h.board.interrupt_pin, Some(2));
    assert!(!h.board.modes.contains_key(&8));
}

#[test]
fn truncated_all_block_reports_missing_data() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 2, 4, 1, 0, 0, 0, 9, 3, 4]), vec![0, 4, 4, 1]);
}

// ── Controller settings ───────────────────────────────────────

#[test]
fn interrupt_pin_is_restricted() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 1, 10]), vec![0, 7, 10, 2]);
    assert_eq!(h.exchange(&[0, 2, 10, 3]), vec![0, 3, 10]);
    assert_eq!(h.exchange(&[0, 1, 10]), vec![0, 7, 10, 3]);
    assert_eq!(h.board.interrupt_pin, Some(3));
    assert_eq!(h.exchange(&[0, 2, 10, 7]), vec![0, 4, 10, 11]);
    assert_eq!(h.exchange(&[0, 1, 10]), vec![0, 7, 10, 3]);
}

#[test]
fn switch_counting_settings_round_trip() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 1, 11]), vec![0, 7, 11, 0x02, 0x58, 0]);
    assert_eq!(h.exchange(&[0, 2, 11, 0, 30, 4]), vec![0, 3, 11]);
    assert_eq!(h.exchange(&[0, 1, 11]), vec![0, 7, 11, 0, 30, 4]);
    assert_eq!(h.exchange(&[0, 2, 11, 0, 0, 4]), vec![0, 4, 11, 12]);
    assert_eq!(h.exchange(&[0, 2, 11, 0, 30, 21]), vec![0, 4, 11, 12]);
}

#[test]
fn state_fix_settings_round_trip() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 1, 13]), vec![0, 7, 13, 0, 100, 3, 5, 0, 50]);
    assert_eq!(h.exchange(&[0, 2, 13, 0, 200, 2, 1, 0, 20]), vec![0, 3, 13]);
    assert_eq!(h.exchange(&[0, 1, 13]), vec![0, 7, 13, 0, 200, 2, 1, 0, 20]);
    // Settle delay above 5 s is refused.
    assert_eq!(h.exchange(&[0, 2, 13, 0x27, 0x10, 2, 1, 0, 20]), vec![0, 4, 13, 12]);
}

// ── Time ──────────────────────────────────────────────────────

#[test]
fn remote_time_follows_the_last_sync() {
    let mut h = Harness::new();
    assert_eq!(h.exchange(&[0, 1, 15]), vec![0, 7, 15, 0, 0, 0, 0]);

    assert_eq!(h.exchange(&[0, 2, 15, 0x65, 0, 0, 0]), vec![0, 3, 15]);
    assert_eq!(h.exchange(&[0, 1, 15]), vec![0, 7, 15, 0x65, 0, 0, 0]);

    h.now += 5_000;
    let out = h.exchange(&[0, 1, 19]);
    assert_eq!(out, vec![0, 7, 19, 0x65, 0, 0, 5]);

    // A second sync re-bases instead of accumulating.
    h.exchange(&[0, 2, 15, 0, 0, 0x03, 0xE8]);
    assert_eq!(h.exchange(&[0, 1, 19]), vec![0, 7, 19, 0, 0, 0x03, 0xE8]);
}

#[test]
fn event_timestamps_use_remote_time() {
    let mut h = Harness::new();
    h.configure(&[PLAIN]);
    h.exchange(&[0, 2, 15, 0, 0, 0x10, 0]);
    let out = h.exchange(&[0, 2, 7, 0x10]);
    assert!(contains(&out, &[0, 6, 14, 0x10, 0, 0, 0x10, 0]), "{:?}", out);
}

// ── Diagnostics ───────────────────────────────────────────────

#[test]
fn event_log_is_drained_by_reading() {
    let mut h = Harness::new();
    h.configure(&[PLAIN, [8, OFF, OFF]]);
    h.exchange(&[0, 2, 7, 0x10]);
    h.exchange(&[0, 2, 7, 0x11]);
    h.exchange(&[0, 2, 7, 0x00]);
    assert_eq!(
        h.exchange(&[0, 1, 18]),
        vec![0, 7, 18, 3, 0x10, 0, 0, 0, 0, 0x11, 0, 0, 0, 0, 0x00, 0, 0, 0, 0]
    );
    assert_eq!(h.exchange(&[0, 1, 18]), vec![0, 7, 18, 0]);
}

#[test]
fn fix_data_lists_every_relay() {
    let mut h = Harness::new();
    h.configure(&[PLAIN, [8, OFF, OFF]]);
    assert_eq!(
        h.exchange(&[0, 1, 17]),
        vec![0, 7, 17, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn contact_wait_data_lists_every_relay() {
    let mut h = Harness::new();
    h.configure(&[[4, OFF, 6]]);
    assert_eq!(h.exchange(&[0, 1, 20]), vec![0, 7, 20, 1, 0, 0, 0, 0, 0]);
}

#[test]
fn cycle_statistics_have_fixed_layout() {
    let mut h = Harness::new();
    h.run_for(100, 10);
    let out = h.exchange(&[0, 1, 21]);
    assert_eq!(out.len(), 3 + 2 + 2 + 2 + 8);
    assert_eq!(&out[..3], &[0, 7, 21]);
    assert_eq!(u16::from_be_bytes([out[3], out[4]]), 0, "min pass time");
    let cycles = u64::from_be_bytes(out[9..17].try_into().unwrap());
    assert!(cycles >= 10);
}
