//! Relay behaviour over time: debounce, push mode, switch-rate limiting,
//! self-heal and temporary disable, all driven through the node's idle
//! loop on a simulated clock.

use super::mock_hw::{Harness, MemStorage, MockBoard, contains};

use relayctl::adapters::gpio::GpioAdapter;
use relayctl::adapters::nvs::NvsStorage;
use relayctl::adapters::uart::UartTransport;
use relayctl::app::service::{BOOT_PREAMBLE, RelayNode};
use relayctl::config::RuntimeConfig;
use relayctl::settings::layout;

const OFF: u8 = 0x1F;

/// Set on GPIO4, control on GPIO6 following its level.
const LEVEL: [u8; 3] = [4, OFF, 6];
/// Set on GPIO4, control on GPIO6 toggling on each press.
const PUSH: [u8; 3] = [4, OFF, 0x46];
/// Set on GPIO4, monitor on GPIO5.
const MONITORED: [u8; 3] = [4, 5, OFF];

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_sends_preamble_then_asks_for_time() {
    let mut h = Harness::boot(MemStorage::blank(), MockBoard::new());
    assert_eq!(h.link.take_output(), BOOT_PREAMBLE.to_vec());
    h.tick();
    assert_eq!(h.link.take_output(), vec![0, 6, 15]);
}

#[test]
fn time_requests_repeat_until_synced() {
    let mut h = Harness::new();
    h.run_for(9_900, 100);
    assert!(h.link.take_output().is_empty());
    h.advance(100);
    assert_eq!(h.link.take_output(), vec![0, 6, 15]);

    h.exchange(&[0, 2, 15, 0x65, 0, 0, 0]);
    h.run_for(30_000, 500);
    assert!(h.link.take_output().is_empty());
}

#[test]
fn interrupt_pin_is_attached_at_boot() {
    let h = Harness::new();
    assert_eq!(h.board.interrupt_pin, Some(2));
}

// ── Debounce ──────────────────────────────────────────────────

#[test]
fn level_control_switches_after_stable_input() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);

    h.board.set(6, true);
    h.advance(10);
    h.advance(30);
    // Bounce: every change restarts the window.
    h.board.set(6, false);
    h.advance(10);
    h.board.set(6, true);
    h.advance(10);
    h.advance(40);
    assert!(!h.node.relays().is_on(0), "window must restart on bounce");

    h.advance(10);
    assert!(h.node.relays().is_on(0));
    assert!(h.board.level(4));

    let out = h.link.take_output();
    assert!(contains(&out, &[0, 6, 14, 0x30]), "external switch: {:?}", out);
    assert!(contains(&out, &[0, 6, 23, 0x10]), "control change: {:?}", out);

    h.board.set(6, false);
    h.run_for(100, 10);
    assert!(!h.node.relays().is_on(0));
}

#[test]
fn short_pulse_is_ignored() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);
    h.board.set(6, true);
    h.advance(10);
    h.board.set(6, false);
    h.run_for(200, 10);
    assert!(!h.node.relays().is_on(0));
    assert!(h.node.relays().events().is_empty());
}

#[test]
fn existing_switch_position_is_kept_at_boot() {
    let mut board = MockBoard::new();
    board.set(6, true);
    let mut h = Harness::boot(MemStorage::blank(), board);
    h.configure(&[LEVEL]);
    h.run_for(500, 10);
    assert!(!h.node.relays().is_on(0));
}

#[test]
fn push_control_toggles_on_press_only() {
    let mut h = Harness::new();
    h.configure(&[PUSH]);

    h.board.set(6, true);
    h.run_for(100, 10);
    assert!(h.node.relays().is_on(0));

    h.board.set(6, false);
    h.run_for(100, 10);
    assert!(h.node.relays().is_on(0), "release must not toggle");

    h.board.set(6, true);
    h.run_for(100, 10);
    assert!(!h.node.relays().is_on(0));
    assert_eq!(h.node.relays().events().len(), 2);
}

// ── Control interrupt ─────────────────────────────────────────

#[test]
fn control_edge_cuts_the_idle_wait_short() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);
    let interval = h.node.config().loop_interval_ms;

    assert!(!h.node.idle(&mut h.board));
    assert_eq!(h.board.waits_ms, vec![interval]);

    // The interrupt pin follows the control switch.
    h.board.set(6, true);
    h.board.set(2, true);
    assert!(h.node.idle(&mut h.board));
    assert_eq!(h.board.waits_ms.last(), Some(&0));

    // The next pass consumes the edge, so the wait after it is full again.
    h.tick();
    assert!(!h.node.idle(&mut h.board));
    assert_eq!(h.board.waits_ms.last(), Some(&interval));
}

#[test]
fn edge_woken_passes_switch_the_relay() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);
    h.board.set(6, true);
    h.board.set(2, true);
    h.cycle();
    assert!(!h.board.line.is_pending());

    h.run_for(60, 10);
    assert!(h.node.relays().is_on(0));
}

#[test]
fn repeated_interrupt_level_raises_no_edge() {
    let mut h = Harness::new();
    h.board.set(2, false);
    assert!(!h.node.idle(&mut h.board));
    h.board.set(2, true);
    h.board.set(2, true);
    h.tick();
    assert!(!h.board.line.is_pending());
}

#[test]
fn inversed_control_reads_pressed_when_low() {
    let mut board = MockBoard::new();
    board.set(6, true);
    let mut h = Harness::boot(MemStorage::blank(), board);
    h.configure(&[[4, OFF, 6 | 0x20]]);

    h.board.set(6, false);
    h.run_for(100, 10);
    assert!(h.node.relays().is_on(0));
}

// ── Switch-rate limiting ──────────────────────────────────────

#[test]
fn excess_control_switches_are_deferred() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);
    assert_eq!(h.exchange(&[0, 2, 11, 0, 8, 1]), vec![0, 3, 11]);

    h.board.set(6, true);
    h.run_for(100, 10);
    assert!(h.node.relays().is_on(0));
    assert_eq!(h.node.relays().switch_count(0), 1);

    h.board.set(6, false);
    h.run_for(7_000, 50);
    assert!(h.node.relays().is_on(0), "second switch inside the window");

    h.run_for(3_000, 50);
    assert!(!h.node.relays().is_on(0), "deferred switch applied later");
}

#[test]
fn clearing_the_count_releases_a_deferred_switch() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);
    h.exchange(&[0, 2, 11, 0, 60, 1]);

    h.board.set(6, true);
    h.run_for(100, 10);
    h.board.set(6, false);
    h.run_for(500, 10);
    assert!(h.node.relays().is_on(0));

    assert_eq!(h.exchange(&[0, 2, 12, 0]), vec![0, 3, 12]);
    h.run_for(100, 10);
    assert!(!h.node.relays().is_on(0));
}

#[test]
fn host_commands_bypass_the_limit() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);
    h.exchange(&[0, 2, 11, 0, 60, 1]);

    for _ in 0..3 {
        h.exchange(&[0, 2, 7, 0x10]);
        assert!(h.node.relays().is_on(0));
        h.exchange(&[0, 2, 7, 0x00]);
        assert!(!h.node.relays().is_on(0));
    }
    assert_eq!(h.node.relays().switch_count(0), 0);
}

#[test]
fn unchanged_interval_keeps_the_count() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);
    h.exchange(&[0, 2, 11, 0, 60, 2]);
    h.board.set(6, true);
    h.run_for(100, 10);
    assert_eq!(h.node.relays().switch_count(0), 1);

    h.exchange(&[0, 2, 11, 0, 60, 3]);
    assert_eq!(h.node.relays().switch_count(0), 1);
    h.exchange(&[0, 2, 11, 0, 30, 3]);
    assert_eq!(h.node.relays().switch_count(0), 0);
}

// ── Self-heal ─────────────────────────────────────────────────

#[test]
fn mismatch_is_nudged_a_bounded_number_of_times() {
    let mut h = Harness::new();
    h.configure(&[MONITORED]);
    assert_eq!(
        h.exchange(&[0, 2, 13, 0, 100, 3, 1, 0, 50]),
        vec![0, 3, 13]
    );
    h.exchange(&[0, 2, 7, 0x10]);
    h.link.take_output();

    // Monitor stays low while the relay is commanded on.
    h.run_for(10_000, 100);
    assert_eq!(h.node.relays().heal(0).attempts(), 3);
    assert_eq!(h.board.delays_ms, vec![100, 100, 100]);
    assert_eq!(
        h.board.writes_to(4),
        vec![false, true, false, true, false, true, false, true]
    );

    let out = h.link.take_output();
    assert!(contains(&out, &[0, 6, 24, 0x00, 1]));
    assert!(contains(&out, &[0, 6, 24, 0x00, 3]));
    assert!(!contains(&out, &[0, 6, 24, 0x00, 4]));

    let fix = h.exchange(&[0, 1, 17]);
    assert_eq!(&fix[..5], &[0, 7, 17, 1, 3]);

    // A new command starts a fresh episode.
    h.exchange(&[0, 2, 7, 0x10]);
    assert_eq!(h.node.relays().heal(0).attempts(), 0);
}

#[test]
fn nudges_wait_after_a_command() {
    let mut h = Harness::new();
    h.configure(&[MONITORED]);
    h.exchange(&[0, 2, 7, 0x10]);
    // Default minimum wait is 5 s.
    h.run_for(4_000, 100);
    assert_eq!(h.node.relays().heal(0).attempts(), 0);
    h.run_for(2_000, 100);
    assert_eq!(h.node.relays().heal(0).attempts(), 1);
}

#[test]
fn zero_attempts_disables_self_heal() {
    let mut h = Harness::new();
    h.configure(&[MONITORED]);
    h.exchange(&[0, 2, 13, 0, 100, 0, 1, 0, 50]);
    h.exchange(&[0, 2, 7, 0x10]);
    h.run_for(10_000, 100);
    assert_eq!(h.node.relays().heal(0).attempts(), 0);
    assert!(h.board.delays_ms.is_empty());
}

#[test]
fn agreeing_monitor_is_left_alone() {
    let mut h = Harness::new();
    h.configure(&[MONITORED]);
    h.exchange(&[0, 2, 7, 0x10]);
    h.board.set(5, true);
    h.run_for(10_000, 100);
    assert_eq!(h.node.relays().heal(0).attempts(), 0);
}

#[test]
fn monitor_change_is_signalled() {
    let mut h = Harness::new();
    h.configure(&[MONITORED]);
    h.board.set(5, true);
    h.advance(10);
    let out = h.link.take_output();
    assert!(contains(&out, &[0, 6, 22, 0x10]), "{:?}", out);
    assert!(h.node.relays().monitor_level(0));
}

// ── Temporary disable ─────────────────────────────────────────

#[test]
fn temp_disabled_relay_ignores_control() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);
    assert_eq!(h.exchange(&[0, 2, 6, 0x10]), vec![0, 3, 6]);

    h.board.set(6, true);
    h.run_for(300, 10);
    assert!(!h.node.relays().is_on(0));
    // The live level is still reported.
    assert_eq!(h.exchange(&[0, 1, 9, 0]), vec![0, 7, 9, 0x10]);

    // Resuming adopts the current position without switching.
    h.exchange(&[0, 2, 6, 0x00]);
    h.run_for(300, 10);
    assert!(!h.node.relays().is_on(0));

    h.board.set(6, false);
    h.run_for(100, 10);
    h.board.set(6, true);
    h.run_for(100, 10);
    assert!(h.node.relays().is_on(0));
}

#[test]
fn temp_disabled_relay_still_obeys_host() {
    let mut h = Harness::new();
    h.configure(&[LEVEL]);
    h.exchange(&[0, 2, 6, 0x10]);
    h.exchange(&[0, 2, 7, 0x10]);
    assert!(h.node.relays().is_on(0));
    assert!(h.board.level(4));
}

// ── Host adapters ─────────────────────────────────────────────

#[test]
fn node_runs_on_simulated_adapters() {
    let mut gpio = GpioAdapter::new().unwrap();
    let mut uart = UartTransport::new(115_200).unwrap();
    let storage = NvsStorage::new().unwrap();
    let config = RuntimeConfig::default();
    let quiet = config.quiet_interval_ms;

    let mut node = RelayNode::new(storage, config, 0);
    node.start(&mut gpio, &mut uart, 0);
    assert!(uart.take_output().starts_with(&BOOT_PREAMBLE));

    uart.inject(&[0, 2, 1, 1, 4, OFF, OFF]);
    node.tick(&mut gpio, &mut uart, 10);
    node.tick(&mut gpio, &mut uart, 11 + quiet);
    assert!(uart.take_output().ends_with(&[0, 3, 1, 0x81]));
    assert_eq!(node.store().storage().image()[layout::RELAY_COUNT], 1);

    uart.inject(&[0, 2, 7, 0x10]);
    node.tick(&mut gpio, &mut uart, 100);
    node.tick(&mut gpio, &mut uart, 101 + quiet);
    assert!(uart.take_output().ends_with(&[0, 3, 7]));
    assert!(relayctl::app::ports::PinPort::read_digital(&mut gpio, 4));
}
