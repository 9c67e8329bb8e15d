//! Command dispatch.
//!
//! Every `(Verb, DataKind)` pair maps to one handler with a uniform
//! signature. Handlers read their payload through a [`PayloadReader`],
//! validate everything, and only then mutate settings or relay state.
//! They never write to the link themselves: [`dispatch`] renders the
//! returned [`Reply`] or [`ErrorCode`] into exactly one frame.

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::app::ports::{PinPort, SignalSink, StoragePort};
use crate::config::{SelfHealSettings, SwitchRateSettings};
use crate::diagnostics::CycleStats;
use crate::pins::{MAX_RELAYS, RelayConfig};
use crate::relay::{Now, RelayController};
use crate::settings::SettingsStore;
use crate::timesync::TimeSync;

use super::codec::{Frame, PayloadReader, crumb, pack_indexed, pack_nibbles, unpack_indexed};
use super::codes::{DataKind, ErrorCode, INFORMATIONAL_THRESHOLD, PROTOCOL_VERSION, Verb};

/// Successful handler outcome.
#[derive(Debug)]
pub enum Reply {
    /// A response frame, fully serialized.
    Written(Frame),
    /// Plain success frame.
    Success,
    /// Success carrying `0x80 | n`.
    Accepted(u8),
}

/// Everything a handler may touch, borrowed from the node for one command.
pub struct Context<'a, S, H, K> {
    pub store: &'a mut SettingsStore<S>,
    pub relays: &'a mut RelayController,
    pub time: &'a mut TimeSync,
    pub stats: &'a CycleStats,
    pub hw: &'a mut H,
    pub sink: &'a mut K,
    pub now_ms: u32,
}

impl<S, H, K> Context<'_, S, H, K> {
    fn now(&self) -> Now {
        Now {
            ms: self.now_ms,
            epoch: self.time.remote_now(self.now_ms),
        }
    }
}

type Handler<S, H, K> =
    fn(&mut Context<'_, S, H, K>, &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>;

/// Run one command and render its outcome.
pub fn dispatch<S, H, K>(ctx: &mut Context<'_, S, H, K>, verb: Verb, kind: u8, payload: &[u8]) -> Frame
where
    S: StoragePort,
    H: PinPort + DelayNs,
    K: SignalSink,
{
    let result = route(ctx, verb, kind, payload);
    if let Err(e) = &result {
        debug!("CMD {:?}/{}: {}", verb, kind, e);
    }
    render(kind, result)
}

/// The single place handler results become frames.
pub fn render(kind: u8, result: Result<Reply, ErrorCode>) -> Frame {
    match result {
        Ok(Reply::Written(frame)) => frame,
        Ok(Reply::Success) => Frame::success(kind),
        Ok(Reply::Accepted(n)) => Frame::status(kind, INFORMATIONAL_THRESHOLD | n),
        Err(e) => Frame::error(kind, e),
    }
}

fn route<S, H, K>(
    ctx: &mut Context<'_, S, H, K>,
    verb: Verb,
    kind: u8,
    payload: &[u8],
) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
    H: PinPort + DelayNs,
    K: SignalSink,
{
    if verb == Verb::Set && payload.is_empty() {
        return Err(ErrorCode::RequestDataNoValue);
    }
    let kind = DataKind::try_from(kind)?;
    let handler = handler::<S, H, K>(verb, kind).ok_or(ErrorCode::UndefinedOperation)?;
    handler(ctx, &mut PayloadReader::new(payload))
}

fn handler<S, H, K>(verb: Verb, kind: DataKind) -> Option<Handler<S, H, K>>
where
    S: StoragePort,
    H: PinPort + DelayNs,
    K: SignalSink,
{
    use DataKind as D;
    use Verb::{Read, Set};

    let handler: Handler<S, H, K> = match (verb, kind) {
        (Read, D::Settings) => read_settings,
        (Set, D::Settings) => set_settings,
        (Read, D::State) => read_state,
        (Set, D::State) => set_state,
        (Read, D::Id) => read_id,
        (Set, D::Id) => set_id,
        (Read, D::All) => read_all,
        (Set, D::All) => set_all,
        (Read, D::RelayState) => read_relay_state,
        (Set, D::RelayState) => set_relay_state,
        (Read, D::RelayDisabledTemp) => read_relay_disabled_temp,
        (Set, D::RelayDisabledTemp) => set_relay_disabled_temp,
        (Read, D::RelaySwitchedOn) => read_relay_switched_on,
        (Set, D::RelaySwitchedOn) => set_relay_switched_on,
        (Read, D::RelayMonitorOn) => read_relay_monitor_on,
        (Read, D::RelayControlOn) => read_relay_control_on,
        (Read, D::InterruptPin) => read_interrupt_pin,
        (Set, D::InterruptPin) => set_interrupt_pin,
        (Read, D::SwitchCountingSettings) => read_switch_counting,
        (Set, D::SwitchCountingSettings) => set_switch_counting,
        (Set, D::ClearSwitchCount) => clear_switch_count,
        (Read, D::StateFixSettings) => read_state_fix,
        (Set, D::StateFixSettings) => set_state_fix,
        (Read, D::RemoteTimestamp) => read_remote_timestamp,
        (Set, D::RemoteTimestamp) => set_remote_timestamp,
        (Read, D::Version) => read_version,
        (Read, D::FixData) => read_fix_data,
        (Read, D::EventLog) => read_event_log,
        (Read, D::CurrentTime) => read_current_time,
        (Read, D::ContactWaitData) => read_contact_wait,
        (Read, D::CycleStatistics) => read_cycle_statistics,
        _ => return None,
    };
    Some(handler)
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

type RelayTable = heapless::Vec<RelayConfig, MAX_RELAYS>;

fn read_count(r: &mut PayloadReader<'_>) -> Result<usize, ErrorCode> {
    let n = r.u8()? as usize;
    if n > MAX_RELAYS {
        return Err(ErrorCode::RelayCountOverflow);
    }
    Ok(n)
}

fn read_table(r: &mut PayloadReader<'_>, n: usize) -> Result<RelayTable, ErrorCode> {
    let mut table = RelayTable::new();
    for _ in 0..n {
        let cfg = RelayConfig::from_bytes(r.array()?);
        table.push(cfg).map_err(|_| ErrorCode::RelayCountOverflow)?;
    }
    Ok(table)
}

fn put_table(frame: &mut Frame, table: &[RelayConfig]) -> Result<(), ErrorCode> {
    for cfg in table {
        frame.put_bytes(&cfg.to_bytes())?;
    }
    Ok(())
}

fn put_states<S: StoragePort, H, K>(ctx: &Context<'_, S, H, K>, frame: &mut Frame) -> Result<(), ErrorCode> {
    let n = ctx.store.settings().relay_count();
    pack_nibbles(frame, (0..n).map(|i| ctx.relays.state_bits(i)))
}

/// Apply a crumb-packed block: bit0 on, bit1 temporarily disabled.
fn apply_states<S, H, K>(ctx: &mut Context<'_, S, H, K>, n: usize, bytes: &[u8])
where
    S: StoragePort,
    H: PinPort + DelayNs,
    K: SignalSink,
{
    let now = ctx.now();
    let settings = ctx.store.settings();
    for index in 0..n {
        let bits = crumb(bytes, index);
        ctx.relays
            .command(index, bits & 0b01 != 0, settings, &mut *ctx.hw, now, &mut *ctx.sink);
        ctx.relays
            .set_temp_disabled(index, bits & 0b10 != 0, settings, &mut *ctx.hw);
    }
}

fn reconfigure<S, H, K>(ctx: &mut Context<'_, S, H, K>)
where
    S: StoragePort,
    H: PinPort,
{
    ctx.relays.configure(ctx.store.settings(), &mut *ctx.hw, ctx.now_ms);
}

/// Read `[value << 4 | index]` and check the index.
fn read_indexed<S: StoragePort, H, K>(
    ctx: &Context<'_, S, H, K>,
    r: &mut PayloadReader<'_>,
) -> Result<(usize, u8), ErrorCode> {
    let (index, value) = unpack_indexed(r.u8()?);
    Ok((ctx.store.settings().check_index(index)?, value))
}

fn respond_indexed<S: StoragePort, H, K>(
    ctx: &Context<'_, S, H, K>,
    r: &mut PayloadReader<'_>,
    kind: DataKind,
    value: impl Fn(&RelayController, usize) -> u8,
) -> Result<Reply, ErrorCode> {
    let index = ctx.store.settings().check_index(r.u8()?)?;
    let mut frame = Frame::response(kind);
    frame.put_u8(pack_indexed(index as u8, value(&*ctx.relays, index)))?;
    Ok(Reply::Written(frame))
}

// ---------------------------------------------------------------------------
// Settings and state
// ---------------------------------------------------------------------------

fn read_settings<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let settings = ctx.store.settings();
    let mut frame = Frame::response(DataKind::Settings);
    frame.put_u8(settings.relay_count)?;
    put_table(&mut frame, settings.active_relays())?;
    Ok(Reply::Written(frame))
}

fn set_settings<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
    H: PinPort,
{
    let n = read_count(r)?;
    if r.remaining() < n * RelayConfig::SIZE {
        return Err(ErrorCode::RelayCountAndDataMismatch);
    }
    let table = read_table(r, n)?;
    let stored = ctx.store.set_relays(&table)?;
    reconfigure(ctx);
    Ok(Reply::Accepted(stored))
}

fn read_state<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let mut frame = Frame::response(DataKind::State);
    frame.put_u8(ctx.store.settings().relay_count)?;
    put_states(ctx, &mut frame)?;
    Ok(Reply::Written(frame))
}

fn set_state<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
    H: PinPort + DelayNs,
    K: SignalSink,
{
    let n = read_count(r)?;
    if n != ctx.store.settings().relay_count() {
        return Err(ErrorCode::RelayCountAndDataMismatch);
    }
    let bytes = r.bytes(n.div_ceil(4))?;
    apply_states(ctx, n, bytes);
    Ok(Reply::Success)
}

fn read_id<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let mut frame = Frame::response(DataKind::Id);
    frame.put_u32(ctx.store.settings().controller_id)?;
    Ok(Reply::Written(frame))
}

fn set_id<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let id = r.u32()?;
    ctx.store.set_controller_id(id)?;
    info!("CMD: controller id 0x{:08X}", id);
    Ok(Reply::Success)
}

fn read_all<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let settings = ctx.store.settings();
    let mut frame = Frame::response(DataKind::All);
    frame.put_u32(settings.controller_id)?;
    frame.put_u8(settings.interrupt_pin)?;
    frame.put_u8(settings.relay_count)?;
    put_table(&mut frame, settings.active_relays())?;
    put_states(ctx, &mut frame)?;
    Ok(Reply::Written(frame))
}

/// `[n][id u32][interrupt pin][3n table][⌈n/4⌉ state crumbs]`
fn set_all<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
    H: PinPort + DelayNs,
    K: SignalSink,
{
    let n = read_count(r)?;
    if r.remaining() < 4 + 1 + n * RelayConfig::SIZE + n.div_ceil(4) {
        return Err(ErrorCode::RequestDataNoValue);
    }
    let id = r.u32()?;
    let pin = r.u8()?;
    let table = read_table(r, n)?;
    let states = r.bytes(n.div_ceil(4))?;

    ctx.store.set_all(id, pin, &table)?;
    reconfigure(ctx);
    apply_states(ctx, n, states);
    Ok(Reply::Success)
}

// ---------------------------------------------------------------------------
// Single relay attributes
// ---------------------------------------------------------------------------

fn read_relay_state<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    respond_indexed(ctx, r, DataKind::RelayState, |relays, i| relays.state_bits(i))
}

/// Value nibble: bit0 on, bit1 temporarily disabled.
fn set_relay_state<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
    H: PinPort + DelayNs,
    K: SignalSink,
{
    let (index, value) = read_indexed(ctx, r)?;
    let now = ctx.now();
    let settings = ctx.store.settings();
    ctx.relays
        .command(index, value & 0b01 != 0, settings, &mut *ctx.hw, now, &mut *ctx.sink);
    ctx.relays
        .set_temp_disabled(index, value & 0b10 != 0, settings, &mut *ctx.hw);
    Ok(Reply::Success)
}

fn read_relay_disabled_temp<S, H, K>(
    ctx: &mut Context<'_, S, H, K>,
    r: &mut PayloadReader<'_>,
) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    respond_indexed(ctx, r, DataKind::RelayDisabledTemp, |relays, i| {
        u8::from(relays.is_temp_disabled(i))
    })
}

fn set_relay_disabled_temp<S, H, K>(
    ctx: &mut Context<'_, S, H, K>,
    r: &mut PayloadReader<'_>,
) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
    H: PinPort,
{
    let (index, value) = read_indexed(ctx, r)?;
    ctx.relays
        .set_temp_disabled(index, value & 1 != 0, ctx.store.settings(), &mut *ctx.hw);
    Ok(Reply::Success)
}

fn read_relay_switched_on<S, H, K>(
    ctx: &mut Context<'_, S, H, K>,
    r: &mut PayloadReader<'_>,
) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    respond_indexed(ctx, r, DataKind::RelaySwitchedOn, |relays, i| u8::from(relays.is_on(i)))
}

fn set_relay_switched_on<S, H, K>(
    ctx: &mut Context<'_, S, H, K>,
    r: &mut PayloadReader<'_>,
) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
    H: PinPort,
    K: SignalSink,
{
    let (index, value) = read_indexed(ctx, r)?;
    let now = ctx.now();
    ctx.relays
        .command(index, value & 1 != 0, ctx.store.settings(), &mut *ctx.hw, now, &mut *ctx.sink);
    Ok(Reply::Success)
}

fn read_relay_monitor_on<S, H, K>(
    ctx: &mut Context<'_, S, H, K>,
    r: &mut PayloadReader<'_>,
) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    respond_indexed(ctx, r, DataKind::RelayMonitorOn, |relays, i| {
        u8::from(relays.monitor_level(i))
    })
}

fn read_relay_control_on<S, H, K>(
    ctx: &mut Context<'_, S, H, K>,
    r: &mut PayloadReader<'_>,
) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    respond_indexed(ctx, r, DataKind::RelayControlOn, |relays, i| {
        u8::from(relays.control_level(i))
    })
}

// ---------------------------------------------------------------------------
// Controller settings
// ---------------------------------------------------------------------------

fn read_interrupt_pin<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let mut frame = Frame::response(DataKind::InterruptPin);
    frame.put_u8(ctx.store.settings().interrupt_pin)?;
    Ok(Reply::Written(frame))
}

fn set_interrupt_pin<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
    H: PinPort,
{
    let pin = r.u8()?;
    ctx.store.set_interrupt_pin(pin)?;
    reconfigure(ctx);
    Ok(Reply::Success)
}

fn read_switch_counting<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let mut frame = Frame::response(DataKind::SwitchCountingSettings);
    frame.put_bytes(&ctx.store.settings().switch_rate.to_bytes())?;
    Ok(Reply::Written(frame))
}

fn set_switch_counting<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let rate = SwitchRateSettings::from_bytes(r.array()?);
    let previous = ctx.store.settings().switch_rate;
    ctx.store.set_switch_rate(rate)?;
    if rate.interval_secs != previous.interval_secs {
        ctx.relays.reset_switch_counts(ctx.store.settings(), ctx.now_ms);
    }
    info!(
        "CMD: switch limit {} per {}s",
        rate.max_switches, rate.interval_secs
    );
    Ok(Reply::Success)
}

fn clear_switch_count<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let index = ctx.store.settings().check_index(r.u8()?)?;
    ctx.relays.clear_switch_count(index);
    Ok(Reply::Success)
}

fn read_state_fix<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let mut frame = Frame::response(DataKind::StateFixSettings);
    frame.put_bytes(&ctx.store.settings().self_heal.to_bytes())?;
    Ok(Reply::Written(frame))
}

fn set_state_fix<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let heal = SelfHealSettings::from_bytes(r.array()?);
    ctx.store.set_self_heal(heal)?;
    Ok(Reply::Success)
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

fn read_remote_timestamp<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode> {
    let mut frame = Frame::response(DataKind::RemoteTimestamp);
    frame.put_u32(ctx.time.host_epoch_at_sync())?;
    Ok(Reply::Written(frame))
}

fn set_remote_timestamp<S, H, K>(ctx: &mut Context<'_, S, H, K>, r: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode> {
    let epoch = r.u32()?;
    ctx.time.sync(ctx.now_ms, epoch);
    info!("CMD: time synced to {}", epoch);
    Ok(Reply::Success)
}

fn read_current_time<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode> {
    let mut frame = Frame::response(DataKind::CurrentTime);
    frame.put_u32(ctx.time.remote_now(ctx.now_ms))?;
    Ok(Reply::Written(frame))
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

fn read_version<S, H, K>(_: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode> {
    let mut frame = Frame::response(DataKind::Version);
    frame.put_u8(PROTOCOL_VERSION)?;
    Ok(Reply::Written(frame))
}

fn read_fix_data<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let n = ctx.store.settings().relay_count();
    let mut frame = Frame::response(DataKind::FixData);
    frame.put_u8(n as u8)?;
    for index in 0..n {
        let heal = ctx.relays.heal(index);
        frame.put_u8(heal.attempts())?;
        frame.put_u32(heal.last_attempt())?;
    }
    Ok(Reply::Written(frame))
}

/// Drains the log: records are gone once sent.
fn read_event_log<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode> {
    let log = ctx.relays.events_mut();
    let mut frame = Frame::response(DataKind::EventLog);
    frame.put_u8(log.len() as u8)?;
    for record in log.drain() {
        frame.put_u8(record.packed())?;
        frame.put_u32(record.timestamp)?;
    }
    Ok(Reply::Written(frame))
}

fn read_contact_wait<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode>
where
    S: StoragePort,
{
    let n = ctx.store.settings().relay_count();
    let mut frame = Frame::response(DataKind::ContactWaitData);
    frame.put_u8(n as u8)?;
    for index in 0..n {
        let debounce = ctx.relays.debounce(index);
        frame.put_u8(debounce.flags())?;
        frame.put_u32(debounce.wait_start_ms())?;
    }
    Ok(Reply::Written(frame))
}

fn read_cycle_statistics<S, H, K>(ctx: &mut Context<'_, S, H, K>, _: &mut PayloadReader<'_>) -> Result<Reply, ErrorCode> {
    let clamp = |ms: u32| ms.min(u32::from(u16::MAX)) as u16;
    let stats = ctx.stats;
    let mut frame = Frame::response(DataKind::CycleStatistics);
    frame.put_u16(clamp(stats.min_ms()))?;
    frame.put_u16(clamp(stats.max_ms()))?;
    frame.put_u16(clamp(stats.average_ms()))?;
    frame.put_u64(stats.cycles())?;
    Ok(Reply::Written(frame))
}
