//! Switch-rate limiting on a 16-bucket time wheel.
//!
//! The wheel spans twice the limiting interval, so one bucket is
//! `interval / 8`. Each relay keeps a FIFO of the buckets its recent
//! switches fell into, packed two 4-bit stamps per byte:
//!
//! ```text
//!  wheel   0 1 2 3 4 5 6 7 8 9 A B C D E F   (bucket = interval / 8)
//!                  ▲ current
//!  ring    [e0 e1][e2 e3]…                   oldest first, ≤ 20 stamps
//! ```
//!
//! A stamp is evicted once its age reaches 9 buckets. That keeps every
//! accepted switch inside the count for at least a full interval, so no
//! `interval`-long window ever holds more than `max` switches, and a full
//! limiter opens again within `interval + interval / 8`.
//!
//! Ages are computed modulo 16 against the bucket the wheel was at before
//! it advanced, and the millisecond clock is only ever differenced with
//! `wrapping_sub`, so neither the wheel nor the u32 clock wrapping can
//! make a live stamp look expired.

/// Buckets per wheel revolution.
pub const WHEEL_BUCKETS: u32 = 16;

/// Maximum stamps per relay.
pub const RING_DEPTH: usize = 20;

/// Stamps at least this many buckets old are outside the window.
const EXPIRED_AGE: u32 = WHEEL_BUCKETS / 2 + 1;

// ---------------------------------------------------------------------------
// SwitchWheel
// ---------------------------------------------------------------------------

/// Movement of the wheel since the previous advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelStep {
    pub from_bucket: u8,
    pub steps: u32,
}

/// The shared bucket clock all relay rings are stamped against.
#[derive(Debug, Clone)]
pub struct SwitchWheel {
    bucket: u8,
    bucket_start_ms: u32,
    width_ms: u32,
}

impl SwitchWheel {
    pub fn new(interval_secs: u16, now_ms: u32) -> Self {
        Self {
            bucket: 0,
            bucket_start_ms: now_ms,
            width_ms: (u32::from(interval_secs.max(1)) * 1000 / 8).max(1),
        }
    }

    pub fn bucket(&self) -> u8 {
        self.bucket
    }

    pub fn width_ms(&self) -> u32 {
        self.width_ms
    }

    /// Move the wheel to `now_ms`.
    pub fn advance(&mut self, now_ms: u32) -> WheelStep {
        let elapsed = now_ms.wrapping_sub(self.bucket_start_ms);
        let steps = elapsed / self.width_ms;
        let step = WheelStep {
            from_bucket: self.bucket,
            steps,
        };
        if steps > 0 {
            self.bucket_start_ms = self.bucket_start_ms.wrapping_add(steps * self.width_ms);
            self.bucket = ((u32::from(self.bucket) + steps) % WHEEL_BUCKETS) as u8;
        }
        step
    }
}

// ---------------------------------------------------------------------------
// SwitchLimiter
// ---------------------------------------------------------------------------

/// Per-relay ring of nibble-packed bucket stamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchLimiter {
    packed: [u8; RING_DEPTH / 2],
    head: u8,
    len: u8,
}

impl SwitchLimiter {
    fn stamp(&self, slot: usize) -> u8 {
        let byte = self.packed[slot / 2];
        if slot % 2 == 0 { byte & 0x0F } else { byte >> 4 }
    }

    fn set_stamp(&mut self, slot: usize, bucket: u8) {
        let byte = &mut self.packed[slot / 2];
        *byte = if slot % 2 == 0 {
            (*byte & 0xF0) | (bucket & 0x0F)
        } else {
            (*byte & 0x0F) | (bucket << 4)
        };
    }

    /// Switches currently inside the window.
    pub fn count(&self) -> u8 {
        self.len
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Evict stamps that aged out during `step`.
    pub fn update(&mut self, step: WheelStep) {
        if step.steps == 0 {
            return;
        }
        if step.steps >= EXPIRED_AGE {
            self.clear();
            return;
        }
        while self.len > 0 {
            let oldest = self.stamp(self.head as usize);
            let age = u32::from(step.from_bucket.wrapping_sub(oldest) & 0x0F) + step.steps;
            if age < EXPIRED_AGE {
                break;
            }
            self.head = ((self.head as usize + 1) % RING_DEPTH) as u8;
            self.len -= 1;
        }
    }

    /// Record a switch in `bucket` unless `max` switches are already in the
    /// window. `max == 0` never refuses.
    pub fn try_add(&mut self, bucket: u8, max: u8) -> bool {
        if max > 0 && self.len >= max {
            return false;
        }
        if self.len as usize == RING_DEPTH {
            // Unlimited mode: keep the newest stamps only.
            self.head = ((self.head as usize + 1) % RING_DEPTH) as u8;
            self.len -= 1;
        }
        let slot = (self.head as usize + self.len as usize) % RING_DEPTH;
        self.set_stamp(slot, bucket);
        self.len += 1;
        true
    }
}
