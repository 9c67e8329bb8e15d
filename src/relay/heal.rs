//! Self-heal bookkeeping: how many nudges have been tried for the current
//! mismatch episode, and when the relay was last touched.

use crate::config::SelfHealSettings;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealState {
    attempts: u8,
    /// Last explicit command or nudge, local ms.
    reference_ms: u32,
    /// Remote-epoch time of the last nudge, 0 if none.
    last_attempt: u32,
}

impl HealState {
    /// Start a new episode; called whenever the relay is commanded.
    pub fn reset(&mut self, now_ms: u32) {
        self.attempts = 0;
        self.reference_ms = now_ms;
    }

    pub fn should_nudge(&self, settings: &SelfHealSettings, now_ms: u32) -> bool {
        settings.max_attempts > 0
            && self.attempts < settings.max_attempts
            && now_ms.wrapping_sub(self.reference_ms) >= u32::from(settings.min_wait_secs) * 1000
    }

    /// Count a nudge. Returns the attempt number.
    pub fn record(&mut self, now_ms: u32, timestamp: u32) -> u8 {
        self.attempts = self.attempts.saturating_add(1);
        self.reference_ms = now_ms;
        self.last_attempt = timestamp;
        self.attempts
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn last_attempt(&self) -> u32 {
        self.last_attempt
    }
}
