//! Countdown clock for attempts and breaks.
//!
//! The remaining time is never decremented per tick. It is derived from the
//! wall-clock time elapsed since the last `start`/`resume`, so a delayed tick
//! (scheduler stall, long GC-style pause on the host) only delays *when* a
//! threshold is noticed, never *how much* time is left.

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::TimerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    FirstWarning,
    FinalWarning,
}

/// Something the clock noticed while being polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    Warning { kind: WarningKind, remaining_ms: u64 },
    Expired,
}

#[derive(Debug, Clone)]
pub struct CountdownTimer {
    /// Remaining time as of `started_at` (or frozen value when stopped).
    remaining_ms: u64,
    started_at: Option<Instant>,
    thresholds: Vec<(WarningKind, u64)>,
    /// Remaining time seen by the previous poll, for threshold crossing.
    last_seen_ms: u64,
    expired: bool,
}

impl CountdownTimer {
    pub fn new(thresholds: Vec<(WarningKind, u64)>) -> Self {
        Self { remaining_ms: 0, started_at: None, thresholds, last_seen_ms: 0, expired: false }
    }

    /// Attempt clock with the configured warnings.
    pub fn attempt_clock(config: &TimerConfig) -> Self {
        let mut thresholds = Vec::new();
        if let Some(ms) = config.first_warning_ms {
            thresholds.push((WarningKind::FirstWarning, ms));
        }
        if let Some(ms) = config.final_warning_ms {
            thresholds.push((WarningKind::FinalWarning, ms));
        }
        thresholds.sort_by(|a, b| b.1.cmp(&a.1));
        Self::new(thresholds)
    }

    /// Break clock: no warnings, only expiry.
    pub fn break_clock() -> Self {
        Self::new(Vec::new())
    }

    /// Reset to `duration_ms` and run.
    pub fn start(&mut self, duration_ms: u64, now: Instant) {
        self.set_time_remaining(duration_ms, now);
        self.resume(now);
    }

    /// Run from the last recorded remaining time. No-op when already running.
    pub fn resume(&mut self, now: Instant) -> u64 {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.remaining_at(now)
    }

    /// Freeze and return the remaining time. Idempotent.
    pub fn stop(&mut self, now: Instant) -> u64 {
        if self.started_at.is_some() {
            self.remaining_ms = self.remaining_at(now);
            self.started_at = None;
        }
        self.remaining_ms
    }

    /// Replace the remaining time; a running clock keeps running from `now`.
    pub fn set_time_remaining(&mut self, ms: u64, now: Instant) {
        self.remaining_ms = ms;
        self.last_seen_ms = ms;
        self.expired = ms == 0;
        if self.started_at.is_some() {
            self.started_at = Some(now);
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn remaining_at(&self, now: Instant) -> u64 {
        match self.started_at {
            Some(started) => {
                let elapsed = now.saturating_duration_since(started).as_millis();
                let elapsed = u64::try_from(elapsed).unwrap_or(u64::MAX);
                self.remaining_ms.saturating_sub(elapsed)
            }
            None => self.remaining_ms,
        }
    }

    /// Report thresholds crossed since the previous poll, and the zero crossing.
    /// On expiry the clock stops at zero.
    pub fn poll(&mut self, now: Instant) -> Vec<TimerSignal> {
        let mut signals = Vec::new();
        if !self.is_running() {
            return signals;
        }
        let current = self.remaining_at(now);
        for (kind, threshold) in &self.thresholds {
            if self.last_seen_ms > *threshold && current <= *threshold {
                signals.push(TimerSignal::Warning { kind: *kind, remaining_ms: current });
            }
        }
        self.last_seen_ms = current;
        if current == 0 && !self.expired {
            self.expired = true;
            self.remaining_ms = 0;
            self.started_at = None;
            signals.push(TimerSignal::Expired);
        }
        signals
    }
}
