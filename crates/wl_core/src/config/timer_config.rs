//! Attempt and break clock configuration

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_warnings"))]
pub struct TimerConfig {
    /// Ticker period (ms). Remaining time is always derived from wall-clock time.
    #[validate(range(min = 10, max = 1000))]
    pub tick_ms: u64,
    /// Clock for an athlete following another athlete (default: 60 s)
    #[validate(range(min = 1000))]
    pub attempt_ms: u64,
    /// Clock for an athlete following themself (default: 120 s)
    #[validate(range(min = 1000))]
    pub consecutive_attempt_ms: u64,
    /// First warning threshold (default: 90 s, only reached by a 2-minute clock)
    pub first_warning_ms: Option<u64>,
    /// Final warning threshold (default: 30 s)
    pub final_warning_ms: Option<u64>,
    /// Countdown used when a break is requested without a duration
    pub default_break_ms: u64,
    /// Intermission started automatically after the last snatch; `None` disables it
    pub snatch_cj_break_ms: Option<u64>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            attempt_ms: 60_000,
            consecutive_attempt_ms: 120_000,
            first_warning_ms: Some(90_000),
            final_warning_ms: Some(30_000),
            default_break_ms: 600_000,
            snatch_cj_break_ms: None,
        }
    }
}

fn validate_warnings(cfg: &TimerConfig) -> Result<(), ValidationError> {
    if let (Some(first), Some(last)) = (cfg.first_warning_ms, cfg.final_warning_ms) {
        if last >= first {
            return Err(ValidationError::new("final_warning_not_below_first_warning"));
        }
    }
    Ok(())
}
