//! Referee decision configuration

use serde::{Deserialize, Serialize};
use validator::Validate;

/// What happens when a referee has not voted within `referee_timeout_ms`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefereeTimeoutPolicy {
    /// Keep waiting silently.
    Wait,
    /// Publish a reminder naming the missing referees, keep waiting.
    #[default]
    Notify,
    /// Publish the reminder, then decide by majority of the votes received
    /// (a tie or a single vote resolves to no lift).
    ResolveWithAvailable,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DecisionConfig {
    /// Wait for the third referee after two agree (default: 3 s)
    #[validate(range(max = 30000))]
    pub grace_ms: u64,
    /// How long a decision stays visible before the automatic reset (default: 3 s)
    #[validate(range(min = 100, max = 60000))]
    pub display_ms: u64,
    /// Time after the first vote before missing referees are handled; `None` waits forever
    pub referee_timeout_ms: Option<u64>,
    pub timeout_policy: RefereeTimeoutPolicy,
    /// Number of jury members voting on a review
    #[validate(range(min = 3, max = 5))]
    pub jury_size: u8,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            grace_ms: 3_000,
            display_ms: 3_000,
            referee_timeout_ms: None,
            timeout_policy: RefereeTimeoutPolicy::Notify,
            jury_size: 5,
        }
    }
}
