//! Referee decision protocol.
//!
//! Three referees vote good/bad on the attempt in progress:
//!
//! ```text
//! first vote ──► (two agree) ──► DownSignal ──► third vote or grace ──► Decision
//!                                   │
//!                 referee timeout ──┴──► policy: wait / notify / resolve
//! ```
//!
//! The aggregator is polled by the owning field of play on every timer tick;
//! it never schedules anything on its own.

mod jury;

pub use jury::JuryPanel;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

use crate::config::{DecisionConfig, RefereeTimeoutPolicy};

pub const REFEREE_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Good,
    Bad,
}

impl Vote {
    pub fn from_good(good: bool) -> Self {
        if good {
            Vote::Good
        } else {
            Vote::Bad
        }
    }

    pub fn is_good(self) -> bool {
        self == Vote::Good
    }
}

/// Referee votes indexed 0..3 (referee 1 is index 0).
pub type Votes = [Option<Vote>; REFEREE_COUNT];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionSignal {
    DownSignal { good: bool },
    Decision { good: bool, votes: Votes },
    /// Referees (1-based) that have not voted when the timeout elapsed.
    RefereeTimeout { missing: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteRejection {
    #[error("referee {0} is not 1, 2 or 3")]
    UnknownReferee(u8),

    #[error("decision already published")]
    AlreadyDecided,

    #[error("vote locked after the down signal")]
    Locked,
}

#[derive(Debug, Clone)]
pub struct DecisionAggregator {
    votes: Votes,
    first_vote_at: Option<Instant>,
    down_at: Option<Instant>,
    published: Option<bool>,
    timeout_reported: bool,
    grace_ms: u64,
    timeout_ms: Option<u64>,
    policy: RefereeTimeoutPolicy,
}

impl DecisionAggregator {
    pub fn new(config: &DecisionConfig) -> Self {
        Self {
            votes: [None; REFEREE_COUNT],
            first_vote_at: None,
            down_at: None,
            published: None,
            timeout_reported: false,
            grace_ms: config.grace_ms,
            timeout_ms: config.referee_timeout_ms,
            policy: config.timeout_policy,
        }
    }

    pub fn votes(&self) -> Votes {
        self.votes
    }

    pub fn decision(&self) -> Option<bool> {
        self.published
    }

    /// Votes are present but no decision has been published.
    pub fn is_pending(&self) -> bool {
        self.published.is_none() && self.votes.iter().any(Option::is_some)
    }

    #[cfg(test)]
    fn down_signaled(&self) -> bool {
        self.down_at.is_some()
    }

    /// `referee` is 1-based. A repeated identical vote is accepted silently.
    pub fn record_vote(
        &mut self,
        referee: u8,
        vote: Vote,
        now: Instant,
    ) -> Result<Vec<DecisionSignal>, VoteRejection> {
        let idx = match referee {
            1..=3 => usize::from(referee) - 1,
            other => return Err(VoteRejection::UnknownReferee(other)),
        };
        if self.votes[idx] == Some(vote) {
            return Ok(Vec::new());
        }
        if self.published.is_some() {
            return Err(VoteRejection::AlreadyDecided);
        }
        if self.down_at.is_some() && self.votes[idx].is_some() {
            return Err(VoteRejection::Locked);
        }

        self.votes[idx] = Some(vote);
        self.first_vote_at.get_or_insert(now);

        let mut signals = Vec::new();
        if let Some(good) = self.majority() {
            if self.down_at.is_none() {
                self.down_at = Some(now);
                signals.push(DecisionSignal::DownSignal { good });
            }
            if self.votes.iter().all(Option::is_some) {
                signals.push(self.publish(good));
            }
        }
        Ok(signals)
    }

    /// Grace period and referee timeout handling.
    pub fn poll(&mut self, now: Instant) -> Vec<DecisionSignal> {
        let mut signals = Vec::new();
        if self.published.is_some() {
            return signals;
        }

        if let (Some(down_at), Some(good)) = (self.down_at, self.majority()) {
            if elapsed_ms(down_at, now) >= self.grace_ms {
                signals.push(self.publish(good));
            }
            return signals;
        }

        let (Some(timeout), Some(first)) = (self.timeout_ms, self.first_vote_at) else {
            return signals;
        };
        if self.timeout_reported || elapsed_ms(first, now) < timeout {
            return signals;
        }
        self.timeout_reported = true;
        match self.policy {
            RefereeTimeoutPolicy::Wait => {}
            RefereeTimeoutPolicy::Notify => {
                signals.push(DecisionSignal::RefereeTimeout { missing: self.missing() });
            }
            RefereeTimeoutPolicy::ResolveWithAvailable => {
                signals.push(DecisionSignal::RefereeTimeout { missing: self.missing() });
                let good_votes = self.count(Vote::Good);
                let bad_votes = self.count(Vote::Bad);
                signals.push(self.publish(good_votes > bad_votes && good_votes >= 2));
            }
        }
        signals
    }

    pub fn reset(&mut self) {
        self.votes = [None; REFEREE_COUNT];
        self.first_vote_at = None;
        self.down_at = None;
        self.published = None;
        self.timeout_reported = false;
    }

    fn publish(&mut self, good: bool) -> DecisionSignal {
        self.published = Some(good);
        DecisionSignal::Decision { good, votes: self.votes }
    }

    fn count(&self, vote: Vote) -> usize {
        self.votes.iter().filter(|v| **v == Some(vote)).count()
    }

    fn majority(&self) -> Option<bool> {
        if self.count(Vote::Good) >= 2 {
            Some(true)
        } else if self.count(Vote::Bad) >= 2 {
            Some(false)
        } else {
            None
        }
    }

    fn missing(&self) -> Vec<u8> {
        (1u8..=3).zip(self.votes.iter()).filter(|(_, v)| v.is_none()).map(|(r, _)| r).collect()
    }
}

fn elapsed_ms(since: Instant, now: Instant) -> u64 {
    u64::try_from(now.saturating_duration_since(since).as_millis()).unwrap_or(u64::MAX)
}
