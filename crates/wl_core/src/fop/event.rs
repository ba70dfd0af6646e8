//! Outbound events and the resynchronization snapshot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{BreakType, CeremonyType, FopState};
use crate::bridge::DeviceRole;
use crate::decision::{Vote, Votes};
use crate::models::{AthleteId, AttemptRef, GroupId, PlatformId, RecordEvent};
use crate::timer::WarningKind;

/// The attempt on the platform (or about to be).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CurrentAttempt {
    pub athlete: AthleteId,
    pub name: String,
    pub attempt: AttemptRef,
    pub weight: u32,
    /// Token identifying this attempt; bumped on every decision reset.
    pub attempt_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FopEvent {
    SwitchGroup {
        group: GroupId,
    },
    LiftingOrderUpdated {
        order: Vec<AthleteId>,
        current: Option<CurrentAttempt>,
        next: Option<AthleteId>,
    },
    BreakStarted {
        break_type: BreakType,
        remaining_ms: Option<u64>,
    },
    BreakDone {
        break_type: BreakType,
    },
    BreakTimeOver {
        break_type: BreakType,
    },
    CeremonyStarted {
        ceremony: CeremonyType,
    },
    CeremonyDone {
        ceremony: CeremonyType,
    },
    SetTime {
        remaining_ms: u64,
    },
    StartTime {
        remaining_ms: u64,
    },
    StopTime {
        remaining_ms: u64,
    },
    TimerWarning {
        kind: WarningKind,
        remaining_ms: u64,
    },
    TimeExpired,
    DownSignal {
        good: bool,
    },
    Decision {
        athlete: AthleteId,
        attempt: AttemptRef,
        weight: u32,
        good: bool,
        votes: Votes,
    },
    /// Jury reversal of an already published decision.
    DecisionCorrected {
        athlete: AthleteId,
        attempt: AttemptRef,
        good: bool,
    },
    DecisionReset,
    /// Votes were pending when the group was switched or the platform shut down.
    DecisionIncomplete {
        athlete: Option<AthleteId>,
        votes: Votes,
    },
    RefereeTimeout {
        missing: Vec<u8>,
    },
    JuryVotesComplete {
        votes: Vec<Vote>,
    },
    JuryNotification {
        athlete: AthleteId,
        attempt: AttemptRef,
        good: bool,
        reversal: bool,
        /// The lift as ruled by the jury stands as a record.
        new_record: bool,
    },
    SummonReferee {
        referee: u8,
    },
    Record {
        record: RecordEvent,
    },
    GroupDone {
        group: GroupId,
    },
    VideoRefresh,
    DeviceStale {
        role: DeviceRole,
        stale: bool,
    },
    PersistFailed {
        athlete: Option<AthleteId>,
        reason: String,
    },
    CommandRejected {
        command: String,
        state: FopState,
        reason: String,
    },
}

/// Full state for late-attaching displays and devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FopSnapshot {
    pub platform: PlatformId,
    pub state: FopState,
    pub break_type: Option<BreakType>,
    pub ceremony: Option<CeremonyType>,
    pub group: Option<GroupId>,
    pub order: Vec<AthleteId>,
    pub current: Option<CurrentAttempt>,
    pub clock_remaining_ms: u64,
    pub clock_running: bool,
    pub break_remaining_ms: u64,
    pub votes: Votes,
    pub attempt_seq: u64,
}
