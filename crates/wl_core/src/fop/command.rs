//! Inbound commands of a field of play.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{BreakType, CeremonyType};
use crate::bridge::DeviceRole;
use crate::decision::Vote;
use crate::models::{AthleteId, GroupId};

/// Everything that can change a field of play, whatever its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FopCommand {
    SwitchGroup {
        group: GroupId,
    },
    StartLifting,
    TimeStarted,
    TimeStopped,
    /// Operator sets the stopped clock.
    ForceTime {
        remaining_ms: u64,
    },
    Declaration {
        athlete: AthleteId,
        weight: u32,
    },
    WeightChange {
        athlete: AthleteId,
        weight: u32,
    },
    DecisionUpdate {
        /// 1..=3
        referee: u8,
        vote: Vote,
        /// Attempt token echoed by devices; stale votes are rejected.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attempt_seq: Option<u64>,
    },
    ResetDecisions,
    JuryMemberVote {
        member: u8,
        vote: Vote,
    },
    JuryDecision {
        vote: Vote,
    },
    SummonReferee {
        referee: u8,
    },
    BreakRequested {
        break_type: BreakType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
    BreakEnd,
    CeremonyStart {
        ceremony: CeremonyType,
    },
    CeremonyEnd {
        ceremony: CeremonyType,
    },
    DeviceStatus {
        role: DeviceRole,
        stale: bool,
    },
    TimerTick,
}

impl FopCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            FopCommand::SwitchGroup { .. } => "switch_group",
            FopCommand::StartLifting => "start_lifting",
            FopCommand::TimeStarted => "time_started",
            FopCommand::TimeStopped => "time_stopped",
            FopCommand::ForceTime { .. } => "force_time",
            FopCommand::Declaration { .. } => "declaration",
            FopCommand::WeightChange { .. } => "weight_change",
            FopCommand::DecisionUpdate { .. } => "decision_update",
            FopCommand::ResetDecisions => "reset_decisions",
            FopCommand::JuryMemberVote { .. } => "jury_member_vote",
            FopCommand::JuryDecision { .. } => "jury_decision",
            FopCommand::SummonReferee { .. } => "summon_referee",
            FopCommand::BreakRequested { .. } => "break_requested",
            FopCommand::BreakEnd => "break_end",
            FopCommand::CeremonyStart { .. } => "ceremony_start",
            FopCommand::CeremonyEnd { .. } => "ceremony_end",
            FopCommand::DeviceStatus { .. } => "device_status",
            FopCommand::TimerTick => "timer_tick",
        }
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(FopCommand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_serde_tag() {
        let commands = vec![
            FopCommand::StartLifting,
            FopCommand::WeightChange { athlete: AthleteId(3), weight: 101 },
            FopCommand::DecisionUpdate { referee: 2, vote: Vote::Good, attempt_seq: Some(4) },
            FopCommand::BreakRequested { break_type: BreakType::Jury, duration_ms: None },
            FopCommand::TimerTick,
        ];
        for command in commands {
            let value = serde_json::to_value(&command).unwrap();
            assert_eq!(value["type"], command.kind());
        }
    }

    #[test]
    fn test_parse_operator_json() {
        let command: FopCommand =
            serde_json::from_str(r#"{"type":"decision_update","referee":1,"vote":"bad"}"#).unwrap();
        assert_eq!(
            command,
            FopCommand::DecisionUpdate { referee: 1, vote: Vote::Bad, attempt_seq: None }
        );
    }
}
