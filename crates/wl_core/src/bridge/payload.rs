//! Text payloads exchanged with devices.
//!
//! Inbound, per role:
//!
//! | role       | payload                                   | command            |
//! |------------|-------------------------------------------|--------------------|
//! | any        | `ping`                                    | heartbeat only     |
//! | referee    | `<1-3> good\|bad [attempt_seq]`           | `DecisionUpdate`   |
//! | jury       | `<member> good\|bad`                      | `JuryMemberVote`   |
//! | jury       | `decision good\|bad`                      | `JuryDecision`     |
//! | jury       | `summon <1-3>`                            | `SummonReferee`    |
//! | jury       | `break`                                   | jury break         |
//! | timekeeper | `start`, `stop`, `set <ms>`               | clock commands     |

use thiserror::Error;

use super::DeviceRole;
use crate::decision::{Vote, Votes};
use crate::fop::{BreakType, FopCommand, FopEvent};
use crate::timer::WarningKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// Keeps the device from being reported stale; no command.
    Heartbeat,
    Command(FopCommand),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("empty payload")]
    Empty,

    #[error("unrecognized {role} payload {payload:?}")]
    Unrecognized { role: DeviceRole, payload: String },

    #[error("invalid number {0:?}")]
    InvalidNumber(String),
}

fn number<T: std::str::FromStr>(s: &str) -> Result<T, PayloadError> {
    s.parse().map_err(|_| PayloadError::InvalidNumber(s.to_string()))
}

fn vote(s: &str) -> Option<Vote> {
    match s {
        "good" => Some(Vote::Good),
        "bad" => Some(Vote::Bad),
        _ => None,
    }
}

pub fn parse_inbound(role: DeviceRole, payload: &str) -> Result<DeviceMessage, PayloadError> {
    let words: Vec<&str> = payload.split_whitespace().collect();
    let unrecognized = || PayloadError::Unrecognized { role, payload: payload.to_string() };
    let command = match (role, words.as_slice()) {
        (_, []) => return Err(PayloadError::Empty),
        (_, ["ping"]) => return Ok(DeviceMessage::Heartbeat),

        (DeviceRole::Referee, [referee, v, rest @ ..]) if rest.len() <= 1 => {
            let vote = vote(v).ok_or_else(unrecognized)?;
            let attempt_seq = rest.first().map(|s| number(s)).transpose()?;
            FopCommand::DecisionUpdate { referee: number(referee)?, vote, attempt_seq }
        }

        (DeviceRole::Jury, ["decision", v]) => {
            FopCommand::JuryDecision { vote: vote(v).ok_or_else(unrecognized)? }
        }
        (DeviceRole::Jury, ["summon", referee]) => {
            FopCommand::SummonReferee { referee: number(referee)? }
        }
        (DeviceRole::Jury, ["break"]) => {
            FopCommand::BreakRequested { break_type: BreakType::Jury, duration_ms: None }
        }
        (DeviceRole::Jury, [member, v]) => {
            FopCommand::JuryMemberVote { member: number(member)?, vote: vote(v).ok_or_else(unrecognized)? }
        }

        (DeviceRole::Timekeeper, ["start"]) => FopCommand::TimeStarted,
        (DeviceRole::Timekeeper, ["stop"]) => FopCommand::TimeStopped,
        (DeviceRole::Timekeeper, ["set", ms]) => FopCommand::ForceTime { remaining_ms: number(ms)? },

        _ => return Err(unrecognized()),
    };
    Ok(DeviceMessage::Command(command))
}

fn good_bad(good: bool) -> &'static str {
    if good {
        "good"
    } else {
        "bad"
    }
}

fn lights(votes: &Votes) -> String {
    votes
        .iter()
        .map(|v| match v {
            Some(Vote::Good) => "g",
            Some(Vote::Bad) => "b",
            None => "-",
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Device messages driven by one engine event. Most events concern displays
/// only and produce nothing.
pub fn encode_outbound(event: &FopEvent) -> Vec<(DeviceRole, String)> {
    match event {
        FopEvent::DownSignal { good } => vec![
            (DeviceRole::Buzzer, "down".to_string()),
            (DeviceRole::Referee, format!("down {}", good_bad(*good))),
        ],
        FopEvent::Decision { good, votes, .. } => {
            let payload = format!("decision {} {}", good_bad(*good), lights(votes));
            vec![(DeviceRole::Referee, payload.clone()), (DeviceRole::Jury, payload)]
        }
        FopEvent::DecisionReset => vec![
            (DeviceRole::Referee, "reset".to_string()),
            (DeviceRole::Jury, "reset".to_string()),
        ],
        FopEvent::RefereeTimeout { missing } => {
            let referees: Vec<String> = missing.iter().map(u8::to_string).collect();
            vec![(DeviceRole::Referee, format!("remind {}", referees.join(" ")))]
        }
        FopEvent::SummonReferee { referee } => {
            vec![(DeviceRole::Referee, format!("summon {referee}"))]
        }
        FopEvent::JuryNotification { good, reversal, .. } => {
            let ruling = if *reversal { "reversed" } else { "confirmed" };
            vec![(DeviceRole::Jury, format!("ruling {} {}", good_bad(*good), ruling))]
        }
        FopEvent::SetTime { remaining_ms } => {
            vec![(DeviceRole::Timekeeper, format!("set {remaining_ms}"))]
        }
        FopEvent::StartTime { remaining_ms } => {
            vec![(DeviceRole::Timekeeper, format!("start {remaining_ms}"))]
        }
        FopEvent::StopTime { remaining_ms } => {
            vec![(DeviceRole::Timekeeper, format!("stop {remaining_ms}"))]
        }
        FopEvent::TimerWarning { kind, .. } => {
            let which = match kind {
                WarningKind::FirstWarning => "first",
                WarningKind::FinalWarning => "final",
            };
            vec![(DeviceRole::Buzzer, format!("warning {which}"))]
        }
        FopEvent::TimeExpired => vec![
            (DeviceRole::Buzzer, "expired".to_string()),
            (DeviceRole::Timekeeper, "expired".to_string()),
        ],
        FopEvent::BreakStarted { remaining_ms: Some(ms), .. } => {
            vec![(DeviceRole::Timekeeper, format!("break {ms}"))]
        }
        FopEvent::BreakStarted { remaining_ms: None, .. } => {
            vec![(DeviceRole::Timekeeper, "break".to_string())]
        }
        FopEvent::BreakDone { .. } => vec![(DeviceRole::Timekeeper, "break done".to_string())],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AthleteId, AttemptRef, LiftType};

    fn command(role: DeviceRole, payload: &str) -> FopCommand {
        match parse_inbound(role, payload) {
            Ok(DeviceMessage::Command(command)) => command,
            other => panic!("{payload:?} gave {other:?}"),
        }
    }

    fn render(event: FopEvent) -> String {
        encode_outbound(&event)
            .into_iter()
            .map(|(role, payload)| format!("{role}: {payload}"))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    #[test]
    fn test_referee_payloads() {
        assert_eq!(
            command(DeviceRole::Referee, "2 good"),
            FopCommand::DecisionUpdate { referee: 2, vote: Vote::Good, attempt_seq: None }
        );
        assert_eq!(
            command(DeviceRole::Referee, " 3  bad 17 "),
            FopCommand::DecisionUpdate { referee: 3, vote: Vote::Bad, attempt_seq: Some(17) }
        );
        assert!(matches!(
            parse_inbound(DeviceRole::Referee, "x good"),
            Err(PayloadError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_inbound(DeviceRole::Referee, "1 maybe"),
            Err(PayloadError::Unrecognized { .. })
        ));
        assert!(parse_inbound(DeviceRole::Referee, "1 good 2 3").is_err());
    }

    #[test]
    fn test_jury_and_timekeeper_payloads() {
        assert_eq!(
            command(DeviceRole::Jury, "4 bad"),
            FopCommand::JuryMemberVote { member: 4, vote: Vote::Bad }
        );
        assert_eq!(command(DeviceRole::Jury, "decision good"), FopCommand::JuryDecision { vote: Vote::Good });
        assert_eq!(command(DeviceRole::Jury, "summon 1"), FopCommand::SummonReferee { referee: 1 });
        assert_eq!(command(DeviceRole::Timekeeper, "stop"), FopCommand::TimeStopped);
        assert_eq!(command(DeviceRole::Timekeeper, "set 45000"), FopCommand::ForceTime { remaining_ms: 45_000 });
        // a timekeeper cannot vote
        assert!(parse_inbound(DeviceRole::Timekeeper, "1 good").is_err());
    }

    #[test]
    fn test_heartbeat_and_empty() {
        assert_eq!(parse_inbound(DeviceRole::Buzzer, "ping"), Ok(DeviceMessage::Heartbeat));
        assert_eq!(parse_inbound(DeviceRole::Referee, "   "), Err(PayloadError::Empty));
        assert!(parse_inbound(DeviceRole::Buzzer, "down").is_err());
    }

    #[test]
    fn test_outbound_decision_lights() {
        let event = FopEvent::Decision {
            athlete: AthleteId(1),
            attempt: AttemptRef::new(LiftType::Snatch, 1),
            weight: 80,
            good: true,
            votes: [Some(Vote::Good), Some(Vote::Bad), Some(Vote::Good)],
        };
        insta::assert_snapshot!(render(event), @"referee: decision good g b g | jury: decision good g b g");
    }

    #[test]
    fn test_outbound_clock_and_buzzer() {
        insta::assert_snapshot!(render(FopEvent::StopTime { remaining_ms: 58_000 }), @"timekeeper: stop 58000");
        insta::assert_snapshot!(render(FopEvent::DownSignal { good: false }), @"buzzer: down | referee: down bad");
        insta::assert_snapshot!(
            render(FopEvent::TimerWarning { kind: WarningKind::FinalWarning, remaining_ms: 30_000 }),
            @"buzzer: warning final"
        );
        insta::assert_snapshot!(render(FopEvent::RefereeTimeout { missing: vec![1, 3] }), @"referee: remind 1 3");
        assert!(encode_outbound(&FopEvent::VideoRefresh).is_empty());
    }
}
