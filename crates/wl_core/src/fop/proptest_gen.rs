//! Property-based test generators for field-of-play command streams.
//!
//! Strategies produce plausible (and some implausible) operator, referee and
//! jury input; the properties below check the state graph and that two
//! platforms never observe each other.

use std::sync::Arc;

use super::*;
use crate::config::EngineConfig;
use crate::decision::Vote;
use crate::models::AthleteId;
use crate::providers::{InMemoryStore, Providers};
use crate::timer::ManualClock;
use proptest::prelude::*;

/// One input to a field of play: a command, or time passing followed by a tick.
#[derive(Debug, Clone)]
pub enum Step {
    Command(FopCommand),
    Advance(u64),
}

pub fn vote_strategy() -> impl Strategy<Value = Vote> {
    prop_oneof![3 => Just(Vote::Good), 2 => Just(Vote::Bad)]
}

pub fn break_type_strategy() -> impl Strategy<Value = BreakType> {
    prop_oneof![
        Just(BreakType::BeforeIntroduction),
        Just(BreakType::FirstSnatch),
        Just(BreakType::FirstCj),
        Just(BreakType::Technical),
        Just(BreakType::Jury),
        Just(BreakType::Marshal),
        Just(BreakType::Challenge),
    ]
}

pub fn ceremony_strategy() -> impl Strategy<Value = CeremonyType> {
    prop_oneof![
        Just(CeremonyType::Introduction),
        Just(CeremonyType::OfficialsIntroduction),
        Just(CeremonyType::Medals),
    ]
}

/// Commands for a platform whose group holds `athletes`, with weights drawn
/// around `weights`.
pub fn command_strategy(
    group: &'static str,
    athletes: std::ops::RangeInclusive<u32>,
    weights: std::ops::RangeInclusive<u32>,
) -> impl Strategy<Value = FopCommand> {
    prop_oneof![
        6 => (1u8..=3, vote_strategy()).prop_map(|(referee, vote)| FopCommand::DecisionUpdate {
            referee,
            vote,
            attempt_seq: None,
        }),
        3 => Just(FopCommand::TimeStarted),
        2 => Just(FopCommand::StartLifting),
        1 => Just(FopCommand::TimeStopped),
        1 => (0u64..=120_000).prop_map(|remaining_ms| FopCommand::ForceTime { remaining_ms }),
        2 => (athletes.clone(), weights.clone())
            .prop_map(|(id, weight)| FopCommand::Declaration { athlete: AthleteId(id), weight }),
        2 => (athletes, weights)
            .prop_map(|(id, weight)| FopCommand::WeightChange { athlete: AthleteId(id), weight }),
        1 => Just(FopCommand::ResetDecisions),
        1 => (1u8..=5, vote_strategy())
            .prop_map(|(member, vote)| FopCommand::JuryMemberVote { member, vote }),
        1 => vote_strategy().prop_map(|vote| FopCommand::JuryDecision { vote }),
        1 => (break_type_strategy(), prop::option::of(1_000u64..=30_000)).prop_map(
            |(break_type, duration_ms)| FopCommand::BreakRequested { break_type, duration_ms }
        ),
        2 => Just(FopCommand::BreakEnd),
        1 => ceremony_strategy().prop_map(|ceremony| FopCommand::CeremonyStart { ceremony }),
        1 => ceremony_strategy().prop_map(|ceremony| FopCommand::CeremonyEnd { ceremony }),
        1 => Just(FopCommand::SwitchGroup { group: group.into() }),
    ]
}

pub fn advance_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![8 => 100u64..=4_000, 1 => 30_000u64..=70_000]
}

pub fn step_strategy(
    group: &'static str,
    athletes: std::ops::RangeInclusive<u32>,
    weights: std::ops::RangeInclusive<u32>,
) -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => command_strategy(group, athletes, weights).prop_map(Step::Command),
        1 => advance_strategy().prop_map(Step::Advance),
    ]
}

/// Steps for platform A (group A1, athletes 1..=3; id 4 belongs to B).
pub fn platform_a_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(step_strategy("A1", 1..=4, 75..=110), 1..120)
}

/// Steps for platform B (group B1, athletes 4..=6).
pub fn platform_b_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(step_strategy("B1", 4..=6, 115..=170), 1..120)
}

fn field_of_play(platform: &str, store: &Arc<InMemoryStore>, clock: &ManualClock) -> FieldOfPlay {
    let mut fop = FieldOfPlay::new(
        platform.into(),
        EngineConfig::default(),
        Providers::in_memory(store.clone()),
        Arc::new(clock.clone()),
    );
    let group = if platform == "A" { "A1" } else { "B1" };
    fop.submit(FopCommand::SwitchGroup { group: group.into() });
    fop.submit(FopCommand::StartLifting);
    fop
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn new_store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new(fixtures::competition()))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn test_state_graph_holds_for_any_command_stream(steps in platform_a_steps()) {
            let clock = ManualClock::new();
            let store = new_store();
            let mut fop = field_of_play("A", &store, &clock);
            let mut decisions_since_reset = 0;

            for step in steps {
                let before = fop.state();
                let events = match step {
                    Step::Command(command) => fop.submit(command),
                    Step::Advance(ms) => {
                        clock.advance(ms);
                        fop.submit(FopCommand::TimerTick)
                    }
                };
                let after = fop.state();

                prop_assert!(
                    FopStateValidator::validate_transition(before, after).is_ok(),
                    "{:?} -> {:?}", before, after
                );
                prop_assert_eq!(fop.clock_running(), after == FopState::TimeRunning);
                prop_assert_eq!(fop.break_type().is_some(), after == FopState::Break);
                if after.is_lifting() {
                    prop_assert!(fop.current().is_some(), "lifting with nobody on the platform");
                }

                for event in &events {
                    match event {
                        FopEvent::Decision { .. } => {
                            decisions_since_reset += 1;
                            prop_assert!(decisions_since_reset <= 1, "two decisions for one attempt");
                        }
                        FopEvent::DecisionReset | FopEvent::SwitchGroup { .. } => {
                            decisions_since_reset = 0;
                        }
                        _ => {}
                    }
                }
            }
        }

        #[test]
        fn test_platforms_do_not_observe_each_other(
            a_steps in platform_a_steps(),
            b_steps in platform_b_steps(),
            pick_a in prop::collection::vec(any::<bool>(), 240),
        ) {
            // solo run of platform A
            let solo_clock = ManualClock::new();
            let solo_store = new_store();
            let mut solo = field_of_play("A", &solo_store, &solo_clock);
            let mut solo_events = Vec::new();
            for step in &a_steps {
                match step {
                    Step::Command(command) => solo_events.extend(solo.submit(command.clone())),
                    Step::Advance(ms) => {
                        solo_clock.advance(*ms);
                        solo_events.extend(solo.submit(FopCommand::TimerTick));
                    }
                }
            }

            // interleaved with B on a shared store; only A's steps move time
            let clock = ManualClock::new();
            let store = new_store();
            let mut a = field_of_play("A", &store, &clock);
            let mut b = field_of_play("B", &store, &clock);
            let mut a_events = Vec::new();
            let mut a_iter = a_steps.iter();
            let mut b_iter = b_steps.iter().filter(|s| matches!(s, Step::Command(_)));
            for take_a in pick_a.iter().copied().chain(std::iter::repeat(true)) {
                if take_a {
                    match a_iter.next() {
                        Some(Step::Command(command)) => a_events.extend(a.submit(command.clone())),
                        Some(Step::Advance(ms)) => {
                            clock.advance(*ms);
                            a_events.extend(a.submit(FopCommand::TimerTick));
                            b.submit(FopCommand::TimerTick);
                        }
                        None => break,
                    }
                } else if let Some(Step::Command(command)) = b_iter.next() {
                    b.submit(command.clone());
                }
            }

            prop_assert_eq!(a_events, solo_events);
            prop_assert_eq!(a.snapshot(), solo.snapshot());
        }
    }
}
