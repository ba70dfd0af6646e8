// ============================================================================
// Field-of-play state graph
// ============================================================================
//
// ```
// Inactive ──StartLifting──► CurrentAthleteDisplayed ──TimeStarted──► TimeRunning
//    ▲  ▲                        │   ▲   ▲                              │
//    │  └──── Break ◄────────────┘   │   └──── TimeStopped ◄────────────┘
//    │          ▲                    │            │
//    │          │                    │      DownSignalVisible
//    │          │                    │            │
//    └──────────┴───────── DecisionVisible ◄──────┘
// ```
//
// SwitchGroup may reach Inactive from anywhere. A break may not interrupt a
// pending decision (DownSignalVisible).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[serde(rename_all = "snake_case")]
pub enum FopState {
    Inactive,
    Break,
    CurrentAthleteDisplayed,
    TimeRunning,
    TimeStopped,
    DownSignalVisible,
    DecisionVisible,
}

impl FopState {
    /// States in which an athlete is on (or about to take) the platform.
    pub fn is_lifting(self) -> bool {
        matches!(
            self,
            FopState::CurrentAthleteDisplayed | FopState::TimeRunning | FopState::TimeStopped
        )
    }

    /// States in which referee votes are accepted.
    pub fn accepts_votes(self) -> bool {
        self.is_lifting() || matches!(self, FopState::DownSignalVisible | FopState::DecisionVisible)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[serde(rename_all = "snake_case")]
pub enum BreakType {
    BeforeIntroduction,
    FirstSnatch,
    FirstCj,
    GroupDone,
    Technical,
    Jury,
    Marshal,
    Challenge,
    Ceremony,
}

impl BreakType {
    /// Breaks that count down by default; the others last until ended.
    pub fn is_timed(self) -> bool {
        matches!(self, BreakType::BeforeIntroduction | BreakType::FirstSnatch | BreakType::FirstCj)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[serde(rename_all = "snake_case")]
pub enum CeremonyType {
    Introduction,
    OfficialsIntroduction,
    Medals,
}

pub struct FopStateValidator;

impl FopStateValidator {
    /// `Ok` when `from → to` is an edge of the state graph.
    ///
    /// ```
    /// use wl_core::fop::{FopState, FopStateValidator};
    ///
    /// assert!(FopStateValidator::validate_transition(
    ///     FopState::TimeRunning,
    ///     FopState::TimeStopped
    /// ).is_ok());
    /// assert!(FopStateValidator::validate_transition(
    ///     FopState::DownSignalVisible,
    ///     FopState::Break
    /// ).is_err());
    /// ```
    pub fn validate_transition(from: FopState, to: FopState) -> Result<(), String> {
        use FopState::*;

        if from == to {
            return Ok(());
        }

        let valid = match (from, to) {
            (_, Inactive) => true,

            (Inactive, Break) => true,
            (Inactive, CurrentAthleteDisplayed) => true,

            (Break, CurrentAthleteDisplayed) => true,

            (CurrentAthleteDisplayed, Break) => true,
            (CurrentAthleteDisplayed, TimeRunning) => true,
            (CurrentAthleteDisplayed, TimeStopped) => true,
            (CurrentAthleteDisplayed, DownSignalVisible) => true,
            (CurrentAthleteDisplayed, DecisionVisible) => true,

            (TimeRunning, Break) => true,
            (TimeRunning, CurrentAthleteDisplayed) => true,
            (TimeRunning, TimeStopped) => true,
            // first vote stops the clock
            (TimeRunning, DownSignalVisible) => true,
            (TimeRunning, DecisionVisible) => true,

            (TimeStopped, Break) => true,
            (TimeStopped, CurrentAthleteDisplayed) => true,
            (TimeStopped, TimeRunning) => true,
            (TimeStopped, DownSignalVisible) => true,
            (TimeStopped, DecisionVisible) => true,

            (DownSignalVisible, DecisionVisible) => true,
            (DownSignalVisible, TimeStopped) => true,

            (DecisionVisible, Break) => true,
            (DecisionVisible, CurrentAthleteDisplayed) => true,

            _ => false,
        };

        if !valid {
            return Err(format!("Invalid state transition: {:?} → {:?}", from, to));
        }
        Ok(())
    }
}
