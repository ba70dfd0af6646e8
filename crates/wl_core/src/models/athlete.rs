//! Athlete and attempt slots.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::AthleteId;

/// Number of weight changes allowed after the declaration of an attempt.
pub const MAX_WEIGHT_CHANGES: usize = 2;

/// Lift type. Declaration order matters: snatch lifts before clean & jerk.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[serde(rename_all = "snake_case")]
pub enum LiftType {
    Snatch,
    CleanJerk,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttemptResult {
    #[default]
    NotAttempted,
    Good,
    Bad,
}

/// Reference to one of the six attempts (`number` is 1..=3).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct AttemptRef {
    pub lift: LiftType,
    pub number: u8,
}

impl AttemptRef {
    pub const fn new(lift: LiftType, number: u8) -> Self {
        Self { lift, number }
    }

    /// Position in lifting sequence, 0..6.
    pub fn index(&self) -> usize {
        let base = match self.lift {
            LiftType::Snatch => 0,
            LiftType::CleanJerk => 3,
        };
        base + usize::from(self.number.clamp(1, 3)) - 1
    }

    pub fn all() -> [AttemptRef; 6] {
        [
            AttemptRef::new(LiftType::Snatch, 1),
            AttemptRef::new(LiftType::Snatch, 2),
            AttemptRef::new(LiftType::Snatch, 3),
            AttemptRef::new(LiftType::CleanJerk, 1),
            AttemptRef::new(LiftType::CleanJerk, 2),
            AttemptRef::new(LiftType::CleanJerk, 3),
        ]
    }

    /// Earlier attempt of the same lift, if any.
    pub fn previous(&self) -> Option<AttemptRef> {
        (self.number > 1).then(|| AttemptRef::new(self.lift, self.number - 1))
    }

    /// Later attempt of the same lift, if any.
    pub fn following(&self) -> Option<AttemptRef> {
        (self.number < 3).then(|| AttemptRef::new(self.lift, self.number + 1))
    }
}

impl fmt::Display for AttemptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lift = match self.lift {
            LiftType::Snatch => "snatch",
            LiftType::CleanJerk => "clean&jerk",
        };
        write!(f, "{} {}", lift, self.number)
    }
}

/// One scored lift opportunity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttemptSlot {
    /// Weight currently requested for this attempt (kg). Zero when nothing is known yet.
    #[serde(default)]
    pub requested: u32,
    #[serde(default)]
    pub declaration: Option<u32>,
    /// Weight changes made after the automatic progression or declaration.
    #[serde(default)]
    pub changes: Vec<u32>,
    #[serde(default)]
    pub result: AttemptResult,
    /// Bar weight when the attempt was decided.
    #[serde(default)]
    pub lifted: Option<u32>,
    /// Session-wide sequence number of the decision, used for progression ties.
    #[serde(default)]
    pub lift_seq: Option<u64>,
}

impl AttemptSlot {
    fn untouched(&self) -> bool {
        self.result == AttemptResult::NotAttempted
            && self.declaration.is_none()
            && self.changes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("requested {requested} kg is below the minimum of {minimum} kg")]
    WeightTooLow { requested: u32, minimum: u32 },

    #[error("{0} already declared")]
    AlreadyDeclared(AttemptRef),

    #[error("no more than two changes allowed for {0}")]
    TooManyChanges(AttemptRef),

    #[error("{0} has already been lifted")]
    AlreadyLifted(AttemptRef),

    #[error("{0} has not been lifted")]
    NotLifted(AttemptRef),

    #[error("athlete has no attempt remaining")]
    NoAttemptRemaining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Athlete {
    pub id: AthleteId,
    pub name: String,
    #[serde(default)]
    pub team: String,
    /// Category code, e.g. "M89".
    pub category: String,
    pub age_group: String,
    pub lot_number: u32,
    #[serde(default)]
    pub start_number: u32,
    #[serde(default)]
    pub body_weight: Option<f32>,
    #[serde(default)]
    pub snatch: [AttemptSlot; 3],
    #[serde(default)]
    pub clean_jerk: [AttemptSlot; 3],
    /// Operator override: lift ahead of others at the same point in the order.
    #[serde(default)]
    pub move_first: bool,
}

impl Athlete {
    pub fn new(id: u32, name: &str, category: &str, age_group: &str, lot_number: u32) -> Self {
        Self {
            id: AthleteId(id),
            name: name.to_string(),
            team: String::new(),
            category: category.to_string(),
            age_group: age_group.to_string(),
            lot_number,
            start_number: 0,
            body_weight: None,
            snatch: Default::default(),
            clean_jerk: Default::default(),
            move_first: false,
        }
    }

    /// Builder used by fixtures: entry weights for the first snatch and first clean & jerk.
    pub fn with_entries(mut self, snatch: u32, clean_jerk: u32) -> Self {
        self.snatch[0].requested = snatch;
        self.clean_jerk[0].requested = clean_jerk;
        self
    }

    pub fn slot(&self, attempt: AttemptRef) -> &AttemptSlot {
        let idx = usize::from(attempt.number.clamp(1, 3)) - 1;
        match attempt.lift {
            LiftType::Snatch => &self.snatch[idx],
            LiftType::CleanJerk => &self.clean_jerk[idx],
        }
    }

    fn slot_mut(&mut self, attempt: AttemptRef) -> &mut AttemptSlot {
        let idx = usize::from(attempt.number.clamp(1, 3)) - 1;
        match attempt.lift {
            LiftType::Snatch => &mut self.snatch[idx],
            LiftType::CleanJerk => &mut self.clean_jerk[idx],
        }
    }

    pub fn attempts_done(&self) -> usize {
        AttemptRef::all()
            .iter()
            .filter(|a| self.slot(**a).result != AttemptResult::NotAttempted)
            .count()
    }

    pub fn next_attempt(&self) -> Option<AttemptRef> {
        AttemptRef::all()
            .into_iter()
            .find(|a| self.slot(*a).result == AttemptResult::NotAttempted)
    }

    pub fn is_done(&self) -> bool {
        self.next_attempt().is_none()
    }

    /// Weight requested for the upcoming attempt, zero when done.
    pub fn next_requested_weight(&self) -> u32 {
        self.next_attempt().map(|a| self.slot(a).requested).unwrap_or(0)
    }

    pub fn best(&self, lift: LiftType) -> u32 {
        let slots = match lift {
            LiftType::Snatch => &self.snatch,
            LiftType::CleanJerk => &self.clean_jerk,
        };
        slots
            .iter()
            .filter(|s| s.result == AttemptResult::Good)
            .filter_map(|s| s.lifted)
            .max()
            .unwrap_or(0)
    }

    /// Snatch + clean & jerk, zero unless both lifts have a good attempt.
    pub fn total(&self) -> u32 {
        let snatch = self.best(LiftType::Snatch);
        let clean_jerk = self.best(LiftType::CleanJerk);
        if snatch == 0 || clean_jerk == 0 {
            0
        } else {
            snatch + clean_jerk
        }
    }

    pub fn last_lift_seq(&self) -> Option<u64> {
        AttemptRef::all().iter().filter_map(|a| self.slot(*a).lift_seq).max()
    }

    /// Lowest weight the athlete may request for `attempt`.
    pub fn minimum_weight(&self, attempt: AttemptRef) -> u32 {
        match attempt.previous() {
            Some(previous) => {
                let slot = self.slot(previous);
                let base = slot.lifted.unwrap_or(slot.requested);
                match slot.result {
                    AttemptResult::Good => base + 1,
                    AttemptResult::Bad | AttemptResult::NotAttempted => base,
                }
            }
            None => 1,
        }
    }

    pub fn declare(&mut self, attempt: AttemptRef, weight: u32) -> Result<(), AttemptError> {
        let minimum = self.minimum_weight(attempt);
        let slot = self.slot_mut(attempt);
        if slot.result != AttemptResult::NotAttempted {
            return Err(AttemptError::AlreadyLifted(attempt));
        }
        if slot.declaration.is_some() {
            return Err(AttemptError::AlreadyDeclared(attempt));
        }
        if weight < minimum {
            return Err(AttemptError::WeightTooLow { requested: weight, minimum });
        }
        slot.declaration = Some(weight);
        slot.requested = weight;
        Ok(())
    }

    pub fn change_weight(&mut self, attempt: AttemptRef, weight: u32) -> Result<(), AttemptError> {
        let minimum = self.minimum_weight(attempt);
        let slot = self.slot_mut(attempt);
        if slot.result != AttemptResult::NotAttempted {
            return Err(AttemptError::AlreadyLifted(attempt));
        }
        if slot.changes.len() >= MAX_WEIGHT_CHANGES {
            return Err(AttemptError::TooManyChanges(attempt));
        }
        if weight < minimum {
            return Err(AttemptError::WeightTooLow { requested: weight, minimum });
        }
        slot.changes.push(weight);
        slot.requested = weight;
        Ok(())
    }

    /// Record the referees' decision; returns the bar weight.
    pub fn record_result(
        &mut self,
        attempt: AttemptRef,
        good: bool,
        seq: u64,
    ) -> Result<u32, AttemptError> {
        let slot = self.slot_mut(attempt);
        if slot.result != AttemptResult::NotAttempted {
            return Err(AttemptError::AlreadyLifted(attempt));
        }
        let weight = slot.requested;
        slot.result = if good { AttemptResult::Good } else { AttemptResult::Bad };
        slot.lifted = Some(weight);
        slot.lift_seq = Some(seq);
        self.progress_from(attempt);
        Ok(weight)
    }

    /// Jury correction of an already decided attempt.
    pub fn correct_result(&mut self, attempt: AttemptRef, good: bool) -> Result<(), AttemptError> {
        let slot = self.slot_mut(attempt);
        if slot.result == AttemptResult::NotAttempted {
            return Err(AttemptError::NotLifted(attempt));
        }
        slot.result = if good { AttemptResult::Good } else { AttemptResult::Bad };
        self.progress_from(attempt);
        Ok(())
    }

    /// Automatic progression: +1 kg after a good lift, same weight after a miss,
    /// unless the following attempt was already declared or changed.
    fn progress_from(&mut self, attempt: AttemptRef) {
        let Some(following) = attempt.following() else {
            return;
        };
        if !self.slot(following).untouched() {
            return;
        }
        let minimum = self.minimum_weight(following);
        self.slot_mut(following).requested = minimum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifter() -> Athlete {
        Athlete::new(1, "Test", "M89", "SR", 4).with_entries(100, 120)
    }

    #[test]
    fn test_next_attempt_sequence() {
        let mut a = lifter();
        assert_eq!(a.next_attempt(), Some(AttemptRef::new(LiftType::Snatch, 1)));
        for (seq, attempt) in AttemptRef::all().into_iter().enumerate() {
            assert_eq!(a.next_attempt(), Some(attempt));
            a.record_result(attempt, true, seq as u64).unwrap();
        }
        assert!(a.is_done());
        assert_eq!(a.attempts_done(), 6);
    }

    #[test]
    fn test_progression_after_good_and_bad() {
        let mut a = lifter();
        let s1 = AttemptRef::new(LiftType::Snatch, 1);
        let s2 = AttemptRef::new(LiftType::Snatch, 2);
        a.record_result(s1, true, 1).unwrap();
        assert_eq!(a.slot(s2).requested, 101);

        a.record_result(s2, false, 2).unwrap();
        assert_eq!(a.slot(AttemptRef::new(LiftType::Snatch, 3)).requested, 101);
        assert_eq!(a.best(LiftType::Snatch), 100);
    }

    #[test]
    fn test_change_limits() {
        let mut a = lifter();
        let s1 = AttemptRef::new(LiftType::Snatch, 1);
        a.declare(s1, 102).unwrap();
        assert_eq!(a.declare(s1, 103), Err(AttemptError::AlreadyDeclared(s1)));
        a.change_weight(s1, 104).unwrap();
        a.change_weight(s1, 105).unwrap();
        assert_eq!(a.change_weight(s1, 106), Err(AttemptError::TooManyChanges(s1)));
        assert_eq!(a.next_requested_weight(), 105);
    }

    #[test]
    fn test_weight_cannot_drop_below_progression() {
        let mut a = lifter();
        let s1 = AttemptRef::new(LiftType::Snatch, 1);
        let s2 = AttemptRef::new(LiftType::Snatch, 2);
        a.record_result(s1, true, 1).unwrap();
        assert_eq!(
            a.change_weight(s2, 100),
            Err(AttemptError::WeightTooLow { requested: 100, minimum: 101 })
        );
    }

    #[test]
    fn test_correction_reprogresses_untouched_slot() {
        let mut a = lifter();
        let s1 = AttemptRef::new(LiftType::Snatch, 1);
        let s2 = AttemptRef::new(LiftType::Snatch, 2);
        a.record_result(s1, true, 1).unwrap();
        a.correct_result(s1, false).unwrap();
        assert_eq!(a.slot(s2).requested, 100);
        assert_eq!(a.best(LiftType::Snatch), 0);
    }

    #[test]
    fn test_total_requires_both_lifts() {
        let mut a = lifter();
        a.record_result(AttemptRef::new(LiftType::Snatch, 1), true, 1).unwrap();
        assert_eq!(a.total(), 0);
        a.record_result(AttemptRef::new(LiftType::Snatch, 2), false, 2).unwrap();
        a.record_result(AttemptRef::new(LiftType::Snatch, 3), false, 3).unwrap();
        a.record_result(AttemptRef::new(LiftType::CleanJerk, 1), true, 4).unwrap();
        assert_eq!(a.total(), 220);
    }
}
