//! Record challenge / broken detection.
//!
//! A challenge is raised when the weight requested by the athlete on the bar
//! would equal or exceed a current record for the athlete's category and age
//! group. It turns into `Broken` on a good lift and `Withdrawn` on a failed
//! lift, a lighter request, or when the athlete's group is switched out.
//! Only athletes registered with a known category are evaluated.
//! A broken record immediately becomes the mark later attempts are compared
//! against; a jury overturn restores the previous mark.

use std::collections::HashMap;

use crate::models::{
    Athlete, AthleteId, AttemptRef, Category, LiftType, RecordDefinition, RecordEvent, RecordLift,
    RecordStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Challenge {
    record: usize,
    athlete: AthleteId,
    attempt: AttemptRef,
    weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BrokenRecord {
    record: usize,
    athlete: AthleteId,
    attempt: AttemptRef,
    weight: u32,
    previous: u32,
    previous_holder: Option<String>,
}

/// Outcome of resolving or overturning an attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    pub events: Vec<RecordEvent>,
    /// Definitions whose mark changed, to hand to the record provider.
    pub updated: Vec<RecordDefinition>,
}

impl RecordOutcome {
    pub fn new_record(&self) -> bool {
        self.events.iter().any(|e| e.status == RecordStatus::Broken)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordsEvaluator {
    records: Vec<RecordDefinition>,
    /// Record lookup key (category code, age group) per athlete.
    keys: HashMap<AthleteId, (String, String)>,
    challenges: Vec<Challenge>,
    broken: Vec<BrokenRecord>,
}

impl RecordsEvaluator {
    pub fn new(records: Vec<RecordDefinition>) -> Self {
        Self { records, keys: HashMap::new(), challenges: Vec::new(), broken: Vec::new() }
    }

    /// Compare `athlete` against the records of `category`.
    pub fn register(&mut self, athlete: AthleteId, category: &Category) {
        self.keys.insert(athlete, (category.code.clone(), category.age_group.clone()));
    }

    pub fn records(&self) -> &[RecordDefinition] {
        &self.records
    }

    #[cfg(test)]
    fn has_challenge(&self, athlete: AthleteId) -> bool {
        self.challenges.iter().any(|c| c.athlete == athlete)
    }

    /// Records (by index) that `weight` on `attempt` would equal or exceed,
    /// with the value compared (the lifted weight, or the resulting total).
    fn candidates(&self, athlete: &Athlete, attempt: AttemptRef, weight: u32) -> Vec<(usize, u32)> {
        let Some((category, age_group)) = self.keys.get(&athlete.id) else {
            return Vec::new();
        };
        let best_snatch = athlete.best(LiftType::Snatch);
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| &r.key.category == category && &r.key.age_group == age_group)
            .filter_map(|(idx, r)| {
                let value = match (r.key.lift, attempt.lift) {
                    (RecordLift::Snatch, LiftType::Snatch) => weight,
                    (RecordLift::CleanJerk, LiftType::CleanJerk) => weight,
                    (RecordLift::Total, LiftType::CleanJerk) if best_snatch > 0 => best_snatch + weight,
                    _ => return None,
                };
                (value >= r.weight).then_some((idx, value))
            })
            .collect()
    }

    fn event(&self, record: usize, athlete: AthleteId, attempt: AttemptRef, weight: u32, status: RecordStatus) -> RecordEvent {
        let def = &self.records[record];
        RecordEvent {
            federation: def.federation.clone(),
            key: def.key.clone(),
            athlete,
            attempt,
            weight,
            previous: def.weight,
            status,
        }
    }

    /// Evaluate the athlete about to lift `attempt` at `weight`.
    pub fn challenge(&mut self, athlete: &Athlete, attempt: AttemptRef, weight: u32) -> Vec<RecordEvent> {
        let wanted = self.candidates(athlete, attempt, weight);
        let mut events = Vec::new();

        let (mine, others): (Vec<Challenge>, Vec<Challenge>) =
            std::mem::take(&mut self.challenges).into_iter().partition(|c| c.athlete == athlete.id);
        self.challenges = others;

        for old in mine {
            let still = old.attempt == attempt && wanted.iter().any(|(idx, _)| *idx == old.record);
            if still {
                self.challenges.push(old);
            } else {
                events.push(self.event(old.record, old.athlete, old.attempt, old.weight, RecordStatus::Withdrawn));
            }
        }

        for (record, value) in wanted {
            let existing = self
                .challenges
                .iter()
                .position(|c| c.athlete == athlete.id && c.attempt == attempt && c.record == record);
            match existing {
                Some(pos) if self.challenges[pos].weight == value => {}
                Some(pos) => {
                    self.challenges[pos].weight = value;
                    events.push(self.event(record, athlete.id, attempt, value, RecordStatus::Challenged));
                }
                None => {
                    self.challenges.push(Challenge { record, athlete: athlete.id, attempt, weight: value });
                    events.push(self.event(record, athlete.id, attempt, value, RecordStatus::Challenged));
                }
            }
        }
        events
    }

    /// Drop any open challenge of `athlete` (they are no longer on the bar).
    pub fn withdraw(&mut self, athlete: AthleteId) -> Vec<RecordEvent> {
        let (mine, others): (Vec<Challenge>, Vec<Challenge>) =
            std::mem::take(&mut self.challenges).into_iter().partition(|c| c.athlete == athlete);
        self.challenges = others;
        mine.into_iter()
            .map(|c| self.event(c.record, c.athlete, c.attempt, c.weight, RecordStatus::Withdrawn))
            .collect()
    }

    /// Apply the referees' decision on `attempt` lifted at `weight`.
    pub fn resolve(&mut self, athlete: &Athlete, attempt: AttemptRef, weight: u32, good: bool) -> RecordOutcome {
        let (mine, others): (Vec<Challenge>, Vec<Challenge>) = std::mem::take(&mut self.challenges)
            .into_iter()
            .partition(|c| c.athlete == athlete.id && c.attempt == attempt);
        self.challenges = others;

        let mut outcome = RecordOutcome::default();
        if !good {
            outcome.events = mine
                .into_iter()
                .map(|c| self.event(c.record, c.athlete, c.attempt, c.weight, RecordStatus::Withdrawn))
                .collect();
            return outcome;
        }

        // a good lift can break a record nobody flagged beforehand
        let mut targets: Vec<(usize, u32)> = mine.iter().map(|c| (c.record, c.weight)).collect();
        for candidate in self.candidates(athlete, attempt, weight) {
            if !targets.iter().any(|(idx, _)| *idx == candidate.0) {
                targets.push(candidate);
            }
        }
        for (record, value) in targets {
            self.break_record(athlete, attempt, record, value, &mut outcome);
        }
        outcome
    }

    /// Jury correction of an already resolved attempt.
    pub fn overturn(&mut self, athlete: &Athlete, attempt: AttemptRef, weight: u32, good: bool) -> RecordOutcome {
        let mut outcome = RecordOutcome::default();
        if good {
            for (record, value) in self.candidates(athlete, attempt, weight) {
                self.break_record(athlete, attempt, record, value, &mut outcome);
            }
            return outcome;
        }

        let (mine, others): (Vec<BrokenRecord>, Vec<BrokenRecord>) = std::mem::take(&mut self.broken)
            .into_iter()
            .partition(|b| b.athlete == athlete.id && b.attempt == attempt);
        self.broken = others;
        // restore newest first so chained breaks unwind correctly
        for b in mine.into_iter().rev() {
            let def = &mut self.records[b.record];
            def.weight = b.previous;
            def.holder = b.previous_holder.clone();
            outcome.updated.push(def.clone());
            outcome
                .events
                .push(self.event(b.record, b.athlete, b.attempt, b.weight, RecordStatus::Withdrawn));
        }
        outcome
    }

    fn break_record(&mut self, athlete: &Athlete, attempt: AttemptRef, record: usize, value: u32, outcome: &mut RecordOutcome) {
        let event = self.event(record, athlete.id, attempt, value, RecordStatus::Broken);
        let def = &mut self.records[record];
        self.broken.push(BrokenRecord {
            record,
            athlete: athlete.id,
            attempt,
            weight: value,
            previous: def.weight,
            previous_holder: def.holder.clone(),
        });
        def.weight = value;
        def.holder = Some(athlete.name.clone());
        outcome.updated.push(def.clone());
        outcome.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKey;

    fn record(lift: RecordLift, weight: u32) -> RecordDefinition {
        RecordDefinition {
            federation: "NAT".to_string(),
            key: RecordKey { category: "W64".to_string(), age_group: "SR".to_string(), lift },
            weight,
            holder: Some("Holder".to_string()),
        }
    }

    fn w64() -> Category {
        Category {
            code: "W64".to_string(),
            age_group: "SR".to_string(),
            gender: "F".to_string(),
            max_body_weight: Some(64.0),
        }
    }

    /// Evaluator with the lifter registered in W64 senior.
    fn evaluator(records: Vec<RecordDefinition>) -> RecordsEvaluator {
        let mut eval = RecordsEvaluator::new(records);
        eval.register(lifter().id, &w64());
        eval
    }

    fn lifter() -> Athlete {
        Athlete::new(7, "Lifter", "W64", "SR", 3).with_entries(100, 125)
    }

    const S1: AttemptRef = AttemptRef::new(LiftType::Snatch, 1);
    const C1: AttemptRef = AttemptRef::new(LiftType::CleanJerk, 1);

    fn statuses(events: &[RecordEvent]) -> Vec<RecordStatus> {
        events.iter().map(|e| e.status).collect()
    }

    #[test]
    fn test_challenge_then_failed_lift_withdraws() {
        let mut eval = evaluator(vec![record(RecordLift::Snatch, 100)]);
        let athlete = lifter();
        let raised = eval.challenge(&athlete, S1, 100);
        assert_eq!(statuses(&raised), vec![RecordStatus::Challenged]);

        let outcome = eval.resolve(&athlete, S1, 100, false);
        assert_eq!(statuses(&outcome.events), vec![RecordStatus::Withdrawn]);
        assert!(!outcome.new_record());
        assert_eq!(eval.records()[0].weight, 100);
    }

    #[test]
    fn test_good_lift_breaks_and_updates_mark() {
        let mut eval = evaluator(vec![record(RecordLift::Snatch, 100)]);
        let athlete = lifter();
        eval.challenge(&athlete, S1, 101);
        let outcome = eval.resolve(&athlete, S1, 101, true);
        assert_eq!(statuses(&outcome.events), vec![RecordStatus::Broken]);
        assert_eq!(outcome.events[0].previous, 100);
        assert_eq!(eval.records()[0].weight, 101);
        assert_eq!(eval.records()[0].holder.as_deref(), Some("Lifter"));

        // the new mark is what the next attempt is compared with
        assert!(eval.challenge(&athlete, AttemptRef::new(LiftType::Snatch, 2), 100).is_empty());
    }

    #[test]
    fn test_lighter_request_withdraws() {
        let mut eval = evaluator(vec![record(RecordLift::Snatch, 100)]);
        let athlete = lifter();
        eval.challenge(&athlete, S1, 100);
        let events = eval.challenge(&athlete, S1, 99);
        assert_eq!(statuses(&events), vec![RecordStatus::Withdrawn]);
        assert!(!eval.has_challenge(athlete.id));
    }

    #[test]
    fn test_repeat_challenge_is_silent() {
        let mut eval = evaluator(vec![record(RecordLift::Snatch, 100)]);
        let athlete = lifter();
        eval.challenge(&athlete, S1, 102);
        assert!(eval.challenge(&athlete, S1, 102).is_empty());
        let events = eval.challenge(&athlete, S1, 103);
        assert_eq!(statuses(&events), vec![RecordStatus::Challenged]);
        assert_eq!(events[0].weight, 103);
    }

    #[test]
    fn test_other_category_not_challenged() {
        let mut eval = RecordsEvaluator::new(vec![record(RecordLift::Snatch, 50)]);
        let athlete = lifter();
        eval.register(athlete.id, &Category { code: "W71".to_string(), ..w64() });
        assert!(eval.challenge(&athlete, S1, 150).is_empty());
    }

    #[test]
    fn test_unregistered_athlete_not_evaluated() {
        let mut eval = RecordsEvaluator::new(vec![record(RecordLift::Snatch, 50)]);
        let athlete = lifter();
        assert!(eval.challenge(&athlete, S1, 150).is_empty());
        assert!(eval.resolve(&athlete, S1, 150, true).events.is_empty());
        assert_eq!(eval.records()[0].weight, 50);
    }

    #[test]
    fn test_total_record_during_clean_and_jerk() {
        let mut eval = evaluator(vec![record(RecordLift::Total, 230)]);
        let mut athlete = lifter();
        for n in 1..=3 {
            let attempt = AttemptRef::new(LiftType::Snatch, n);
            athlete.record_result(attempt, n == 1, u64::from(n)).unwrap();
        }
        // best snatch 100, so 130 makes 230
        let events = eval.challenge(&athlete, C1, 130);
        assert_eq!(statuses(&events), vec![RecordStatus::Challenged]);
        assert_eq!(events[0].weight, 230);
        assert!(eval.challenge(&athlete, C1, 129).iter().all(|e| e.status == RecordStatus::Withdrawn));
    }

    #[test]
    fn test_overturn_restores_previous_mark() {
        let mut eval = evaluator(vec![record(RecordLift::Snatch, 100)]);
        let athlete = lifter();
        eval.challenge(&athlete, S1, 105);
        eval.resolve(&athlete, S1, 105, true);

        let outcome = eval.overturn(&athlete, S1, 105, false);
        assert_eq!(statuses(&outcome.events), vec![RecordStatus::Withdrawn]);
        assert_eq!(eval.records()[0].weight, 100);
        assert_eq!(eval.records()[0].holder.as_deref(), Some("Holder"));
    }

    #[test]
    fn test_overturn_to_good_breaks() {
        let mut eval = evaluator(vec![record(RecordLift::Snatch, 100)]);
        let athlete = lifter();
        eval.challenge(&athlete, S1, 100);
        eval.resolve(&athlete, S1, 100, false);

        let outcome = eval.overturn(&athlete, S1, 100, true);
        assert!(outcome.new_record());
        assert_eq!(outcome.updated.len(), 1);
    }

    #[test]
    fn test_withdraw_when_athlete_leaves_bar() {
        let mut eval = evaluator(vec![record(RecordLift::Snatch, 100)]);
        let athlete = lifter();
        eval.challenge(&athlete, S1, 100);
        let events = eval.withdraw(athlete.id);
        assert_eq!(statuses(&events), vec![RecordStatus::Withdrawn]);
        assert!(eval.withdraw(athlete.id).is_empty());
    }
}
