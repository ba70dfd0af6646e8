//! Lifting Order
//!
//! Ranking of who lifts next. The comparison is a chain of keys applied until
//! one differs; the lot number is unique within a group, which makes the
//! result a total order and the computation idempotent.
//!
//! ## Key chain
//! 1. athletes done lifting go to the bottom
//! 2. snatch before clean & jerk
//! 3. lower requested weight first
//! 4. fewer attempts done first
//! 5. move-first flag first
//! 6. earlier previous lift first (progression rule)
//! 7. lower lot number first

use std::cmp::Ordering;

use crate::models::{Athlete, AthleteId, LiftType};

/// Sort key for one athlete. Field order is comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    done: bool,
    lift: LiftType,
    weight: u32,
    attempts_done: usize,
    not_moved_first: bool,
    previous_lift: PreviousLift,
    lot_number: u32,
}

/// Athletes that lifted earlier come first; athletes that have not lifted yet
/// compare equal among themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreviousLift {
    None,
    At(u64),
}

impl OrderKey {
    fn of(athlete: &Athlete) -> Self {
        let next = athlete.next_attempt();
        Self {
            done: next.is_none(),
            lift: next.map(|a| a.lift).unwrap_or(LiftType::CleanJerk),
            weight: athlete.next_requested_weight(),
            attempts_done: athlete.attempts_done(),
            not_moved_first: !athlete.move_first,
            previous_lift: athlete.last_lift_seq().map_or(PreviousLift::None, PreviousLift::At),
            lot_number: athlete.lot_number,
        }
    }
}

/// Compare two athletes for lifting order.
pub fn compare(a: &Athlete, b: &Athlete) -> Ordering {
    match OrderKey::of(a).cmp(&OrderKey::of(b)) {
        // identical lot numbers only happen with bad data; keep the id as last resort
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    }
}

/// Result of a lifting-order computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiftingOrder {
    /// Every athlete of the group; those done lifting are at the end.
    pub order: Vec<AthleteId>,
    /// Number of leading entries still eligible to lift.
    pub eligible: usize,
}

impl LiftingOrder {
    pub fn current(&self) -> Option<AthleteId> {
        (self.eligible > 0).then(|| self.order[0])
    }

    pub fn next(&self) -> Option<AthleteId> {
        (self.eligible > 1).then(|| self.order[1])
    }

    pub fn is_empty(&self) -> bool {
        self.eligible == 0
    }
}

pub struct LiftingOrderCalculator;

impl LiftingOrderCalculator {
    pub fn compute(athletes: &[Athlete]) -> LiftingOrder {
        let mut ranked: Vec<&Athlete> = athletes.iter().collect();
        ranked.sort_by(|a, b| compare(a, b));
        LiftingOrder {
            eligible: ranked.iter().filter(|a| !a.is_done()).count(),
            order: ranked.into_iter().map(|a| a.id).collect(),
        }
    }
}
