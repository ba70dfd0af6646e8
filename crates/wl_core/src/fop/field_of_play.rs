//! The per-platform state machine.
//!
//! `submit` is synchronous and never fails: an illegal command turns into a
//! `CommandRejected` event and leaves the machine untouched. Time only enters
//! through the injected [`Clock`]; the periodic `TimerTick` command is what
//! lets clocks, the decision grace period and the decision display expire.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{
    BreakType, CeremonyType, CurrentAttempt, FopCommand, FopEvent, FopSnapshot, FopState,
    FopStateValidator,
};
use crate::config::EngineConfig;
use crate::decision::{
    DecisionAggregator, DecisionSignal, JuryPanel, Vote, VoteRejection, Votes, REFEREE_COUNT,
};
use crate::error::ProviderError;
use crate::lifting_order::{LiftingOrder, LiftingOrderCalculator};
use crate::models::{
    Athlete, AthleteId, AttemptError, AttemptRef, GroupId, LiftType, PlatformId, RecordEvent,
};
use crate::providers::Providers;
use crate::records::{RecordOutcome, RecordsEvaluator};
use crate::timer::{Clock, CountdownTimer, TimerSignal};

/// Why a command was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("{command} not allowed in state {state:?}")]
    NotAllowed { command: &'static str, state: FopState },

    #[error("no group selected")]
    NoGroup,

    #[error("no athlete left to lift")]
    EmptyOrder,

    #[error("athlete {0} is not in the current group")]
    UnknownAthlete(AthleteId),

    #[error("athlete {0} has finished lifting")]
    AthleteDone(AthleteId),

    #[error("attempt in progress")]
    AttemptInProgress,

    #[error(transparent)]
    Attempt(#[from] AttemptError),

    #[error(transparent)]
    Vote(#[from] VoteRejection),

    #[error("vote for attempt {got}, current attempt is {current}")]
    StaleAttempt { got: u64, current: u64 },

    #[error("no decision to rule on")]
    NoDecision,

    #[error("jury already ruled on this attempt")]
    AlreadyRuled,

    #[error("clock is running")]
    ClockRunning,

    #[error("clock has no time left")]
    ClockExpired,

    #[error("jury member {0} is not on the panel")]
    UnknownJuryMember(u8),

    #[error("ceremony {requested:?} is not in progress")]
    CeremonyMismatch { requested: CeremonyType },

    #[error("a ceremony is in progress")]
    CeremonyInProgress,

    #[error("group {group} belongs to platform {platform}")]
    ForeignGroup { group: GroupId, platform: PlatformId },

    #[error("cannot load group: {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone)]
struct LastDecision {
    athlete: AthleteId,
    attempt: AttemptRef,
    weight: u32,
    good: bool,
    /// The lift as ruled stands as a record.
    new_record: bool,
    jury_ruled: bool,
}

#[derive(Debug)]
pub struct FieldOfPlay {
    platform: PlatformId,
    config: EngineConfig,
    providers: Providers,
    clock: Arc<dyn Clock>,

    state: FopState,
    break_type: Option<BreakType>,
    ceremony: Option<CeremonyType>,
    group: Option<GroupId>,
    athletes: Vec<Athlete>,
    order: LiftingOrder,
    current: Option<CurrentAttempt>,

    attempt_clock: CountdownTimer,
    /// Athlete and attempt the attempt clock was last set for.
    clock_owner: Option<(AthleteId, AttemptRef)>,
    break_clock: CountdownTimer,

    decision: DecisionAggregator,
    decision_shown_at: Option<Instant>,
    jury: JuryPanel,
    last_decision: Option<LastDecision>,
    previous_lifter: Option<AthleteId>,
    records: RecordsEvaluator,

    attempt_seq: u64,
    lift_seq: u64,
    first_cj_break_done: bool,
}

impl FieldOfPlay {
    pub fn new(
        platform: PlatformId,
        config: EngineConfig,
        providers: Providers,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let records = providers.records.records().unwrap_or_else(|err| {
            warn!(platform = %platform, %err, "records unavailable, record detection disabled");
            Vec::new()
        });
        Self {
            attempt_clock: CountdownTimer::attempt_clock(&config.timer),
            break_clock: CountdownTimer::break_clock(),
            decision: DecisionAggregator::new(&config.decision),
            jury: JuryPanel::new(config.decision.jury_size),
            records: RecordsEvaluator::new(records),
            platform,
            config,
            providers,
            clock,
            state: FopState::Inactive,
            break_type: None,
            ceremony: None,
            group: None,
            athletes: Vec::new(),
            order: LiftingOrder::default(),
            current: None,
            clock_owner: None,
            decision_shown_at: None,
            last_decision: None,
            previous_lifter: None,
            attempt_seq: 0,
            lift_seq: 0,
            first_cj_break_done: false,
        }
    }

    pub fn platform(&self) -> &PlatformId {
        &self.platform
    }

    pub fn state(&self) -> FopState {
        self.state
    }

    pub fn break_type(&self) -> Option<BreakType> {
        self.break_type
    }

    pub fn ceremony(&self) -> Option<CeremonyType> {
        self.ceremony
    }

    pub fn group(&self) -> Option<&GroupId> {
        self.group.as_ref()
    }

    pub fn current(&self) -> Option<&CurrentAttempt> {
        self.current.as_ref()
    }

    pub fn athletes(&self) -> &[Athlete] {
        &self.athletes
    }

    pub fn order(&self) -> &LiftingOrder {
        &self.order
    }

    pub fn attempt_seq(&self) -> u64 {
        self.attempt_seq
    }

    pub fn clock_running(&self) -> bool {
        self.attempt_clock.is_running()
    }

    pub fn snapshot(&self) -> FopSnapshot {
        let now = self.clock.now();
        FopSnapshot {
            platform: self.platform.clone(),
            state: self.state,
            break_type: self.break_type,
            ceremony: self.ceremony,
            group: self.group.clone(),
            order: self.order.order.clone(),
            current: self.current.clone(),
            clock_remaining_ms: self.attempt_clock.remaining_at(now),
            clock_running: self.attempt_clock.is_running(),
            break_remaining_ms: self.break_clock.remaining_at(now),
            votes: self.decision.votes(),
            attempt_seq: self.attempt_seq,
        }
    }

    /// Validate and apply one command, returning the resulting events.
    pub fn submit(&mut self, command: FopCommand) -> Vec<FopEvent> {
        let kind = command.kind();
        let before = self.state;
        let mut events = Vec::new();
        match self.apply(command, &mut events) {
            Ok(()) => {
                if before != self.state {
                    debug!(platform = %self.platform, command = kind, from = ?before, to = ?self.state, "transition");
                }
                events
            }
            Err(rejection) => {
                warn!(platform = %self.platform, command = kind, state = ?self.state, %rejection, "command rejected");
                vec![FopEvent::CommandRejected {
                    command: kind.to_string(),
                    state: self.state,
                    reason: rejection.to_string(),
                }]
            }
        }
    }

    /// Stop clocks before the platform goes away; pending votes are reported
    /// as incomplete.
    pub fn shutdown(&mut self) -> Vec<FopEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();
        self.stop_attempt_clock(now, &mut events);
        self.break_clock.stop(now);
        self.abandon_decision(&mut events);
        info!(platform = %self.platform, "field of play shut down");
        events
    }

    fn apply(&mut self, command: FopCommand, events: &mut Vec<FopEvent>) -> Result<(), Rejection> {
        let now = self.clock.now();
        match command {
            FopCommand::SwitchGroup { group } => self.switch_group(group, now, events),
            FopCommand::StartLifting => self.start_lifting(now, events),
            FopCommand::TimeStarted => self.time_started(now, events),
            FopCommand::TimeStopped => {
                self.time_stopped(now, events);
                Ok(())
            }
            FopCommand::ForceTime { remaining_ms } => self.force_time(remaining_ms, now, events),
            FopCommand::Declaration { athlete, weight } => {
                self.weight_request(athlete, weight, true, now, events)
            }
            FopCommand::WeightChange { athlete, weight } => {
                self.weight_request(athlete, weight, false, now, events)
            }
            FopCommand::DecisionUpdate { referee, vote, attempt_seq } => {
                self.referee_vote(referee, vote, attempt_seq, now, events)
            }
            FopCommand::ResetDecisions => self.reset_decisions(now, events),
            FopCommand::JuryMemberVote { member, vote } => self.jury_member_vote(member, vote, events),
            FopCommand::JuryDecision { vote } => self.jury_decision(vote, now, events),
            FopCommand::SummonReferee { referee } => {
                if !(1..=REFEREE_COUNT).contains(&usize::from(referee)) {
                    return Err(VoteRejection::UnknownReferee(referee).into());
                }
                events.push(FopEvent::SummonReferee { referee });
                Ok(())
            }
            FopCommand::BreakRequested { break_type, duration_ms } => {
                self.break_requested(break_type, duration_ms, now, events)
            }
            FopCommand::BreakEnd => self.break_end(now, events),
            FopCommand::CeremonyStart { ceremony } => self.ceremony_start(ceremony, now, events),
            FopCommand::CeremonyEnd { ceremony } => self.ceremony_end(ceremony, events),
            FopCommand::DeviceStatus { role, stale } => {
                if stale {
                    warn!(platform = %self.platform, ?role, "device stale");
                } else {
                    info!(platform = %self.platform, ?role, "device back");
                }
                events.push(FopEvent::DeviceStale { role, stale });
                Ok(())
            }
            FopCommand::TimerTick => {
                self.tick(now, events);
                Ok(())
            }
        }
    }

    fn not_allowed(&self, command: &'static str) -> Rejection {
        Rejection::NotAllowed { command, state: self.state }
    }

    fn transition(&mut self, to: FopState) {
        let check = FopStateValidator::validate_transition(self.state, to);
        if let Err(msg) = &check {
            error!(platform = %self.platform, "{}", msg);
        }
        debug_assert!(check.is_ok(), "{:?}", check);
        self.state = to;
    }

    // ------------------------------------------------------------------
    // group and lifting order
    // ------------------------------------------------------------------

    fn switch_group(
        &mut self,
        group: GroupId,
        now: Instant,
        events: &mut Vec<FopEvent>,
    ) -> Result<(), Rejection> {
        let assigned = self.providers.groups.group(&group)?;
        if assigned.platform != self.platform {
            return Err(Rejection::ForeignGroup { group, platform: assigned.platform });
        }
        let athletes = self.providers.athletes.athletes_in_group(&group)?;

        self.stop_attempt_clock(now, events);
        self.break_clock.stop(now);
        self.abandon_decision(events);
        for athlete in &self.athletes {
            record_events(self.records.withdraw(athlete.id), events);
        }
        match self.providers.records.records() {
            Ok(records) => self.records = RecordsEvaluator::new(records),
            Err(err) => warn!(platform = %self.platform, %err, "keeping previous record marks"),
        }
        for athlete in &athletes {
            match self.providers.categories.category(&athlete.category, &athlete.age_group) {
                Ok(category) => self.records.register(athlete.id, &category),
                Err(err) => {
                    warn!(platform = %self.platform, athlete = %athlete.id, %err, "no record checks for athlete")
                }
            }
        }
        if let Some(break_type) = self.break_type.take() {
            events.push(FopEvent::BreakDone { break_type });
        }
        if let Some(ceremony) = self.ceremony.take() {
            events.push(FopEvent::CeremonyDone { ceremony });
        }

        self.jury.reset();
        self.current = None;
        self.clock_owner = None;
        self.decision_shown_at = None;
        self.last_decision = None;
        self.previous_lifter = None;
        self.first_cj_break_done = false;
        self.attempt_seq += 1;

        info!(platform = %self.platform, group = %group, athletes = athletes.len(), "group switched");
        self.athletes = athletes;
        self.group = Some(group.clone());
        self.transition(FopState::Inactive);
        events.push(FopEvent::SwitchGroup { group });
        events.push(FopEvent::VideoRefresh);
        self.publish_order(events);
        Ok(())
    }

    fn attempt_of(&self, id: AthleteId) -> Option<CurrentAttempt> {
        let athlete = self.athletes.iter().find(|a| a.id == id)?;
        let attempt = athlete.next_attempt()?;
        Some(CurrentAttempt {
            athlete: id,
            name: athlete.name.clone(),
            attempt,
            weight: athlete.slot(attempt).requested,
            attempt_seq: self.attempt_seq,
        })
    }

    fn publish_order(&mut self, events: &mut Vec<FopEvent>) {
        self.order = LiftingOrderCalculator::compute(&self.athletes);
        let current = self.order.current().and_then(|id| self.attempt_of(id));
        events.push(FopEvent::LiftingOrderUpdated {
            order: self.order.order.clone(),
            current,
            next: self.order.next(),
        });
    }

    /// Put the head of the lifting order on the platform, or end the group
    /// when nobody is left.
    fn display_current(&mut self, now: Instant, events: &mut Vec<FopEvent>) {
        let Some(next) = self.order.current().and_then(|id| self.attempt_of(id)) else {
            self.group_done(now, events);
            return;
        };

        let key = (next.athlete, next.attempt);
        if self.clock_owner != Some(key) {
            let allotted = if self.previous_lifter == Some(next.athlete) {
                self.config.timer.consecutive_attempt_ms
            } else {
                self.config.timer.attempt_ms
            };
            self.attempt_clock.stop(now);
            self.attempt_clock.set_time_remaining(allotted, now);
            self.clock_owner = Some(key);
            events.push(FopEvent::SetTime { remaining_ms: allotted });
        }

        if let Some(athlete) = self.athletes.iter().find(|a| a.id == next.athlete) {
            record_events(self.records.challenge(athlete, next.attempt, next.weight), events);
        }
        debug!(platform = %self.platform, athlete = %next.athlete, attempt = %next.attempt, weight = next.weight, "athlete displayed");
        self.current = Some(next);
        self.transition(FopState::CurrentAthleteDisplayed);
    }

    /// After the order changed during lifting: follow the new head, keeping
    /// the clock when the same athlete stays up.
    fn refresh_current(&mut self, now: Instant, events: &mut Vec<FopEvent>) {
        let head = self.order.current();
        if head.is_some() && head == self.current.as_ref().map(|c| c.athlete) {
            self.current = head.and_then(|id| self.attempt_of(id));
            return;
        }
        self.stop_attempt_clock(now, events);
        self.display_current(now, events);
    }

    fn group_done(&mut self, now: Instant, events: &mut Vec<FopEvent>) {
        self.current = None;
        self.enter_break(BreakType::GroupDone, None, now, events);
        if let Some(group) = &self.group {
            info!(platform = %self.platform, group = %group, "group done");
            events.push(FopEvent::GroupDone { group: group.clone() });
        }
    }

    fn start_lifting(&mut self, now: Instant, events: &mut Vec<FopEvent>) -> Result<(), Rejection> {
        if !matches!(self.state, FopState::Inactive | FopState::Break) {
            return Err(self.not_allowed("start_lifting"));
        }
        if self.ceremony.is_some() {
            return Err(Rejection::CeremonyInProgress);
        }
        if self.group.is_none() {
            return Err(Rejection::NoGroup);
        }
        if self.order.is_empty() {
            return Err(Rejection::EmptyOrder);
        }
        self.leave_break(now, events);
        self.display_current(now, events);
        Ok(())
    }

    fn weight_request(
        &mut self,
        id: AthleteId,
        weight: u32,
        declaration: bool,
        now: Instant,
        events: &mut Vec<FopEvent>,
    ) -> Result<(), Rejection> {
        if self.group.is_none() {
            return Err(Rejection::NoGroup);
        }
        let on_platform = self.current.as_ref().is_some_and(|c| c.athlete == id);
        if on_platform && (self.state == FopState::DownSignalVisible || self.decision.is_pending()) {
            return Err(Rejection::AttemptInProgress);
        }
        let athlete = self
            .athletes
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(Rejection::UnknownAthlete(id))?;
        let attempt = athlete.next_attempt().ok_or(Rejection::AthleteDone(id))?;
        if declaration {
            athlete.declare(attempt, weight)?;
        } else {
            athlete.change_weight(attempt, weight)?;
        }
        let updated = athlete.clone();
        debug!(platform = %self.platform, athlete = %id, %attempt, weight, declaration, "weight requested");

        // durable before the new order goes out
        self.persist(&updated, events);
        self.publish_order(events);
        record_events(self.records.challenge(&updated, attempt, weight), events);
        if self.state.is_lifting() {
            self.refresh_current(now, events);
        }
        Ok(())
    }

    fn persist(&self, athlete: &Athlete, events: &mut Vec<FopEvent>) {
        if let Err(err) = self.providers.athletes.save_athlete(athlete) {
            warn!(platform = %self.platform, athlete = %athlete.id, %err, "athlete not saved");
            events.push(FopEvent::PersistFailed { athlete: Some(athlete.id), reason: err.to_string() });
        }
    }

    fn publish_records(&self, outcome: RecordOutcome, events: &mut Vec<FopEvent>) {
        for record in &outcome.updated {
            if let Err(err) = self.providers.records.record_broken(record) {
                warn!(platform = %self.platform, %err, "record not saved");
                events.push(FopEvent::PersistFailed { athlete: None, reason: err.to_string() });
            }
        }
        record_events(outcome.events, events);
    }

    // ------------------------------------------------------------------
    // clocks
    // ------------------------------------------------------------------

    fn stop_attempt_clock(&mut self, now: Instant, events: &mut Vec<FopEvent>) {
        if self.attempt_clock.is_running() {
            let remaining_ms = self.attempt_clock.stop(now);
            events.push(FopEvent::StopTime { remaining_ms });
        }
    }

    fn time_started(&mut self, now: Instant, events: &mut Vec<FopEvent>) -> Result<(), Rejection> {
        match self.state {
            FopState::TimeRunning => Ok(()),
            FopState::Break => {
                if self.break_clock.is_running() {
                    return Ok(());
                }
                let remaining_ms = self.break_clock.remaining_at(now);
                if remaining_ms == 0 {
                    return Err(Rejection::ClockExpired);
                }
                self.break_clock.resume(now);
                events.push(FopEvent::StartTime { remaining_ms });
                Ok(())
            }
            FopState::CurrentAthleteDisplayed | FopState::TimeStopped => {
                if self.decision.is_pending() {
                    return Err(Rejection::AttemptInProgress);
                }
                let remaining_ms = self.attempt_clock.remaining_at(now);
                if remaining_ms == 0 {
                    return Err(Rejection::ClockExpired);
                }
                self.attempt_clock.resume(now);
                self.transition(FopState::TimeRunning);
                events.push(FopEvent::StartTime { remaining_ms });
                Ok(())
            }
            _ => Err(self.not_allowed("time_started")),
        }
    }

    /// A stop for a clock that is not running is a no-op.
    fn time_stopped(&mut self, now: Instant, events: &mut Vec<FopEvent>) {
        match self.state {
            FopState::TimeRunning => {
                let remaining_ms = self.attempt_clock.stop(now);
                self.transition(FopState::TimeStopped);
                events.push(FopEvent::StopTime { remaining_ms });
            }
            FopState::Break if self.break_clock.is_running() => {
                let remaining_ms = self.break_clock.stop(now);
                events.push(FopEvent::StopTime { remaining_ms });
            }
            _ => debug!(platform = %self.platform, "clock already stopped"),
        }
    }

    fn force_time(
        &mut self,
        remaining_ms: u64,
        now: Instant,
        events: &mut Vec<FopEvent>,
    ) -> Result<(), Rejection> {
        match self.state {
            FopState::TimeRunning => Err(Rejection::ClockRunning),
            FopState::CurrentAthleteDisplayed | FopState::TimeStopped => {
                self.attempt_clock.set_time_remaining(remaining_ms, now);
                events.push(FopEvent::SetTime { remaining_ms });
                Ok(())
            }
            FopState::Break => {
                if self.break_clock.is_running() {
                    return Err(Rejection::ClockRunning);
                }
                self.break_clock.set_time_remaining(remaining_ms, now);
                events.push(FopEvent::SetTime { remaining_ms });
                Ok(())
            }
            _ => Err(self.not_allowed("force_time")),
        }
    }

    fn tick(&mut self, now: Instant, events: &mut Vec<FopEvent>) {
        for signal in self.attempt_clock.poll(now) {
            match signal {
                TimerSignal::Warning { kind, remaining_ms } => {
                    events.push(FopEvent::TimerWarning { kind, remaining_ms });
                }
                TimerSignal::Expired => {
                    info!(platform = %self.platform, "attempt time expired");
                    events.push(FopEvent::TimeExpired);
                    if self.state == FopState::TimeRunning {
                        self.transition(FopState::TimeStopped);
                    }
                }
            }
        }

        if self.state == FopState::Break {
            let expired = self.break_clock.poll(now).contains(&TimerSignal::Expired);
            if let (true, Some(break_type)) = (expired, self.break_type) {
                events.push(FopEvent::BreakTimeOver { break_type });
            }
        }

        if self.state.accepts_votes() && self.state != FopState::DecisionVisible {
            let signals = self.decision.poll(now);
            self.apply_signals(signals, now, events);
        }

        if self.state == FopState::DecisionVisible {
            let shown_for = self
                .decision_shown_at
                .map(|at| now.saturating_duration_since(at).as_millis())
                .unwrap_or(0);
            if shown_for >= u128::from(self.config.decision.display_ms) {
                self.finish_decision_cycle(events);
                self.continue_after_decision(now, events);
            }
        }
    }

    // ------------------------------------------------------------------
    // breaks and ceremonies
    // ------------------------------------------------------------------

    fn default_break_ms(&self, break_type: BreakType) -> Option<u64> {
        let timer = &self.config.timer;
        match break_type {
            BreakType::FirstCj => Some(timer.snatch_cj_break_ms.unwrap_or(timer.default_break_ms)),
            other if other.is_timed() => Some(timer.default_break_ms),
            _ => None,
        }
    }

    fn enter_break(
        &mut self,
        break_type: BreakType,
        duration_ms: Option<u64>,
        now: Instant,
        events: &mut Vec<FopEvent>,
    ) {
        self.stop_attempt_clock(now, events);
        if let Some(previous) = self.break_type {
            if previous != break_type {
                events.push(FopEvent::BreakDone { break_type: previous });
            }
        }
        let remaining_ms = duration_ms.or_else(|| self.default_break_ms(break_type));
        match remaining_ms {
            Some(ms) => self.break_clock.start(ms, now),
            None => {
                self.break_clock.stop(now);
                self.break_clock.set_time_remaining(0, now);
            }
        }
        info!(platform = %self.platform, ?break_type, ?remaining_ms, "break started");
        self.break_type = Some(break_type);
        self.transition(FopState::Break);
        events.push(FopEvent::BreakStarted { break_type, remaining_ms });
    }

    fn leave_break(&mut self, now: Instant, events: &mut Vec<FopEvent>) {
        self.break_clock.stop(now);
        if let Some(break_type) = self.break_type.take() {
            events.push(FopEvent::BreakDone { break_type });
        }
    }

    fn break_requested(
        &mut self,
        break_type: BreakType,
        duration_ms: Option<u64>,
        now: Instant,
        events: &mut Vec<FopEvent>,
    ) -> Result<(), Rejection> {
        match self.state {
            FopState::DownSignalVisible => Err(self.not_allowed("break_requested")),
            state if state.is_lifting() && self.decision.is_pending() => {
                Err(Rejection::AttemptInProgress)
            }
            FopState::Break if self.break_type == Some(break_type) && duration_ms.is_none() => Ok(()),
            FopState::DecisionVisible => {
                // the decision cycle completes before the break starts
                self.finish_decision_cycle(events);
                self.enter_break(break_type, duration_ms, now, events);
                Ok(())
            }
            _ => {
                self.enter_break(break_type, duration_ms, now, events);
                Ok(())
            }
        }
    }

    fn break_end(&mut self, now: Instant, events: &mut Vec<FopEvent>) -> Result<(), Rejection> {
        if self.state != FopState::Break {
            return Err(self.not_allowed("break_end"));
        }
        if self.ceremony.is_some() {
            return Err(Rejection::CeremonyInProgress);
        }
        let finished_group = self.break_type == Some(BreakType::GroupDone);
        self.leave_break(now, events);
        match (self.group.is_some(), self.order.is_empty()) {
            (true, false) => self.display_current(now, events),
            (true, true) if !finished_group => self.group_done(now, events),
            _ => self.transition(FopState::Inactive),
        }
        Ok(())
    }

    fn ceremony_start(
        &mut self,
        ceremony: CeremonyType,
        now: Instant,
        events: &mut Vec<FopEvent>,
    ) -> Result<(), Rejection> {
        if self.ceremony.is_some() {
            return Err(Rejection::CeremonyInProgress);
        }
        match self.state {
            FopState::Inactive => self.enter_break(BreakType::Ceremony, None, now, events),
            FopState::Break => {}
            _ => return Err(self.not_allowed("ceremony_start")),
        }
        self.ceremony = Some(ceremony);
        events.push(FopEvent::CeremonyStarted { ceremony });
        Ok(())
    }

    fn ceremony_end(
        &mut self,
        ceremony: CeremonyType,
        events: &mut Vec<FopEvent>,
    ) -> Result<(), Rejection> {
        if self.ceremony != Some(ceremony) {
            return Err(Rejection::CeremonyMismatch { requested: ceremony });
        }
        self.ceremony = None;
        events.push(FopEvent::CeremonyDone { ceremony });
        Ok(())
    }

    // ------------------------------------------------------------------
    // referees and jury
    // ------------------------------------------------------------------

    fn referee_vote(
        &mut self,
        referee: u8,
        vote: Vote,
        attempt_seq: Option<u64>,
        now: Instant,
        events: &mut Vec<FopEvent>,
    ) -> Result<(), Rejection> {
        if !self.state.accepts_votes() || self.current.is_none() {
            return Err(self.not_allowed("decision_update"));
        }
        if let Some(got) = attempt_seq {
            if got != self.attempt_seq {
                return Err(Rejection::StaleAttempt { got, current: self.attempt_seq });
            }
        }
        let signals = self.decision.record_vote(referee, vote, now)?;
        debug!(platform = %self.platform, referee, ?vote, "referee vote");

        // the first vote stops the clock
        if self.attempt_clock.is_running() {
            let remaining_ms = self.attempt_clock.stop(now);
            self.transition(FopState::TimeStopped);
            events.push(FopEvent::StopTime { remaining_ms });
        }
        self.apply_signals(signals, now, events);
        Ok(())
    }

    fn apply_signals(
        &mut self,
        signals: Vec<DecisionSignal>,
        now: Instant,
        events: &mut Vec<FopEvent>,
    ) {
        for signal in signals {
            match signal {
                DecisionSignal::DownSignal { good } => {
                    self.transition(FopState::DownSignalVisible);
                    events.push(FopEvent::DownSignal { good });
                }
                DecisionSignal::Decision { good, votes } => {
                    self.apply_decision(good, votes, now, events);
                }
                DecisionSignal::RefereeTimeout { missing } => {
                    warn!(platform = %self.platform, ?missing, "referees have not voted");
                    events.push(FopEvent::RefereeTimeout { missing });
                }
            }
        }
    }

    fn apply_decision(&mut self, good: bool, votes: Votes, now: Instant, events: &mut Vec<FopEvent>) {
        let Some(current) = self.current.clone() else {
            warn!(platform = %self.platform, "decision without an athlete on the platform");
            self.decision.reset();
            return;
        };
        self.lift_seq += 1;
        let seq = self.lift_seq;
        let recorded = self
            .athletes
            .iter_mut()
            .find(|a| a.id == current.athlete)
            .map(|a| a.record_result(current.attempt, good, seq).map(|weight| (weight, a.clone())));
        let (weight, athlete) = match recorded {
            Some(Ok(done)) => done,
            Some(Err(err)) => {
                warn!(platform = %self.platform, athlete = %current.athlete, %err, "decision not recorded");
                self.decision.reset();
                return;
            }
            None => {
                warn!(platform = %self.platform, athlete = %current.athlete, "athlete left the group");
                self.decision.reset();
                return;
            }
        };

        self.attempt_clock.stop(now);
        self.persist(&athlete, events);
        info!(platform = %self.platform, athlete = %athlete.id, attempt = %current.attempt, weight, good, "decision");
        events.push(FopEvent::Decision {
            athlete: athlete.id,
            attempt: current.attempt,
            weight,
            good,
            votes,
        });
        let outcome = self.records.resolve(&athlete, current.attempt, weight, good);
        let new_record = outcome.new_record();
        self.publish_records(outcome, events);

        self.last_decision = Some(LastDecision {
            athlete: athlete.id,
            attempt: current.attempt,
            weight,
            good,
            new_record,
            jury_ruled: false,
        });
        self.jury.reset();
        self.previous_lifter = Some(athlete.id);
        self.decision_shown_at = Some(now);
        self.transition(FopState::DecisionVisible);
    }

    /// Clear the published decision; the next attempt gets a new token.
    fn finish_decision_cycle(&mut self, events: &mut Vec<FopEvent>) {
        self.decision.reset();
        self.decision_shown_at = None;
        self.current = None;
        self.attempt_seq += 1;
        events.push(FopEvent::DecisionReset);
        self.publish_order(events);
    }

    fn continue_after_decision(&mut self, now: Instant, events: &mut Vec<FopEvent>) {
        if self.order.is_empty() {
            self.group_done(now, events);
            return;
        }
        if self.snatch_just_finished() {
            if let Some(ms) = self.config.timer.snatch_cj_break_ms {
                self.first_cj_break_done = true;
                self.enter_break(BreakType::FirstCj, Some(ms), now, events);
                return;
            }
        }
        self.display_current(now, events);
    }

    fn snatch_just_finished(&self) -> bool {
        !self.first_cj_break_done
            && self.last_decision.as_ref().is_some_and(|d| d.attempt.lift == LiftType::Snatch)
            && self
                .athletes
                .iter()
                .filter_map(Athlete::next_attempt)
                .all(|a| a.lift == LiftType::CleanJerk)
    }

    fn abandon_decision(&mut self, events: &mut Vec<FopEvent>) {
        if self.decision.is_pending() {
            let athlete = self.current.as_ref().map(|c| c.athlete);
            warn!(platform = %self.platform, ?athlete, "decision left incomplete");
            events.push(FopEvent::DecisionIncomplete { athlete, votes: self.decision.votes() });
        }
        self.decision.reset();
    }

    fn reset_decisions(&mut self, now: Instant, events: &mut Vec<FopEvent>) -> Result<(), Rejection> {
        match self.state {
            FopState::DecisionVisible => {
                self.finish_decision_cycle(events);
                self.continue_after_decision(now, events);
                Ok(())
            }
            FopState::DownSignalVisible => {
                self.decision.reset();
                self.transition(FopState::TimeStopped);
                events.push(FopEvent::DecisionReset);
                Ok(())
            }
            state if state.is_lifting() => {
                if self.decision.is_pending() {
                    self.decision.reset();
                    events.push(FopEvent::DecisionReset);
                }
                Ok(())
            }
            _ => Err(self.not_allowed("reset_decisions")),
        }
    }

    fn jury_member_vote(
        &mut self,
        member: u8,
        vote: Vote,
        events: &mut Vec<FopEvent>,
    ) -> Result<(), Rejection> {
        if self.last_decision.is_none() {
            return Err(Rejection::NoDecision);
        }
        if !self.jury.accepts(member) {
            return Err(Rejection::UnknownJuryMember(member));
        }
        if let Some(votes) = self.jury.record(member, vote) {
            events.push(FopEvent::JuryVotesComplete { votes });
        }
        Ok(())
    }

    fn jury_decision(&mut self, vote: Vote, now: Instant, events: &mut Vec<FopEvent>) -> Result<(), Rejection> {
        if self.state == FopState::DownSignalVisible {
            return Err(self.not_allowed("jury_decision"));
        }
        let last = self.last_decision.clone().ok_or(Rejection::NoDecision)?;
        if last.jury_ruled {
            return Err(Rejection::AlreadyRuled);
        }
        let good = vote.is_good();

        if good == last.good {
            info!(platform = %self.platform, athlete = %last.athlete, "jury confirmed decision");
            self.mark_jury_ruled(good, last.new_record);
            events.push(FopEvent::JuryNotification {
                athlete: last.athlete,
                attempt: last.attempt,
                good,
                reversal: false,
                new_record: last.new_record,
            });
            return Ok(());
        }

        let athlete = self
            .athletes
            .iter_mut()
            .find(|a| a.id == last.athlete)
            .ok_or(Rejection::UnknownAthlete(last.athlete))?;
        athlete.correct_result(last.attempt, good)?;
        let athlete = athlete.clone();

        info!(platform = %self.platform, athlete = %athlete.id, attempt = %last.attempt, good, "jury reversed decision");
        self.persist(&athlete, events);
        events.push(FopEvent::DecisionCorrected { athlete: athlete.id, attempt: last.attempt, good });
        let outcome = self.records.overturn(&athlete, last.attempt, last.weight, good);
        let new_record = outcome.new_record();
        self.mark_jury_ruled(good, new_record);
        self.publish_records(outcome, events);
        events.push(FopEvent::JuryNotification {
            athlete: athlete.id,
            attempt: last.attempt,
            good,
            reversal: true,
            new_record,
        });

        self.publish_order(events);
        if self.state.is_lifting() {
            self.refresh_current(now, events);
        }
        Ok(())
    }

    fn mark_jury_ruled(&mut self, good: bool, new_record: bool) {
        if let Some(last) = self.last_decision.as_mut() {
            last.jury_ruled = true;
            last.good = good;
            last.new_record = new_record;
        }
    }
}

fn record_events(records: Vec<RecordEvent>, events: &mut Vec<FopEvent>) {
    events.extend(records.into_iter().map(|record| FopEvent::Record { record }));
}
