//! Shared test data: two platforms, one group each, a few W64 records.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::decision::Vote;
use crate::fop::{FieldOfPlay, FopCommand, FopEvent, FopState};
use crate::models::{
    Athlete, Category, CompetitionData, Group, Platform, RecordDefinition, RecordKey, RecordLift,
};
use crate::providers::{InMemoryStore, Providers};
use crate::timer::ManualClock;

fn record(lift: RecordLift, weight: u32) -> RecordDefinition {
    RecordDefinition {
        federation: "NAT".to_string(),
        key: RecordKey { category: "W64".to_string(), age_group: "SR".to_string(), lift },
        weight,
        holder: Some("Old Holder".to_string()),
    }
}

pub(crate) fn competition() -> CompetitionData {
    let women = vec![
        Athlete::new(1, "Ana", "W64", "SR", 3).with_entries(80, 100),
        Athlete::new(2, "Bea", "W64", "SR", 1).with_entries(85, 105),
        Athlete::new(3, "Cleo", "W64", "SR", 2).with_entries(86, 106),
    ];
    let men = vec![
        Athlete::new(4, "Dan", "M89", "SR", 1).with_entries(120, 150),
        Athlete::new(5, "Eli", "M89", "SR", 2).with_entries(125, 150),
        Athlete::new(6, "Finn", "M89", "SR", 3).with_entries(130, 160),
    ];
    CompetitionData {
        name: "Test Open".to_string(),
        platforms: vec![
            Platform { id: "A".into(), name: "Platform A".to_string() },
            Platform { id: "B".into(), name: "Platform B".to_string() },
        ],
        groups: vec![
            Group {
                id: "A1".into(),
                description: "Women 64".to_string(),
                platform: "A".into(),
                scheduled: None,
                athletes: women.iter().map(|a| a.id).collect(),
            },
            Group {
                id: "B1".into(),
                description: "Men 89".to_string(),
                platform: "B".into(),
                scheduled: None,
                athletes: men.iter().map(|a| a.id).collect(),
            },
        ],
        categories: vec![
            Category {
                code: "W64".to_string(),
                age_group: "SR".to_string(),
                gender: "F".to_string(),
                max_body_weight: Some(64.0),
            },
            Category {
                code: "M89".to_string(),
                age_group: "SR".to_string(),
                gender: "M".to_string(),
                max_body_weight: Some(89.0),
            },
        ],
        athletes: women.into_iter().chain(men).collect(),
        records: vec![
            record(RecordLift::Snatch, 90),
            record(RecordLift::CleanJerk, 115),
            record(RecordLift::Total, 200),
        ],
    }
}

/// A field of play on a manual clock, with its backing store.
pub(crate) struct Harness {
    pub clock: ManualClock,
    pub store: Arc<InMemoryStore>,
    pub fop: FieldOfPlay,
    pub config: EngineConfig,
    /// Every event produced so far.
    pub events: Vec<FopEvent>,
}

impl Harness {
    pub fn new(platform: &str, config: EngineConfig) -> Self {
        let clock = ManualClock::new();
        let store = Arc::new(InMemoryStore::new(competition()));
        let fop = FieldOfPlay::new(
            platform.into(),
            config.clone(),
            Providers::in_memory(store.clone()),
            Arc::new(clock.clone()),
        );
        Self { clock, store, fop, config, events: Vec::new() }
    }

    /// Platform A with group A1 loaded.
    pub fn with_group_a() -> Self {
        let mut harness = Self::new("A", EngineConfig::default());
        harness.send(FopCommand::SwitchGroup { group: "A1".into() });
        harness
    }

    pub fn send(&mut self, command: FopCommand) -> Vec<FopEvent> {
        let events = self.fop.submit(command);
        self.events.extend(events.iter().cloned());
        events
    }

    /// Move time forward and deliver one tick.
    pub fn advance(&mut self, ms: u64) -> Vec<FopEvent> {
        self.clock.advance(ms);
        self.send(FopCommand::TimerTick)
    }

    pub fn vote(&mut self, referee: u8, vote: Vote) -> Vec<FopEvent> {
        self.send(FopCommand::DecisionUpdate { referee, vote, attempt_seq: None })
    }

    /// Start the clock, three identical votes, wait out the decision display.
    pub fn lift(&mut self, good: bool) -> Vec<FopEvent> {
        let vote = Vote::from_good(good);
        let mut events = self.send(FopCommand::TimeStarted);
        for referee in 1..=3 {
            events.extend(self.vote(referee, vote));
        }
        events.extend(self.advance(self.config.decision.display_ms));
        events
    }

    pub fn current_athlete(&self) -> Option<u32> {
        self.fop.current().map(|c| c.athlete.0)
    }

    pub fn state(&self) -> FopState {
        self.fop.state()
    }

    pub fn count(&self, pred: impl Fn(&FopEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}
