//! Storage collaborator contracts.
//!
//! The engine never owns competition data: it reads athletes, groups,
//! platforms, categories and records through these traits and writes back
//! only attempt changes and broken records. [`InMemoryStore`] implements all
//! of them over a [`CompetitionData`] bundle for the CLI harness and tests.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::ProviderError;
use crate::models::{
    Athlete, Category, CompetitionData, Group, GroupId, Platform, RecordDefinition,
};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

pub trait AthleteProvider: Send + Sync {
    /// Athletes of `group` in start-list order.
    fn athletes_in_group(&self, group: &GroupId) -> ProviderResult<Vec<Athlete>>;

    /// Persist the attempt fields of one athlete. Returns once durable.
    fn save_athlete(&self, athlete: &Athlete) -> ProviderResult<()>;
}

pub trait GroupProvider: Send + Sync {
    fn group(&self, id: &GroupId) -> ProviderResult<Group>;
}

pub trait PlatformProvider: Send + Sync {
    fn platforms(&self) -> ProviderResult<Vec<Platform>>;
}

pub trait CategoryProvider: Send + Sync {
    fn category(&self, code: &str, age_group: &str) -> ProviderResult<Category>;
}

pub trait RecordProvider: Send + Sync {
    fn records(&self) -> ProviderResult<Vec<RecordDefinition>>;
    fn record_broken(&self, record: &RecordDefinition) -> ProviderResult<()>;
}

/// Bundle of collaborator handles shared by every field of play.
#[derive(Clone)]
pub struct Providers {
    pub athletes: Arc<dyn AthleteProvider>,
    pub groups: Arc<dyn GroupProvider>,
    pub platforms: Arc<dyn PlatformProvider>,
    pub categories: Arc<dyn CategoryProvider>,
    pub records: Arc<dyn RecordProvider>,
}

impl Providers {
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            athletes: store.clone(),
            groups: store.clone(),
            platforms: store.clone(),
            categories: store.clone(),
            records: store,
        }
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<CompetitionData>,
}

impl InMemoryStore {
    pub fn new(data: CompetitionData) -> Self {
        Self { data: RwLock::new(data) }
    }

    /// Copy of the current data.
    pub fn snapshot(&self) -> ProviderResult<CompetitionData> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> ProviderResult<RwLockReadGuard<'_, CompetitionData>> {
        self.data.read().map_err(|_| ProviderError::Poisoned)
    }

    fn write(&self) -> ProviderResult<RwLockWriteGuard<'_, CompetitionData>> {
        self.data.write().map_err(|_| ProviderError::Poisoned)
    }
}

fn not_found(kind: &'static str, id: impl ToString) -> ProviderError {
    ProviderError::NotFound { kind, id: id.to_string() }
}

impl AthleteProvider for InMemoryStore {
    fn athletes_in_group(&self, group: &GroupId) -> ProviderResult<Vec<Athlete>> {
        let data = self.read()?;
        let group = data.groups.iter().find(|g| &g.id == group).ok_or_else(|| not_found("group", group))?;
        group
            .athletes
            .iter()
            .map(|id| {
                data.athletes
                    .iter()
                    .find(|a| a.id == *id)
                    .cloned()
                    .ok_or_else(|| not_found("athlete", id))
            })
            .collect()
    }

    fn save_athlete(&self, athlete: &Athlete) -> ProviderResult<()> {
        let mut data = self.write()?;
        let slot = data
            .athletes
            .iter_mut()
            .find(|a| a.id == athlete.id)
            .ok_or_else(|| not_found("athlete", athlete.id))?;
        *slot = athlete.clone();
        Ok(())
    }
}

impl GroupProvider for InMemoryStore {
    fn group(&self, id: &GroupId) -> ProviderResult<Group> {
        self.read()?.groups.iter().find(|g| &g.id == id).cloned().ok_or_else(|| not_found("group", id))
    }
}

impl PlatformProvider for InMemoryStore {
    fn platforms(&self) -> ProviderResult<Vec<Platform>> {
        Ok(self.read()?.platforms.clone())
    }
}

impl CategoryProvider for InMemoryStore {
    fn category(&self, code: &str, age_group: &str) -> ProviderResult<Category> {
        self.read()?
            .categories
            .iter()
            .find(|c| c.code == code && c.age_group == age_group)
            .cloned()
            .ok_or_else(|| not_found("category", format!("{code}/{age_group}")))
    }
}

impl RecordProvider for InMemoryStore {
    fn records(&self) -> ProviderResult<Vec<RecordDefinition>> {
        Ok(self.read()?.records.clone())
    }

    fn record_broken(&self, record: &RecordDefinition) -> ProviderResult<()> {
        let mut data = self.write()?;
        match data.records.iter_mut().find(|r| r.federation == record.federation && r.key == record.key) {
            Some(existing) => *existing = record.clone(),
            None => data.records.push(record.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_athletes_in_group_keeps_start_order() {
        let store = InMemoryStore::new(fixtures::competition());
        let athletes = store.athletes_in_group(&"A1".into()).unwrap();
        let ids: Vec<u32> = athletes.iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_unknown_group_not_found() {
        let store = InMemoryStore::new(fixtures::competition());
        let err = store.athletes_in_group(&"nope".into()).unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { kind: "group", .. }));
    }

    #[test]
    fn test_save_athlete_round_trips() {
        let store = InMemoryStore::new(fixtures::competition());
        let mut athletes = store.athletes_in_group(&"A1".into()).unwrap();
        athletes[0].move_first = true;
        store.save_athlete(&athletes[0]).unwrap();
        let reloaded = store.athletes_in_group(&"A1".into()).unwrap();
        assert!(reloaded[0].move_first);
    }

    #[test]
    fn test_record_broken_replaces_mark() {
        let store = InMemoryStore::new(fixtures::competition());
        let mut record = store.records().unwrap()[0].clone();
        record.weight += 1;
        store.record_broken(&record).unwrap();
        assert_eq!(store.records().unwrap()[0].weight, record.weight);
        assert_eq!(store.records().unwrap().len(), fixtures::competition().records.len());
    }
}
