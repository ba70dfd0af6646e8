//! Groups, platforms, categories and the competition data bundle.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Athlete, AthleteId, GroupId, PlatformId, RecordDefinition};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Platform {
    pub id: PlatformId,
    #[serde(default)]
    pub name: String,
}

/// Athletes scheduled to lift together on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Group {
    pub id: GroupId,
    #[serde(default)]
    pub description: String,
    pub platform: PlatformId,
    #[serde(default)]
    pub scheduled: Option<DateTime<Utc>>,
    /// Athlete ids in start-list order.
    pub athletes: Vec<AthleteId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Category {
    pub code: String,
    pub age_group: String,
    #[serde(default)]
    pub gender: String,
    /// Upper body-weight bound in kg; `None` for the open "+" category.
    #[serde(default)]
    pub max_body_weight: Option<f32>,
}

/// Everything the storage collaborator hands the engine at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompetitionData {
    #[serde(default)]
    pub name: String,
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub athletes: Vec<Athlete>,
    #[serde(default)]
    pub records: Vec<RecordDefinition>,
}

impl CompetitionData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let data: Self = serde_json::from_str(json)?;
        data.check()?;
        Ok(data)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CompetitionData)
    }

    /// Referential checks: groups reference known platforms and athletes.
    pub fn check(&self) -> Result<()> {
        if self.platforms.is_empty() {
            return Err(EngineError::DataLoad("no platform defined".to_string()));
        }
        for group in &self.groups {
            if !self.platforms.iter().any(|p| p.id == group.platform) {
                return Err(EngineError::DataLoad(format!(
                    "group {} references unknown platform {}",
                    group.id, group.platform
                )));
            }
            if let Some(missing) =
                group.athletes.iter().find(|id| !self.athletes.iter().any(|a| a.id == **id))
            {
                return Err(EngineError::DataLoad(format!(
                    "group {} references unknown athlete {}",
                    group.id, missing
                )));
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for platform in &self.platforms {
            if !seen.insert(&platform.id) {
                return Err(EngineError::DataLoad(format!(
                    "platform {} defined twice",
                    platform.id
                )));
            }
        }
        Ok(())
    }
}

/// Assign lot numbers 1..=n in a random order that is reproducible from `seed`.
pub fn draw_lots(athletes: &mut [Athlete], seed: u64) {
    let mut lots: Vec<u32> = (1..=athletes.len() as u32).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    lots.shuffle(&mut rng);
    for (athlete, lot) in athletes.iter_mut().zip(lots) {
        athlete.lot_number = lot;
    }
}
