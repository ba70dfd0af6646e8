//! Record definitions and record events.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{AthleteId, AttemptRef, LiftType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordLift {
    Snatch,
    CleanJerk,
    Total,
}

impl From<LiftType> for RecordLift {
    fn from(lift: LiftType) -> Self {
        match lift {
            LiftType::Snatch => RecordLift::Snatch,
            LiftType::CleanJerk => RecordLift::CleanJerk,
        }
    }
}

/// Lookup key: (category, age group, lift).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct RecordKey {
    pub category: String,
    pub age_group: String,
    pub lift: RecordLift,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RecordDefinition {
    /// Record-keeping body, e.g. "WORLD" or a national federation.
    pub federation: String,
    pub key: RecordKey,
    pub weight: u32,
    #[serde(default)]
    pub holder: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Challenged,
    Broken,
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RecordEvent {
    pub federation: String,
    pub key: RecordKey,
    pub athlete: AthleteId,
    pub attempt: AttemptRef,
    /// Weight (or total) that challenges or breaks the record.
    pub weight: u32,
    /// Record standing before this attempt.
    pub previous: u32,
    pub status: RecordStatus,
}
