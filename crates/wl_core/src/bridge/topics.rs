//! Topic naming: `{prefix}/{in|out}/{platform}/{role}`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::BusError;
use crate::models::PlatformId;

/// Kind of physical device attached to a platform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Referee,
    Jury,
    Timekeeper,
    Buzzer,
}

impl DeviceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceRole::Referee => "referee",
            DeviceRole::Jury => "jury",
            DeviceRole::Timekeeper => "timekeeper",
            DeviceRole::Buzzer => "buzzer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "referee" => Some(DeviceRole::Referee),
            "jury" => Some(DeviceRole::Jury),
            "timekeeper" => Some(DeviceRole::Timekeeper),
            "buzzer" => Some(DeviceRole::Buzzer),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to engine.
    In,
    /// Engine to device.
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub prefix: String,
    pub direction: Direction,
    pub platform: PlatformId,
    pub role: DeviceRole,
}

impl Topic {
    pub fn inbound(prefix: &str, platform: &PlatformId, role: DeviceRole) -> Self {
        Self { prefix: prefix.to_string(), direction: Direction::In, platform: platform.clone(), role }
    }

    pub fn outbound(prefix: &str, platform: &PlatformId, role: DeviceRole) -> Self {
        Self { prefix: prefix.to_string(), direction: Direction::Out, platform: platform.clone(), role }
    }

    /// The prefix may itself contain `/`; the last three segments are fixed.
    pub fn parse(topic: &str) -> Result<Self, BusError> {
        let malformed = || BusError::MalformedTopic(topic.to_string());
        let mut segments = topic.rsplitn(4, '/');
        let role = segments.next().and_then(DeviceRole::parse).ok_or_else(malformed)?;
        let platform = segments.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        let direction = match segments.next() {
            Some("in") => Direction::In,
            Some("out") => Direction::Out,
            _ => return Err(malformed()),
        };
        let prefix = segments.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        Ok(Self { prefix: prefix.to_string(), direction, platform: PlatformId::new(platform), role })
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::In => "in",
            Direction::Out => "out",
        };
        write!(f, "{}/{}/{}/{}", self.prefix, direction, self.platform, self.role)
    }
}

/// Subscription pattern: `+` matches one segment, a trailing `#` the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter(String);

impl TopicFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Everything a device sends to the engine under `prefix`.
    pub fn all_inbound(prefix: &str) -> Self {
        Self(format!("{prefix}/in/#"))
    }

    pub fn matches(&self, topic: &str) -> bool {
        let mut pattern = self.0.split('/');
        let mut segments = topic.split('/');
        loop {
            match (pattern.next(), segments.next()) {
                (Some("#"), _) => return true,
                (Some("+"), Some(_)) => {}
                (Some(p), Some(s)) if p == s => {}
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}
