use thiserror::Error;

use crate::bridge::BusError;
use crate::config::ConfigError;
use crate::models::PlatformId;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to load competition data: {0}")]
    DataLoad(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("message bus error: {0}")]
    Bus(#[from] BusError),

    #[error("unknown platform: {0}")]
    UnknownPlatform(PlatformId),

    #[error("platform {0} is shut down")]
    PlatformClosed(PlatformId),

    #[error("command queue of platform {0} is full")]
    QueueFull(PlatformId),

    #[error("no default platform: {0} platforms configured")]
    NoDefaultPlatform(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Only a failed initial load stops the process; everything else degrades.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::DataLoad(_))
    }
}

/// Failure reported by a storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage failure: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
