//! # wl_core - Field-of-Play Engine for Olympic Weightlifting
//!
//! Runs the live side of a competition: one field of play per platform,
//! each a state machine fed by operator, referee, jury and timekeeper input.
//!
//! ## Features
//! - Attempt and break clocks with warning thresholds
//! - Three-referee decisions with down signal, grace period and jury override
//! - IWF lifting order and record challenges
//! - Per-platform actors with serialized command queues and event broadcast
//! - Device bridge for physical consoles over a topic-based message bus

pub mod bridge;
pub mod config;
pub mod decision;
pub mod error;
pub mod fop;
pub mod lifting_order;
pub mod models;
pub mod providers;
pub mod records;
pub mod registry;
pub mod timer;

#[cfg(test)]
mod fixtures;

pub use bridge::{DeviceBridge, DeviceRole, EmbeddedBus, MessageBus};
pub use config::EngineConfig;
pub use error::{EngineError, ProviderError, Result};
pub use fop::{FieldOfPlay, FopCommand, FopEvent, FopHandle, FopSnapshot, FopState, Origin, PublishedEvent};
pub use lifting_order::{LiftingOrder, LiftingOrderCalculator};
pub use providers::{InMemoryStore, Providers};
pub use registry::FopRegistry;
pub use timer::{Clock, ManualClock, SystemClock};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
