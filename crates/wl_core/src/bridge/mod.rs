//! Device bridge: physical referee, jury, timekeeper and buzzer devices.
//!
//! ```text
//! device ──publish──► {prefix}/in/{platform}/{role} ──► parse ──► FopHandle (Origin::Device)
//! FopHandle events ──► encode ──► {prefix}/out/{platform}/{role} ──► device
//! ```
//!
//! Malformed topics and payloads are logged and dropped; they never reach a
//! field of play. Duplicate messages are harmless because the state machine
//! treats repeated stops, starts and identical votes as no-ops.

mod bus;
mod health;
mod payload;
mod topics;

pub use bus::{BusClient, BusError, BusMessage, EmbeddedBus, MessageBus, Subscription};
pub use health::DeviceHealth;
pub use payload::{encode_outbound, parse_inbound, DeviceMessage, PayloadError};
pub use topics::{DeviceRole, Direction, Topic, TopicFilter};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::EngineError;
use crate::fop::{FopCommand, FopHandle, Origin, PublishedEvent};
use crate::models::PlatformId;
use crate::registry::FopRegistry;
use crate::timer::Clock;

/// Why an inbound device message was not delivered.
#[derive(Error, Debug)]
enum Dropped {
    #[error(transparent)]
    Topic(#[from] BusError),

    #[error("engine-to-device topic")]
    WrongDirection,

    #[error("platform {0} is not running")]
    NotRunning(PlatformId),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub struct DeviceBridge {
    bus: Arc<dyn MessageBus>,
    client: BusClient,
    prefix: String,
    tasks: Vec<JoinHandle<()>>,
}

impl DeviceBridge {
    /// Route device traffic for every platform currently in the registry.
    /// Platforms started later are added with [`DeviceBridge::attach`].
    pub fn start(bus: Arc<dyn MessageBus>, registry: Arc<FopRegistry>, clock: Arc<dyn Clock>) -> Self {
        let config = registry.config().bus.clone();
        let health = Arc::new(Mutex::new(DeviceHealth::new(config.device_stale_ms)));
        let client = bus.internal_client();

        let subscription = bus.subscribe(TopicFilter::all_inbound(&config.topic_prefix));
        let inbound = tokio::spawn(
            run_inbound(subscription, registry.clone(), health.clone(), clock.clone())
                .instrument(info_span!("bridge_inbound")),
        );
        let watchdog = tokio::spawn(
            run_watchdog(registry.clone(), health, clock, config.device_stale_ms)
                .instrument(info_span!("bridge_watchdog")),
        );

        let mut bridge = Self { bus, client, prefix: config.topic_prefix, tasks: vec![inbound, watchdog] };
        for platform in registry.platforms() {
            match registry.running(&platform) {
                Some(handle) => bridge.attach(&handle),
                None => warn!(platform = %platform, "platform stopped before it was bridged"),
            }
        }
        info!(prefix = %bridge.prefix, "device bridge started");
        bridge
    }

    /// Forward the events of one platform to its devices.
    pub fn attach(&mut self, handle: &FopHandle) {
        let task = run_outbound(handle.subscribe(), self.bus.clone(), self.client.clone(), self.prefix.clone())
            .instrument(info_span!("bridge_outbound", platform = %handle.platform()));
        self.tasks.push(tokio::spawn(task));
    }

    pub fn stop(mut self) {
        self.abort_all();
    }

    fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for DeviceBridge {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl std::fmt::Debug for DeviceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBridge").field("prefix", &self.prefix).field("tasks", &self.tasks.len()).finish()
    }
}

async fn run_inbound(
    mut subscription: Subscription,
    registry: Arc<FopRegistry>,
    health: Arc<Mutex<DeviceHealth>>,
    clock: Arc<dyn Clock>,
) {
    while let Some(message) = subscription.recv().await {
        if let Err(reason) = route_inbound(&registry, &health, clock.now(), &message) {
            warn!(topic = %message.topic, payload = %message.payload, %reason, "device message dropped");
        }
    }
    debug!("bus closed");
}

fn route_inbound(
    registry: &FopRegistry,
    health: &Mutex<DeviceHealth>,
    now: Instant,
    message: &BusMessage,
) -> Result<(), Dropped> {
    let topic = Topic::parse(&message.topic)?;
    if topic.direction != Direction::In {
        return Err(Dropped::WrongDirection);
    }
    let parsed = parse_inbound(topic.role, &message.payload)?;
    let handle = registry.running(&topic.platform).ok_or_else(|| Dropped::NotRunning(topic.platform.clone()))?;

    let recovered = health.lock().unwrap_or_else(PoisonError::into_inner).seen(&topic.platform, topic.role, now);
    if recovered {
        handle.try_send(FopCommand::DeviceStatus { role: topic.role, stale: false }, Origin::Device)?;
    }
    if let DeviceMessage::Command(command) = parsed {
        debug!(platform = %topic.platform, role = %topic.role, command = command.kind(), "device command");
        handle.try_send(command, Origin::Device)?;
    }
    Ok(())
}

async fn run_watchdog(
    registry: Arc<FopRegistry>,
    health: Arc<Mutex<DeviceHealth>>,
    clock: Arc<dyn Clock>,
    stale_after_ms: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_millis((stale_after_ms / 4).max(50)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let stale = health.lock().unwrap_or_else(PoisonError::into_inner).newly_stale(clock.now());
        for (platform, role) in stale {
            warn!(platform = %platform, %role, "device silent");
            let status = FopCommand::DeviceStatus { role, stale: true };
            let Some(handle) = registry.running(&platform) else {
                debug!(platform = %platform, "platform not running, stale device not reported");
                continue;
            };
            if let Err(err) = handle.try_send(status, Origin::Device) {
                warn!(platform = %platform, %err, "stale device not reported");
            }
        }
    }
}

async fn run_outbound(
    mut events: broadcast::Receiver<PublishedEvent>,
    bus: Arc<dyn MessageBus>,
    client: BusClient,
    prefix: String,
) {
    loop {
        match events.recv().await {
            Ok(published) => {
                for (role, payload) in encode_outbound(&published.event) {
                    let topic = Topic::outbound(&prefix, &published.platform, role).to_string();
                    if let Err(err) = bus.publish(&client, &topic, &payload) {
                        warn!(%topic, %err, "device message not published");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "device output lagging, events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("platform closed");
}
