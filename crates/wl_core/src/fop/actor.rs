//! Per-platform actor.
//!
//! One task owns the [`FieldOfPlay`] and applies queued inputs strictly in
//! arrival order, so operator commands, device messages and timer ticks never
//! interleave inside a transition. A ticker task feeds `TimerTick` through the
//! same queue. Published events go out on a broadcast channel; a subscriber
//! that falls behind loses events and resynchronizes with [`FopHandle::snapshot`].

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, info_span, warn, Instrument};

use super::{FieldOfPlay, FopCommand, FopEvent, FopSnapshot};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::PlatformId;

/// Where a queued command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Operator,
    Device,
    Timer,
}

/// An event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PublishedEvent {
    pub platform: PlatformId,
    /// Gap-free per platform, starting at 1.
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: FopEvent,
}

#[derive(Debug)]
enum Inbound {
    Command { command: FopCommand, origin: Origin },
    Snapshot(oneshot::Sender<FopSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to a running field of play.
#[derive(Debug, Clone)]
pub struct FopHandle {
    platform: PlatformId,
    tx: mpsc::Sender<Inbound>,
    events: broadcast::Sender<PublishedEvent>,
}

impl FopHandle {
    /// Start the actor and its ticker on the current tokio runtime.
    pub fn spawn(fop: FieldOfPlay, config: &EngineConfig) -> Self {
        let platform = fop.platform().clone();
        let (tx, rx) = mpsc::channel(config.actor.queue_capacity);
        let (events, _) = broadcast::channel(config.actor.event_capacity);

        let span = info_span!("fop", platform = %platform);
        let ticker = spawn_ticker(tx.downgrade(), config.timer.tick_ms, span.clone());
        let actor = Actor { fop, rx, events: events.clone(), seq: 0, backlog: VecDeque::new(), ticker };
        tokio::spawn(actor.run().instrument(span));

        Self { platform, tx, events }
    }

    pub fn platform(&self) -> &PlatformId {
        &self.platform
    }

    /// Queue a command, waiting for room.
    pub async fn send(&self, command: FopCommand, origin: Origin) -> Result<()> {
        self.tx
            .send(Inbound::Command { command, origin })
            .await
            .map_err(|_| EngineError::PlatformClosed(self.platform.clone()))
    }

    /// Queue a command without waiting; a full queue is reported, not awaited.
    pub fn try_send(&self, command: FopCommand, origin: Origin) -> Result<()> {
        match self.tx.try_send(Inbound::Command { command, origin }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(EngineError::QueueFull(self.platform.clone())),
            Err(TrySendError::Closed(_)) => Err(EngineError::PlatformClosed(self.platform.clone())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }

    /// Current state, answered in queue order after everything sent before.
    pub async fn snapshot(&self) -> Result<FopSnapshot> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(Inbound::Snapshot(reply))
            .await
            .map_err(|_| EngineError::PlatformClosed(self.platform.clone()))?;
        answer.await.map_err(|_| EngineError::PlatformClosed(self.platform.clone()))
    }

    /// Stop the platform. Commands still queued are discarded. Returns once
    /// the final events are published; a second call is a no-op.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Inbound::Shutdown(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct Actor {
    fop: FieldOfPlay,
    rx: mpsc::Receiver<Inbound>,
    events: broadcast::Sender<PublishedEvent>,
    seq: u64,
    /// Inputs pulled off the queue during a group switch and kept.
    backlog: VecDeque<Inbound>,
    ticker: JoinHandle<()>,
}

impl Actor {
    async fn run(mut self) {
        info!("field of play running");
        loop {
            let inbound = match self.backlog.pop_front() {
                Some(inbound) => inbound,
                None => match self.rx.recv().await {
                    Some(inbound) => inbound,
                    None => break,
                },
            };
            match inbound {
                Inbound::Command { command, origin } => self.handle(command, origin),
                Inbound::Snapshot(reply) => {
                    let _ = reply.send(self.fop.snapshot());
                }
                Inbound::Shutdown(ack) => {
                    self.stop();
                    let _ = ack.send(());
                    return;
                }
            }
        }
        // every handle was dropped
        self.stop();
    }

    fn handle(&mut self, command: FopCommand, origin: Origin) {
        if !matches!(command, FopCommand::TimerTick) {
            debug!(command = command.kind(), ?origin, "command");
        }
        let switching = matches!(command, FopCommand::SwitchGroup { .. });
        let events = self.fop.submit(command);
        let switched = switching && events.iter().any(|e| matches!(e, FopEvent::SwitchGroup { .. }));
        self.publish(events);
        if switched {
            self.discard_stale_inputs();
        }
    }

    /// Device messages and ticks queued before a group switch refer to the
    /// previous group; operator commands are kept.
    fn discard_stale_inputs(&mut self) {
        while let Ok(inbound) = self.rx.try_recv() {
            self.backlog.push_back(inbound);
        }
        let before = self.backlog.len();
        self.backlog.retain(|inbound| {
            !matches!(inbound, Inbound::Command { origin: Origin::Device | Origin::Timer, .. })
        });
        let dropped = before - self.backlog.len();
        if dropped > 0 {
            info!(dropped, "discarded device and timer input queued before the group switch");
        }
    }

    fn publish(&mut self, events: Vec<FopEvent>) {
        for event in events {
            self.seq += 1;
            let published = PublishedEvent {
                platform: self.fop.platform().clone(),
                seq: self.seq,
                at: Utc::now(),
                event,
            };
            // no subscriber is not an error
            let _ = self.events.send(published);
        }
    }

    fn stop(&mut self) {
        self.ticker.abort();
        self.rx.close();
        let mut discarded = self.backlog.len();
        self.backlog.clear();
        let mut acks = Vec::new();
        while let Ok(inbound) = self.rx.try_recv() {
            if let Inbound::Shutdown(ack) = inbound {
                acks.push(ack);
            } else {
                discarded += 1;
            }
        }
        if discarded > 0 {
            warn!(discarded, "inputs discarded at shutdown");
        }
        let events = self.fop.shutdown();
        self.publish(events);
        info!(events_published = self.seq, "field of play stopped");
        for ack in acks {
            let _ = ack.send(());
        }
    }
}

fn spawn_ticker(tx: mpsc::WeakSender<Inbound>, tick_ms: u64, span: tracing::Span) -> JoinHandle<()> {
    let ticks = async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let Some(tx) = tx.upgrade() else {
                break;
            };
            let tick = Inbound::Command { command: FopCommand::TimerTick, origin: Origin::Timer };
            match tx.try_send(tick) {
                // a dropped tick carries nothing the next one lacks
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => break,
            }
        }
        debug!("ticker stopped");
    };
    tokio::spawn(ticks.instrument(span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::decision::Vote;
    use crate::fixtures;
    use crate::providers::{InMemoryStore, Providers};
    use crate::timer::{Clock, ManualClock, SystemClock};

    fn spawn_with(clock: Arc<dyn Clock>, config: EngineConfig) -> FopHandle {
        let store = Arc::new(InMemoryStore::new(fixtures::competition()));
        let fop = FieldOfPlay::new("A".into(), config.clone(), Providers::in_memory(store), clock);
        FopHandle::spawn(fop, &config)
    }

    fn spawn_manual() -> FopHandle {
        spawn_with(Arc::new(ManualClock::new()), EngineConfig::default())
    }

    /// Events received so far, ticks produce none on a manual clock.
    fn drain(rx: &mut broadcast::Receiver<PublishedEvent>) -> Vec<PublishedEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_commands_applied_in_order_with_gap_free_seq() {
        let handle = spawn_manual();
        let mut rx = handle.subscribe();
        handle.send(FopCommand::SwitchGroup { group: "A1".into() }, Origin::Operator).await.unwrap();
        handle.send(FopCommand::StartLifting, Origin::Operator).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, crate::fop::FopState::CurrentAthleteDisplayed);

        let events = drain(&mut rx);
        assert!(matches!(events[0].event, FopEvent::SwitchGroup { .. }));
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        let expected: Vec<u64> = (1..=events.len() as u64).collect();
        assert_eq!(seqs, expected);
        assert!(events.iter().all(|e| e.platform.as_str() == "A"));
    }

    #[tokio::test]
    async fn test_group_switch_discards_queued_device_input() {
        let handle = spawn_manual();
        let mut rx = handle.subscribe();
        handle.send(FopCommand::SwitchGroup { group: "A1".into() }, Origin::Operator).await.unwrap();
        handle.send(FopCommand::StartLifting, Origin::Operator).await.unwrap();
        handle.snapshot().await.unwrap();
        drain(&mut rx);

        // queued together; the actor has not run yet on this thread
        handle.try_send(FopCommand::SwitchGroup { group: "A1".into() }, Origin::Operator).unwrap();
        let vote = FopCommand::DecisionUpdate { referee: 1, vote: Vote::Good, attempt_seq: None };
        handle.try_send(vote, Origin::Device).unwrap();
        handle.try_send(FopCommand::StartLifting, Origin::Operator).unwrap();
        let snapshot = handle.snapshot().await.unwrap();

        assert_eq!(snapshot.votes, [None, None, None]);
        assert_eq!(snapshot.state, crate::fop::FopState::CurrentAthleteDisplayed);
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e.event, FopEvent::CommandRejected { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_reports_incomplete_decision() {
        let handle = spawn_manual();
        let mut rx = handle.subscribe();
        handle.send(FopCommand::SwitchGroup { group: "A1".into() }, Origin::Operator).await.unwrap();
        handle.send(FopCommand::StartLifting, Origin::Operator).await.unwrap();
        let vote = FopCommand::DecisionUpdate { referee: 2, vote: Vote::Bad, attempt_seq: None };
        handle.send(vote, Origin::Device).await.unwrap();

        handle.shutdown().await;
        assert!(handle.is_closed());
        let events = drain(&mut rx);
        assert!(matches!(
            events.last().map(|e| &e.event),
            Some(FopEvent::DecisionIncomplete { .. })
        ));

        let err = handle.send(FopCommand::StartLifting, Origin::Operator).await.unwrap_err();
        assert!(matches!(err, EngineError::PlatformClosed(_)));
        assert!(handle.snapshot().await.is_err());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_ticker_expires_attempt_clock() {
        let mut config = EngineConfig::default();
        config.timer.tick_ms = 10;
        config.timer.attempt_ms = 200;
        config.timer.first_warning_ms = None;
        config.timer.final_warning_ms = None;
        let handle = spawn_with(Arc::new(SystemClock), config);
        let mut rx = handle.subscribe();
        handle.send(FopCommand::SwitchGroup { group: "A1".into() }, Origin::Operator).await.unwrap();
        handle.send(FopCommand::StartLifting, Origin::Operator).await.unwrap();
        handle.send(FopCommand::TimeStarted, Origin::Operator).await.unwrap();

        let expired = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(PublishedEvent { event: FopEvent::TimeExpired, .. }) => return true,
                    Ok(_) => {}
                    Err(_) => return false,
                }
            }
        })
        .await;
        assert!(matches!(expired, Ok(true)));
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, crate::fop::FopState::TimeStopped);
        assert_eq!(snapshot.clock_remaining_ms, 0);
    }

    #[tokio::test]
    async fn test_try_send_reports_full_queue() {
        let mut config = EngineConfig::default();
        config.actor.queue_capacity = 1;
        config.timer.tick_ms = 60_000;
        let handle = spawn_with(Arc::new(ManualClock::new()), config);
        // the actor cannot run until this test yields
        let mut results = Vec::new();
        for _ in 0..3 {
            results.push(handle.try_send(FopCommand::TimeStopped, Origin::Operator));
        }
        assert!(results.iter().any(|r| matches!(r, Err(EngineError::QueueFull(_)))));
    }
}
