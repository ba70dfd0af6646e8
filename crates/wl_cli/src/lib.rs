//! Harness library: load competition data, replay an operator script against
//! running platforms and collect what they publish.
//!
//! Script format is one JSON object per line:
//!
//! ```text
//! {"platform": "A", "command": {"type": "switch_group", "group": "A1"}}
//! {"platform": "A", "command": {"type": "start_lifting"}, "pause_ms": 500}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use wl_core::models::{draw_lots, AthleteId, CompetitionData, GroupId, PlatformId};
use wl_core::{
    EngineConfig, FopCommand, FopEvent, FopRegistry, InMemoryStore, Origin, Providers, PublishedEvent,
    SystemClock,
};

/// One scripted operator action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub platform: PlatformId,
    pub command: FopCommand,
    /// Real time to wait after sending, so clocks and decision displays can run.
    #[serde(default)]
    pub pause_ms: u64,
}

pub fn parse_script(text: &str) -> Result<Vec<ScriptLine>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("script line {}: {}", index + 1, line.trim()))
        })
        .collect()
}

pub fn load_competition(path: &Path) -> Result<CompetitionData> {
    CompetitionData::from_path(path)
        .with_context(|| format!("Failed to load competition data: {}", path.display()))
}

/// YAML file if given, otherwise the `WL_ENGINE_PROFILE` preset.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("Failed to load engine configuration: {}", path.display())),
        None => Ok(EngineConfig::from_env_or_default()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SchemaKind {
    Command,
    Event,
    Data,
}

pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let schema = match kind {
        SchemaKind::Command => FopCommand::json_schema(),
        SchemaKind::Event => schemars::schema_for!(PublishedEvent),
        SchemaKind::Data => CompetitionData::json_schema(),
    };
    Ok(serde_json::to_string_pretty(&schema)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotDraw {
    pub lot_number: u32,
    pub athlete: AthleteId,
    pub name: String,
}

/// Lot numbers for the athletes of `group`, reproducible from `seed`.
pub fn draw(data: &CompetitionData, group: &GroupId, seed: u64) -> Result<Vec<LotDraw>> {
    let Some(group) = data.groups.iter().find(|g| &g.id == group) else {
        bail!("unknown group {group}");
    };
    let mut athletes: Vec<_> =
        data.athletes.iter().filter(|a| group.athletes.contains(&a.id)).cloned().collect();
    draw_lots(&mut athletes, seed);
    let mut draws: Vec<LotDraw> = athletes
        .into_iter()
        .map(|a| LotDraw { lot_number: a.lot_number, athlete: a.id, name: a.name })
        .collect();
    draws.sort_by_key(|d| d.lot_number);
    Ok(draws)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub platforms: usize,
    pub commands: usize,
    pub rejected: usize,
    pub events: usize,
}

/// Start every platform, replay `script` and shut down, writing each
/// published event to `out` as a JSON line as it arrives.
///
/// Events of one platform keep their publication order; platforms interleave.
pub async fn run<W: Write>(
    data: CompetitionData,
    config: EngineConfig,
    script: &[ScriptLine],
    out: &mut W,
) -> Result<RunSummary> {
    let store = Arc::new(InMemoryStore::new(data));
    let registry = FopRegistry::new(config, Providers::in_memory(store), Arc::new(SystemClock));
    let platforms = registry.load().context("Competition could not be loaded")?;
    info!(platforms = platforms.len(), "competition loaded");

    let (forward, mut arrivals) = mpsc::unbounded_channel();
    let mut collectors = Vec::with_capacity(platforms.len());
    for platform in &platforms {
        let rx = registry.get(platform)?.subscribe();
        collectors.push(tokio::spawn(collect(platform.clone(), rx, forward.clone())));
    }
    drop(forward);

    let mut summary = RunSummary { platforms: platforms.len(), commands: script.len(), ..Default::default() };
    for (index, line) in script.iter().enumerate() {
        let handle = registry
            .get(&line.platform)
            .with_context(|| format!("script line {} targets platform {}", index + 1, line.platform))?;
        debug!(platform = %line.platform, command = line.command.kind(), "scripted command");
        handle.send(line.command.clone(), Origin::Operator).await?;
        // round trip so the command is applied before the next one is read
        handle.snapshot().await?;
        if line.pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(line.pause_ms)).await;
        }
        while let Ok(event) = arrivals.try_recv() {
            write_event(&event, out, &mut summary)?;
        }
    }
    registry.shutdown_all().await;

    for collector in collectors {
        collector.await.context("event collector failed")?;
    }
    while let Some(event) = arrivals.recv().await {
        write_event(&event, out, &mut summary)?;
    }
    Ok(summary)
}

/// Forward one platform's events until its field of play is gone.
async fn collect(
    platform: PlatformId,
    mut rx: tokio::sync::broadcast::Receiver<PublishedEvent>,
    forward: mpsc::UnboundedSender<PublishedEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if forward.send(event).is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(platform = %platform, missed, "events lost, raise actor.event_capacity")
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn write_event<W: Write>(event: &PublishedEvent, out: &mut W, summary: &mut RunSummary) -> Result<()> {
    if matches!(event.event, FopEvent::CommandRejected { .. }) {
        summary.rejected += 1;
    }
    summary.events += 1;
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)?;
    Ok(())
}
