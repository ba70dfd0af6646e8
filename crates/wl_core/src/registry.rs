//! Platform registry: one running field of play per platform.
//!
//! Fields of play are created lazily on first lookup of a known platform.
//! The registry also carries the one-time "competition ready" signal that the
//! outer surfaces wait on before accepting traffic.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::fop::{FieldOfPlay, FopHandle};
use crate::models::PlatformId;
use crate::providers::Providers;
use crate::timer::Clock;

#[derive(Debug)]
pub struct FopRegistry {
    config: EngineConfig,
    providers: Providers,
    clock: Arc<dyn Clock>,
    fops: RwLock<BTreeMap<PlatformId, FopHandle>>,
    ready_at: OnceCell<DateTime<Utc>>,
    ready_tx: watch::Sender<bool>,
}

impl FopRegistry {
    pub fn new(config: EngineConfig, providers: Providers, clock: Arc<dyn Clock>) -> Self {
        let (ready_tx, _ready_rx) = watch::channel(false);
        Self {
            config,
            providers,
            clock,
            fops: RwLock::new(BTreeMap::new()),
            ready_at: OnceCell::new(),
            ready_tx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a field of play for every platform and signal readiness.
    ///
    /// Failing to read the platform list, or an empty one, is fatal.
    pub fn load(&self) -> Result<Vec<PlatformId>> {
        let platforms = self
            .providers
            .platforms
            .platforms()
            .map_err(|err| EngineError::DataLoad(format!("cannot read platforms: {err}")))?;
        if platforms.is_empty() {
            return Err(EngineError::DataLoad("competition has no platform".to_string()));
        }
        let ids: Vec<PlatformId> = platforms.into_iter().map(|p| p.id).collect();
        for id in &ids {
            self.get(id)?;
        }
        self.mark_ready();
        Ok(ids)
    }

    /// Handle of `platform`, starting its field of play on first use.
    pub fn get(&self, platform: &PlatformId) -> Result<FopHandle> {
        if let Some(handle) = self.running(platform) {
            return Ok(handle);
        }
        if !self.known_platforms()?.contains(platform) {
            return Err(EngineError::UnknownPlatform(platform.clone()));
        }

        let mut fops = self.fops.write().unwrap_or_else(PoisonError::into_inner);
        // another caller may have won the race
        if let Some(handle) = fops.get(platform).filter(|h| !h.is_closed()) {
            return Ok(handle.clone());
        }
        let fop = FieldOfPlay::new(
            platform.clone(),
            self.config.clone(),
            self.providers.clone(),
            self.clock.clone(),
        );
        let handle = FopHandle::spawn(fop, &self.config);
        info!(platform = %platform, "field of play created");
        fops.insert(platform.clone(), handle.clone());
        Ok(handle)
    }

    /// Handle of `platform` if its field of play is running; never starts one.
    pub fn running(&self, platform: &PlatformId) -> Option<FopHandle> {
        let fops = self.fops.read().unwrap_or_else(PoisonError::into_inner);
        fops.get(platform).filter(|h| !h.is_closed()).cloned()
    }

    fn known_platforms(&self) -> Result<Vec<PlatformId>> {
        Ok(self.providers.platforms.platforms()?.into_iter().map(|p| p.id).collect())
    }

    /// Platforms with a running field of play.
    pub fn platforms(&self) -> Vec<PlatformId> {
        let fops = self.fops.read().unwrap_or_else(PoisonError::into_inner);
        fops.iter().filter(|(_, h)| !h.is_closed()).map(|(id, _)| id.clone()).collect()
    }

    /// The sole platform of the competition; ambiguous otherwise.
    pub fn default_platform(&self) -> Result<PlatformId> {
        let mut known = self.known_platforms()?;
        match known.len() {
            1 => Ok(known.remove(0)),
            n => Err(EngineError::NoDefaultPlatform(n)),
        }
    }

    /// Explicit platform if given, the default platform otherwise.
    pub fn resolve(&self, platform: Option<&PlatformId>) -> Result<FopHandle> {
        match platform {
            Some(id) => self.get(id),
            None => self.get(&self.default_platform()?),
        }
    }

    /// Fire the ready signal. Returns false if it had already fired.
    pub fn mark_ready(&self) -> bool {
        let now = Utc::now();
        let first = self.ready_at.set(now).is_ok();
        if first {
            info!(at = %now, "competition ready");
            self.ready_tx.send_replace(true);
        }
        first
    }

    pub fn is_ready(&self) -> bool {
        self.ready_at.get().is_some()
    }

    pub fn ready_at(&self) -> Option<DateTime<Utc>> {
        self.ready_at.get().copied()
    }

    pub fn ready_receiver(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// Wait until the ready signal has fired.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        // the sender lives as long as self, so this only ends on `true`
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Stop one platform and forget it; a later `get` starts a fresh one.
    pub async fn shutdown(&self, platform: &PlatformId) -> Result<()> {
        let handle = {
            let mut fops = self.fops.write().unwrap_or_else(PoisonError::into_inner);
            fops.remove(platform)
        };
        match handle {
            Some(handle) => {
                handle.shutdown().await;
                info!(platform = %platform, "platform shut down");
                Ok(())
            }
            None => {
                warn!(platform = %platform, "shutdown of a platform that is not running");
                Err(EngineError::UnknownPlatform(platform.clone()))
            }
        }
    }

    pub async fn shutdown_all(&self) {
        let handles: Vec<FopHandle> = {
            let mut fops = self.fops.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *fops).into_values().collect()
        };
        for handle in &handles {
            handle.shutdown().await;
        }
        info!(platforms = handles.len(), "all platforms shut down");
    }
}
