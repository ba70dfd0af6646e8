use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::DeviceRole;
use crate::models::PlatformId;

type DeviceKey = (PlatformId, DeviceRole);

/// Last time each device role was heard from on each platform.
///
/// Only devices seen at least once are tracked; each one is reported stale
/// once per silence.
#[derive(Debug)]
pub struct DeviceHealth {
    stale_after_ms: u64,
    last_seen: HashMap<DeviceKey, Instant>,
    stale: HashSet<DeviceKey>,
}

impl DeviceHealth {
    pub fn new(stale_after_ms: u64) -> Self {
        Self { stale_after_ms, last_seen: HashMap::new(), stale: HashSet::new() }
    }

    /// Record traffic; true when the device had been reported stale.
    pub fn seen(&mut self, platform: &PlatformId, role: DeviceRole, now: Instant) -> bool {
        let key = (platform.clone(), role);
        let recovered = self.stale.remove(&key);
        self.last_seen.insert(key, now);
        recovered
    }

    pub fn newly_stale(&mut self, now: Instant) -> Vec<DeviceKey> {
        let mut found: Vec<DeviceKey> = self
            .last_seen
            .iter()
            .filter(|(key, at)| {
                !self.stale.contains(*key)
                    && now.saturating_duration_since(**at).as_millis() > u128::from(self.stale_after_ms)
            })
            .map(|(key, _)| key.clone())
            .collect();
        found.sort();
        self.stale.extend(found.iter().cloned());
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{Clock, ManualClock};

    #[test]
    fn test_stale_reported_once_then_recovers() {
        let clock = ManualClock::new();
        let mut health = DeviceHealth::new(1_000);
        let a = PlatformId::new("A");
        assert!(!health.seen(&a, DeviceRole::Referee, clock.now()));
        health.seen(&a, DeviceRole::Jury, clock.now());

        clock.advance(600);
        health.seen(&a, DeviceRole::Jury, clock.now());
        clock.advance(600);
        assert_eq!(health.newly_stale(clock.now()), vec![(a.clone(), DeviceRole::Referee)]);
        assert!(health.newly_stale(clock.now()).is_empty());

        assert!(health.seen(&a, DeviceRole::Referee, clock.now()), "back after being stale");
        assert!(!health.seen(&a, DeviceRole::Referee, clock.now()));
    }

    #[test]
    fn test_unseen_devices_are_not_tracked() {
        let clock = ManualClock::new();
        let mut health = DeviceHealth::new(1_000);
        clock.advance(60_000);
        assert!(health.newly_stale(clock.now()).is_empty());
    }
}
