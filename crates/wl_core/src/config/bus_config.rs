//! Device message bus configuration

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusMode {
    /// In-process broker, the default for single-machine installations.
    Embedded,
    /// Broker reached over the network by an adapter implementing `MessageBus`.
    External { host: String, port: u16 },
}

/// Per-installation publish credentials. Only the password hash is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusCredentials {
    pub username: String,
    /// Lowercase hex SHA-256 of the password.
    pub password_sha256: String,
}

impl BusCredentials {
    pub fn from_password(username: &str, password: &str) -> Self {
        Self { username: username.to_string(), password_sha256: sha256_hex(password) }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        let candidate = sha256_hex(password);
        let expected = self.password_sha256.to_lowercase();
        let same_digest: bool = candidate.as_bytes().ct_eq(expected.as_bytes()).into();
        same_digest && self.username == username
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BusConfig {
    /// First topic segment, e.g. `wl/in/A/referee`
    #[validate(length(min = 1))]
    pub topic_prefix: String,
    pub mode: BusMode,
    /// When set, clients must authenticate before publishing.
    pub credentials: Option<BusCredentials>,
    /// Silence after which a device role is reported stale (default: 15 s)
    #[validate(range(min = 1000))]
    pub device_stale_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic_prefix: "wl".to_string(),
            mode: BusMode::Embedded,
            credentials: None,
            device_stale_ms: 15_000,
        }
    }
}
