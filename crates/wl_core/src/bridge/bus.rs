//! Publish/subscribe transport used by the device bridge.
//!
//! [`EmbeddedBus`] is the in-process broker. An adapter for an external
//! broker implements the same [`MessageBus`] trait.

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use super::TopicFilter;
use crate::config::BusCredentials;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("client {0} is not authenticated")]
    Unauthorized(Uuid),

    #[error("malformed topic: {0:?}")]
    MalformedTopic(String),

    #[error("bus closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
    /// Publishing client.
    pub client: Uuid,
}

/// A connection to the bus. Only authenticated clients may publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusClient {
    pub id: Uuid,
    pub username: Option<String>,
    authenticated: bool,
}

impl BusClient {
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

pub trait MessageBus: Send + Sync {
    /// Connect a device. Bad or missing credentials still yield a client,
    /// but one whose publishes are refused.
    fn connect(&self, username: Option<&str>, password: Option<&str>) -> BusClient;

    /// Client the engine itself publishes with.
    fn internal_client(&self) -> BusClient;

    fn publish(&self, client: &BusClient, topic: &str, payload: &str) -> Result<(), BusError>;

    fn subscribe(&self, filter: TopicFilter) -> Subscription;
}

/// Messages matching one filter.
#[derive(Debug)]
pub struct Subscription {
    filter: TopicFilter,
    rx: broadcast::Receiver<BusMessage>,
}

impl Subscription {
    pub fn new(filter: TopicFilter, rx: broadcast::Receiver<BusMessage>) -> Self {
        Self { filter, rx }
    }

    /// Next matching message; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) if self.filter.matches(&message.topic) => return Some(message),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "bus subscriber lagging, messages lost");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process broker on a broadcast channel.
#[derive(Debug)]
pub struct EmbeddedBus {
    tx: broadcast::Sender<BusMessage>,
    credentials: Option<BusCredentials>,
}

impl EmbeddedBus {
    pub fn new(capacity: usize, credentials: Option<BusCredentials>) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, credentials }
    }
}

impl MessageBus for EmbeddedBus {
    fn connect(&self, username: Option<&str>, password: Option<&str>) -> BusClient {
        let authenticated = match (&self.credentials, username, password) {
            (None, _, _) => true,
            (Some(creds), Some(user), Some(pass)) => creds.verify(user, pass),
            (Some(_), _, _) => false,
        };
        let client = BusClient { id: Uuid::new_v4(), username: username.map(str::to_string), authenticated };
        if authenticated {
            debug!(client = %client.id, "bus client connected");
        } else {
            warn!(client = %client.id, username = ?username, "bus client failed authentication");
        }
        client
    }

    fn internal_client(&self) -> BusClient {
        BusClient { id: Uuid::new_v4(), username: None, authenticated: true }
    }

    fn publish(&self, client: &BusClient, topic: &str, payload: &str) -> Result<(), BusError> {
        if !client.authenticated {
            warn!(client = %client.id, topic, "publish from unauthenticated client dropped");
            return Err(BusError::Unauthorized(client.id));
        }
        if topic.is_empty() || topic.contains(['+', '#']) {
            return Err(BusError::MalformedTopic(topic.to_string()));
        }
        let message =
            BusMessage { topic: topic.to_string(), payload: payload.to_string(), client: client.id };
        // nobody listening is fine
        let _ = self.tx.send(message);
        Ok(())
    }

    fn subscribe(&self, filter: TopicFilter) -> Subscription {
        Subscription::new(filter, self.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_filters_topics() {
        let bus = EmbeddedBus::new(16, None);
        let client = bus.connect(None, None);
        let mut sub = bus.subscribe(TopicFilter::new("wl/in/+/referee"));
        bus.publish(&client, "wl/in/A/jury", "1 good").unwrap();
        bus.publish(&client, "wl/in/A/referee", "2 bad").unwrap();
        let message = sub.recv().await.unwrap();
        assert_eq!(message.topic, "wl/in/A/referee");
        assert_eq!(message.payload, "2 bad");
        assert_eq!(message.client, client.id);
    }

    #[test]
    fn test_credentials_gate_publish() {
        let bus = EmbeddedBus::new(16, Some(BusCredentials::from_password("dev", "pw")));
        let good = bus.connect(Some("dev"), Some("pw"));
        let wrong = bus.connect(Some("dev"), Some("nope"));
        let anonymous = bus.connect(None, None);
        assert!(good.is_authenticated());
        assert!(bus.publish(&good, "wl/in/A/referee", "1 good").is_ok());
        assert_eq!(
            bus.publish(&wrong, "wl/in/A/referee", "1 good"),
            Err(BusError::Unauthorized(wrong.id))
        );
        assert!(bus.publish(&anonymous, "wl/in/A/referee", "1 good").is_err());
        assert!(bus.internal_client().is_authenticated());
    }

    #[test]
    fn test_wildcard_topic_rejected_on_publish() {
        let bus = EmbeddedBus::new(16, None);
        let client = bus.connect(None, None);
        assert!(matches!(bus.publish(&client, "wl/in/+/referee", "x"), Err(BusError::MalformedTopic(_))));
    }
}
