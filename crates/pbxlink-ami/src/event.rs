use std::sync::Arc;

use pbxlink_frame::HeaderBlock;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::AmiError;

/// Header naming an event.
pub const EVENT_KEY: &str = "Event";

/// Prefix of per-name topics: `Shutdown` is published as `eventShutdown`.
pub const EVENT_PREFIX: &str = "event";

/// Catch-all topic every event is published on.
pub const ANY_EVENT_TOPIC: &str = "eventAny";

/// An unsolicited manager message carrying `Event: <name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmiEvent {
    name: String,
    message: HeaderBlock,
}

impl AmiEvent {
    /// Wrap `message` if it has a non-empty `Event` field; hands it back otherwise.
    pub fn from_message(message: HeaderBlock) -> Result<Self, HeaderBlock> {
        let name = match message.get(EVENT_KEY) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(message),
        };
        Ok(Self { name, message })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full message, `Event` field included.
    pub fn message(&self) -> &HeaderBlock {
        &self.message
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.message.get(key)
    }

    /// Name-specific topic, e.g. `eventShutdown`.
    pub fn topic(&self) -> String {
        format!("{EVENT_PREFIX}{}", self.name)
    }

    pub fn into_message(self) -> HeaderBlock {
        self.message
    }
}

/// Receiver for events from one client, optionally limited to one name.
#[derive(Debug)]
pub struct EventSubscription {
    rx: broadcast::Receiver<Arc<AmiEvent>>,
    name: Option<String>,
}

impl EventSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<Arc<AmiEvent>>, name: Option<String>) -> Self {
        Self { rx, name }
    }

    /// Event name this subscription is limited to, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Topic this subscription listens on: `eventAny` or `event<Name>`.
    pub fn topic(&self) -> String {
        match &self.name {
            Some(name) => format!("{EVENT_PREFIX}{name}"),
            None => ANY_EVENT_TOPIC.to_string(),
        }
    }

    /// Next matching event.
    ///
    /// Skips events lost to a slow reader (logged) and returns
    /// [`AmiError::ConnectionClosed`] once the client's connection has ended.
    pub async fn recv(&mut self) -> crate::Result<Arc<AmiEvent>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic(), skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(AmiError::ConnectionClosed),
            }
        }
    }

    fn matches(&self, event: &AmiEvent) -> bool {
        self.name.as_deref().is_none_or(|name| name == event.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> Arc<AmiEvent> {
        let message: HeaderBlock = [("Event", name), ("Privilege", "system,all")]
            .into_iter()
            .collect();
        Arc::new(AmiEvent::from_message(message).unwrap())
    }

    #[test]
    fn topic_is_prefix_plus_name() {
        assert_eq!(event("Shutdown").topic(), "eventShutdown");
        assert_eq!(event("FullyBooted").name(), "FullyBooted");
    }

    #[test]
    fn message_without_event_is_not_an_event() {
        let message: HeaderBlock = [("Response", "Success")].into_iter().collect();
        assert!(AmiEvent::from_message(message).is_err());
        let message: HeaderBlock = [("Event", "")].into_iter().collect();
        assert!(AmiEvent::from_message(message).is_err());
    }

    #[tokio::test]
    async fn named_subscription_filters() {
        let (tx, rx) = broadcast::channel(8);
        let mut any = EventSubscription::new(rx.resubscribe(), None);
        let mut shutdown = EventSubscription::new(rx, Some("Shutdown".to_string()));
        assert_eq!(any.topic(), ANY_EVENT_TOPIC);
        assert_eq!(shutdown.topic(), "eventShutdown");

        tx.send(event("FullyBooted")).unwrap();
        tx.send(event("Shutdown")).unwrap();

        assert_eq!(any.recv().await.unwrap().name(), "FullyBooted");
        assert_eq!(any.recv().await.unwrap().name(), "Shutdown");
        assert_eq!(shutdown.recv().await.unwrap().name(), "Shutdown");

        drop(tx);
        assert!(matches!(shutdown.recv().await, Err(AmiError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = EventSubscription::new(rx, None);
        for name in ["A", "B", "C", "D"] {
            tx.send(event(name)).unwrap();
        }
        assert_eq!(sub.recv().await.unwrap().name(), "C");
        assert_eq!(sub.recv().await.unwrap().name(), "D");
    }
}
