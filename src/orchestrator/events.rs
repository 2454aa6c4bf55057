use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Events pushed from the wallet to connected pages.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProviderEvent {
    #[serde(rename_all = "camelCase")]
    Connect { public_key: String, accounts: Vec<String> },
    Disconnect,
    #[serde(rename_all = "camelCase")]
    AccountChanged { public_key: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum EventScope {
    Origin(String),
    Global,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScopedEvent {
    pub scope: EventScope,
    #[serde(flatten)]
    pub event: ProviderEvent,
}

impl ScopedEvent {
    /// Whether a tab showing `origin` should receive this event.
    pub fn applies_to(&self, origin: &str) -> bool {
        match &self.scope {
            EventScope::Global => true,
            EventScope::Origin(o) => o == origin,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ScopedEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScopedEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers reached; zero is not an error.
    pub fn emit(&self, scope: EventScope, event: ProviderEvent) -> usize {
        debug!("event {:?} -> {:?}", event, scope);
        self.sender.send(ScopedEvent { scope, event }).unwrap_or(0)
    }
}
