use crate::hub::Hub;
use crate::message::Payload;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Unique identifier for a subscriber (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The receiving end of one registered streaming connection.
///
/// The hub keeps the sending half of the queue in its registry. This handle is
/// the only way to read from the queue and to ask the hub to forget it.
/// Dropping the handle asks the hub to unregister it, so a subscriber can
/// never outlive its connection.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    receiver: mpsc::Receiver<Payload>,
    // Taken on the first unregister request, which makes the request one-shot.
    hub: Option<Hub>,
}

impl Subscriber {
    pub(crate) fn new(id: SubscriberId, receiver: mpsc::Receiver<Payload>, hub: Hub) -> Self {
        Self {
            id,
            receiver,
            hub: Some(hub),
        }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Wait for the next broadcast payload.
    /// Returns `None` once the hub has closed this subscriber's queue and
    /// everything already queued has been read.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Payload, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Ask the hub to remove this subscriber. Only the first call sends a
    /// request; later calls and the eventual drop do nothing.
    pub fn unregister(&mut self) {
        if let Some(hub) = self.hub.take() {
            hub.unregister(&self.id);
        }
    }

    pub fn unregister_requested(&self) -> bool {
        self.hub.is_none()
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.unregister();
    }
}
