//! In-process change source backed by a `tokio::sync::broadcast` channel.

use crate::error::{ChangeSourceErrorKind, Error};
use crate::{ChangeSource, ChangeSubscription, RawPayload};
use async_trait::async_trait;
use log::*;
use tokio::sync::broadcast;

/// Default number of payloads buffered per subscription before it lags.
pub const DEFAULT_CAPACITY: usize = 100;

/// A [`ChangeSource`] fed by calling [`MemoryChangeSource::publish`].
///
/// Payloads published while nobody is subscribed are discarded, matching the
/// behavior of a PostgreSQL `NOTIFY` with no listener.
pub struct MemoryChangeSource {
    sender: broadcast::Sender<RawPayload>,
}

impl MemoryChangeSource {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a payload to every current subscription.
    /// Returns the number of subscriptions that will see it.
    pub fn publish(&self, payload: impl Into<RawPayload>) -> usize {
        self.sender.send(payload.into()).unwrap_or(0)
    }

    pub fn subscription_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryChangeSource {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ChangeSource for MemoryChangeSource {
    async fn subscribe(&self) -> Result<Box<dyn ChangeSubscription>, Error> {
        Ok(Box::new(MemoryChangeSubscription {
            receiver: self.sender.subscribe(),
        }))
    }
}

struct MemoryChangeSubscription {
    receiver: broadcast::Receiver<RawPayload>,
}

#[async_trait]
impl ChangeSubscription for MemoryChangeSubscription {
    async fn next_change(&mut self) -> Result<RawPayload, Error> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Ok(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Memory change subscription lagged, skipped {skipped} payload(s)");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::new(ChangeSourceErrorKind::Closed));
                }
            }
        }
    }
}
