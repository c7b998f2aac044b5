//! PostgreSQL `LISTEN/NOTIFY` change source.
//!
//! Writers (or triggers) run `NOTIFY <channel>, '<json>'` after a commit. Each
//! subscription opens a dedicated listener connection from the shared pool
//! and yields the notification payloads verbatim.

use async_trait::async_trait;
use events::error::{ChangeSourceErrorKind, Error};
use events::{ChangeSource, ChangeSubscription, RawPayload};
use log::*;
use sqlx::postgres::{PgListener, PgPool};

pub struct PgChangeSource {
    pool: PgPool,
    channel: String,
}

impl PgChangeSource {
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl ChangeSource for PgChangeSource {
    async fn subscribe(&self) -> Result<Box<dyn ChangeSubscription>, Error> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| Error::with_source(ChangeSourceErrorKind::Unavailable, e))?;

        listener
            .listen(&self.channel)
            .await
            .map_err(|e| Error::with_source(ChangeSourceErrorKind::Unavailable, e))?;

        info!("Listening for changes on channel {}", self.channel);
        Ok(Box::new(PgChangeSubscription { listener }))
    }
}

struct PgChangeSubscription {
    listener: PgListener,
}

#[async_trait]
impl ChangeSubscription for PgChangeSubscription {
    async fn next_change(&mut self) -> Result<RawPayload, Error> {
        let notification = self
            .listener
            .recv()
            .await
            .map_err(|e| Error::with_source(ChangeSourceErrorKind::Disconnected, e))?;

        trace!(
            "Received notification on {} from backend pid {}",
            notification.channel(),
            notification.process_id()
        );
        Ok(notification.payload().as_bytes().to_vec())
    }
}
