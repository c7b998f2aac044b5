//! Change notification sources for the read service.
//!
//! This crate defines the boundary between the backing store and the live
//! update machinery. A [`ChangeSource`] can be subscribed to, and each
//! [`ChangeSubscription`] yields opaque byte payloads whenever relevant data
//! changes.
//!
//! # Architecture
//!
//! - **ChangeSource**: Something that can hand out subscriptions (a PostgreSQL
//!   `LISTEN` channel, an in-process channel, ...)
//! - **ChangeSubscription**: One live subscription yielding raw payloads
//! - **MemoryChangeSource**: An in-process source for tests and for components
//!   that inject changes without a database
//!
//! Payloads are deliberately left as raw bytes here. Validation and framing
//! belong to the consumer (the `sse` crate).
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies between `service` (which implements the PostgreSQL source) and
//! `sse` (which consumes any source).

use async_trait::async_trait;

pub mod error;
pub mod memory;

pub use error::Error;
pub use memory::MemoryChangeSource;

/// A raw change payload as delivered by the backing store.
pub type RawPayload = Vec<u8>;

/// A source of change notifications that can be subscribed to.
///
/// Implementations must be cheap to call repeatedly: the consumer resubscribes
/// whenever a subscription fails.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Acquire one subscription against the source.
    async fn subscribe(&self) -> Result<Box<dyn ChangeSubscription>, Error>;
}

/// One active subscription against a [`ChangeSource`].
#[async_trait]
pub trait ChangeSubscription: Send {
    /// Wait for the next change payload.
    ///
    /// An error means this subscription is no longer usable and a new one
    /// should be acquired, except for `ChangeSourceErrorKind::Closed`, which
    /// means the source has ended for good.
    async fn next_change(&mut self) -> Result<RawPayload, Error>;
}
