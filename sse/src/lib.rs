//! Server-Sent Events (SSE) fan-out for live change notifications.
//!
//! This crate pushes every change reported by the backing store to all
//! connected streaming clients.
//!
//! # Architecture
//!
//! - **Single control loop**: The [`Hub`] owns the subscriber registry inside
//!   one task. Registration, unregistration and broadcast are submitted to it
//!   as messages and applied one at a time, so the registry needs no lock.
//! - **Bounded per-subscriber queues**: Broadcast never waits on a subscriber.
//!   A subscriber whose queue is full is evicted; its client sees the stream
//!   end and may reconnect.
//! - **Ephemeral messages**: A client that is not connected misses updates and
//!   loads current state through the ordinary read endpoints on connect.
//! - **Opaque payloads**: The hub never parses a payload. [`Payload`] only
//!   guarantees the bytes can be framed as an event.
//!
//! # Message Flow
//!
//! 1. The [`Notifier`] subscribes to a `ChangeSource` (PostgreSQL `LISTEN`)
//! 2. Each change payload is validated and handed to [`Hub::broadcast`]
//! 3. The hub enqueues it for every registered [`Subscriber`]
//! 4. Each client's [`Session`] turns queued payloads into `update` events,
//!    interleaved with `: heartbeat` comments on a fixed cadence
//! 5. When the client disconnects, the session is dropped and its subscriber
//!    is unregistered
//!
//! # Example: Injecting an event directly
//!
//! ```rust,ignore
//! use sse::{Hub, Payload};
//!
//! let hub = Hub::start(32);
//! hub.broadcast(Payload::from_json(&serde_json::json!({"type": "startup"}))?);
//! ```
//!
//! # Modules
//!
//! - `connection`: Subscriber handle and its type-safe SubscriberId
//! - `hub`: Registry control loop, broadcast and backpressure eviction
//! - `message`: Payload validation and wire frames
//! - `notifier`: ChangeSource to hub bridge with resubscription backoff
//! - `session`: Per-connection frame stream with heartbeats

pub mod connection;
pub mod error;
pub mod hub;
pub mod message;
pub mod notifier;
pub mod session;

pub use connection::{Subscriber, SubscriberId};
pub use hub::{Hub, Stats};
pub use message::{Frame, Payload};
pub use notifier::{Backoff, Notifier};
pub use session::{Session, SessionState};
