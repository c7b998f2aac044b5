use crate::error::{payload_error, Error, PayloadErrorKind};
use axum::response::sse::Event;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Data sent with the `connected` event.
pub const CONNECTED_ACK: &str = "ok";

/// Comment text of the keep-alive frame.
pub const HEARTBEAT_COMMENT: &str = "heartbeat";

/// Trait for getting the SSE event type name
pub trait EventType {
    /// `None` for frames that carry no event name (comments).
    fn event_type(&self) -> Option<&'static str>;
}

/// An immutable broadcast payload, opaque to the hub.
///
/// Cloning is cheap: every subscriber shares the same allocation. The only
/// checks performed are the ones the event-stream framing depends on: the
/// payload is non-empty UTF-8 without carriage returns.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload(Arc<str>);

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize any value to a JSON payload.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, Error> {
        let json = serde_json::to_string(value)?;
        Self::try_from(json.as_str())
    }
}

impl TryFrom<&str> for Payload {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(payload_error(PayloadErrorKind::Empty));
        }
        if value.contains('\r') {
            return Err(payload_error(PayloadErrorKind::CarriageReturn));
        }
        Ok(Payload(Arc::from(value)))
    }
}

impl TryFrom<&[u8]> for Payload {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::try_from(std::str::from_utf8(value)?)
    }
}

impl TryFrom<Vec<u8>> for Payload {
    type Error = Error;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of output on a streaming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// First frame of every session.
    Connected,
    /// A broadcast payload, verbatim.
    Update(Payload),
    /// Keep-alive comment, ignored by conforming clients.
    Heartbeat,
}

impl EventType for Frame {
    fn event_type(&self) -> Option<&'static str> {
        match self {
            Frame::Connected => Some("connected"),
            Frame::Update(_) => Some("update"),
            Frame::Heartbeat => None,
        }
    }
}

impl Frame {
    /// Render the frame exactly as it appears on the wire.
    pub fn encode(&self) -> String {
        match self {
            Frame::Connected => format!("event: connected\ndata: {CONNECTED_ACK}\n\n"),
            Frame::Update(payload) => {
                let mut out = String::with_capacity(payload.len() + 24);
                out.push_str("event: update\n");
                for line in payload.as_str().split('\n') {
                    out.push_str("data: ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
                out
            }
            Frame::Heartbeat => format!(": {HEARTBEAT_COMMENT}\n\n"),
        }
    }

    /// Convert into an axum SSE event for the HTTP response body.
    pub fn into_event(self) -> Event {
        match self {
            Frame::Connected => Event::default().event("connected").data(CONNECTED_ACK),
            Frame::Update(payload) => Event::default().event("update").data(payload.as_str()),
            Frame::Heartbeat => Event::default().comment(HEARTBEAT_COMMENT),
        }
    }
}
