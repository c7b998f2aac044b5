use crate::connection::Subscriber;
use crate::message::Frame;
use async_stream::stream;
use futures::Stream;
use log::*;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Keep-alive cadence used when none is configured.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Lifecycle of one streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, `connected` frame not yet emitted.
    Connecting,
    Streaming,
    /// Unregistered; no further frames.
    Closed,
}

enum Wake {
    Message(Option<crate::message::Payload>),
    Heartbeat,
}

enum Step {
    Cancelled,
    Frame(Option<Frame>),
}

/// Turns hub deliveries for one subscriber into stream frames.
///
/// Heartbeats run on a fixed cadence starting one interval after the session
/// is created; updates do not reset the timer. However the session ends
/// (queue closed by the hub, cancellation, or the session being dropped
/// because the transport went away) its subscriber is unregistered exactly
/// once.
pub struct Session {
    subscriber: Subscriber,
    heartbeat: Interval,
    state: SessionState,
}

impl Session {
    pub fn new(subscriber: Subscriber, heartbeat_interval: Duration) -> Self {
        let period = heartbeat_interval.max(Duration::from_millis(1));
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            subscriber,
            heartbeat,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn subscriber(&self) -> &Subscriber {
        &self.subscriber
    }

    /// Wait for the next frame to write. `None` means the session is closed.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        match self.state {
            SessionState::Connecting => {
                self.state = SessionState::Streaming;
                debug!("SSE session {} streaming", self.subscriber.id());
                Some(Frame::Connected)
            }
            SessionState::Closed => None,
            SessionState::Streaming => {
                let wake = tokio::select! {
                    message = self.subscriber.recv() => Wake::Message(message),
                    _ = self.heartbeat.tick() => Wake::Heartbeat,
                };

                match wake {
                    Wake::Message(Some(payload)) => Some(Frame::Update(payload)),
                    Wake::Message(None) => {
                        self.close("queue closed by hub");
                        None
                    }
                    Wake::Heartbeat => Some(Frame::Heartbeat),
                }
            }
        }
    }

    /// Close the session and unregister its subscriber. Idempotent.
    pub fn close(&mut self, reason: &str) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.subscriber.unregister();
        debug!("SSE session {} closed: {reason}", self.subscriber.id());
    }

    /// Drive the session as a stream of frames until `cancel` completes or
    /// the hub closes the queue.
    ///
    /// Cancellation wins over a pending message or heartbeat. Dropping the
    /// stream before it ends (the client went away or a write failed) closes
    /// the session as well.
    pub fn into_stream<F>(self, cancel: F) -> impl Stream<Item = Frame> + Send + 'static
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut session = self;
        stream! {
            tokio::pin!(cancel);

            loop {
                let step = tokio::select! {
                    biased;
                    _ = &mut cancel => Step::Cancelled,
                    frame = session.next_frame() => Step::Frame(frame),
                };

                match step {
                    Step::Cancelled => {
                        session.close("cancelled");
                        break;
                    }
                    Step::Frame(Some(frame)) => yield frame,
                    Step::Frame(None) => break,
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close("connection dropped");
    }
}
