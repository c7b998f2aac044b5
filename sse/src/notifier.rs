use crate::hub::Hub;
use crate::message::Payload;
use events::{ChangeSource, ChangeSubscription, Error as ChangeSourceError};
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Exponential backoff between subscription attempts.
///
/// Delays double with every consecutive failure, capped at a maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Delay before retrying after `failures` consecutive failed attempts
    /// (zero-based).
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2_f64.powi(failures.min(32) as i32);
        let delay = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Bridges a [`ChangeSource`] into hub broadcasts.
///
/// Malformed payloads are skipped. A failed or dropped subscription is
/// retried with backoff for as long as the process runs; only a source that
/// reports itself closed ends the notifier.
pub struct Notifier {
    source: Arc<dyn ChangeSource>,
    hub: Hub,
    backoff: Backoff,
}

impl Notifier {
    pub fn new(source: Arc<dyn ChangeSource>, hub: Hub) -> Self {
        Self {
            source,
            hub,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Spawn the notifier loop onto the runtime.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let mut failures: u32 = 0;

        loop {
            let err = match self.source.subscribe().await {
                Ok(mut subscription) => {
                    info!("Notifier subscribed to change source");
                    failures = 0;
                    self.forward(subscription.as_mut()).await
                }
                Err(err) => err,
            };

            if err.is_closed() {
                info!("Change source closed, notifier stopping");
                return;
            }

            let delay = self.backoff.delay(failures);
            failures = failures.saturating_add(1);
            warn!(
                "Change source subscription failed ({err}), retrying in {:?} (attempt {failures})",
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Forward payloads until the subscription fails, returning the failure.
    async fn forward(&self, subscription: &mut dyn ChangeSubscription) -> ChangeSourceError {
        loop {
            match subscription.next_change().await {
                Ok(raw) => match Payload::try_from(raw) {
                    Ok(payload) => {
                        trace!("Notifier forwarding {} byte payload", payload.len());
                        self.hub.broadcast(payload);
                    }
                    Err(err) => warn!("Skipping change payload: {err}"),
                },
                Err(err) => return err,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use events::error::ChangeSourceErrorKind;
    use events::MemoryChangeSource;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::{timeout, Instant};

    const DROP_MARKER: &[u8] = b"__drop__";

    /// Fails the first `failures` subscribe calls, then hands out memory
    /// subscriptions that disconnect when they see `DROP_MARKER`.
    struct FlakySource {
        inner: MemoryChangeSource,
        failures_left: AtomicU32,
        attempts: AtomicU32,
    }

    impl FlakySource {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryChangeSource::default(),
                failures_left: AtomicU32::new(failures),
                attempts: AtomicU32::new(0),
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    struct Interruptible(Box<dyn ChangeSubscription>);

    #[async_trait]
    impl ChangeSubscription for Interruptible {
        async fn next_change(&mut self) -> Result<Vec<u8>, ChangeSourceError> {
            let payload = self.0.next_change().await?;
            if payload == DROP_MARKER {
                return Err(ChangeSourceError::new(ChangeSourceErrorKind::Disconnected));
            }
            Ok(payload)
        }
    }

    #[async_trait]
    impl ChangeSource for FlakySource {
        async fn subscribe(&self) -> Result<Box<dyn ChangeSubscription>, ChangeSourceError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(ChangeSourceError::new(ChangeSourceErrorKind::Unavailable));
            }
            let inner = self.inner.subscribe().await?;
            Ok(Box::new(Interruptible(inner)))
        }
    }

    struct ClosedSource;

    #[async_trait]
    impl ChangeSource for ClosedSource {
        async fn subscribe(&self) -> Result<Box<dyn ChangeSubscription>, ChangeSourceError> {
            Err(ChangeSourceError::new(ChangeSourceErrorKind::Closed))
        }
    }

    async fn wait_for_subscription(source: &FlakySource) {
        while source.inner.subscription_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));

        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(10), Duration::from_secs(60));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_payload_reaches_every_subscriber_exactly_once() {
        let hub = Hub::start(8);
        let mut subscribers = Vec::new();
        for _ in 0..5 {
            subscribers.push(hub.register().await.unwrap());
        }

        let source = Arc::new(FlakySource::new(0));
        let handle = Notifier::new(source.clone(), hub.clone()).start();
        wait_for_subscription(&source).await;

        source.inner.publish(br#"{"id":"X"}"#.to_vec());

        for subscriber in subscribers.iter_mut() {
            let received = timeout(Duration::from_secs(1), subscriber.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(received.as_str(), r#"{"id":"X"}"#);
        }

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.broadcasts, 1);
        for subscriber in subscribers.iter_mut() {
            assert_eq!(subscriber.try_recv().unwrap_err(), TryRecvError::Empty);
        }
        handle.abort();
    }

    #[tokio::test]
    async fn test_malformed_payload_is_skipped() {
        let hub = Hub::start(8);
        let mut subscriber = hub.register().await.unwrap();

        let source = Arc::new(FlakySource::new(0));
        let handle = Notifier::new(source.clone(), hub.clone()).start();
        wait_for_subscription(&source).await;

        source.inner.publish(vec![0xffu8, 0xfe, 0xfd]);
        source.inner.publish(Vec::<u8>::new());
        source.inner.publish(br#"{"id":"ok"}"#.to_vec());

        let received = timeout(Duration::from_secs(1), subscriber.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.as_str(), r#"{"id":"ok"}"#);
        assert_eq!(hub.stats().await.unwrap().broadcasts, 1);
        assert_eq!(source.attempts(), 1);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscription_is_retried_with_backoff() {
        let hub = Hub::start(8);
        let mut subscriber = hub.register().await.unwrap();

        let start = Instant::now();
        let source = Arc::new(FlakySource::new(2));
        let handle = Notifier::new(source.clone(), hub.clone()).start();
        wait_for_subscription(&source).await;

        assert_eq!(source.attempts(), 3);
        assert!(start.elapsed() >= Duration::from_secs(3));

        source.inner.publish(b"after retry".to_vec());
        assert_eq!(subscriber.recv().await.unwrap().as_str(), "after retry");
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_subscription_is_reacquired() {
        let hub = Hub::start(8);
        let mut subscriber = hub.register().await.unwrap();

        let source = Arc::new(FlakySource::new(0));
        let handle = Notifier::new(source.clone(), hub.clone()).start();
        wait_for_subscription(&source).await;

        source.inner.publish(DROP_MARKER.to_vec());
        while source.attempts() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        wait_for_subscription(&source).await;

        source.inner.publish(b"reconnected".to_vec());
        assert_eq!(subscriber.recv().await.unwrap().as_str(), "reconnected");
        assert_eq!(hub.stats().await.unwrap().broadcasts, 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_closed_source_stops_notifier() {
        let hub = Hub::start(8);

        timeout(
            Duration::from_secs(1),
            Notifier::new(Arc::new(ClosedSource), hub).run(),
        )
        .await
        .unwrap();
    }
}
