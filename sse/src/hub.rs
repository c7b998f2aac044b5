use crate::connection::{Subscriber, SubscriberId};
use crate::error::{Error, Result};
use crate::message::Payload;
use log::*;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Intents submitted to the hub's control loop.
#[derive(Debug)]
enum Command {
    Register { reply: oneshot::Sender<Subscriber> },
    Unregister { id: SubscriberId },
    Broadcast { payload: Payload },
    Stats { reply: oneshot::Sender<Stats> },
}

/// Snapshot of the registry and its lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Subscribers currently registered.
    pub subscribers: usize,
    /// Subscribers ever registered.
    pub registered: u64,
    /// Unregister requests received, including ones for unknown ids.
    pub unregister_requests: u64,
    /// Subscribers removed by an unregister request.
    pub unregistered: u64,
    /// Subscribers removed because their queue was full.
    pub evicted: u64,
    /// Subscribers removed because their reader was already gone.
    pub disconnected: u64,
    /// Payloads broadcast, whether or not anyone was registered.
    pub broadcasts: u64,
}

/// Handle to the broadcast hub.
///
/// Cloning the handle is cheap and every clone talks to the same control
/// loop. All registry mutation happens inside that loop, one intent at a
/// time, so the registry needs no lock and its mutation order is total.
#[derive(Debug, Clone)]
pub struct Hub {
    commands: mpsc::UnboundedSender<Command>,
}

impl Hub {
    /// Spawn the control loop on the current Tokio runtime and return a handle
    /// to it. Each subscriber gets a queue of `queue_capacity` payloads.
    pub fn start(queue_capacity: usize) -> Self {
        let (commands, intake) = mpsc::unbounded_channel();
        let hub = Self { commands };

        let control_loop = ControlLoop {
            registry: Registry::new(queue_capacity),
            intake,
            hub: hub.downgrade(),
        };
        tokio::spawn(control_loop.run());

        info!("SSE hub started (queue capacity {})", queue_capacity.max(1));
        hub
    }

    /// Register a new subscriber with its own bounded queue.
    pub async fn register(&self) -> Result<Subscriber> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Register { reply })
            .map_err(|_| Error::hub_stopped())?;
        response.await.map_err(|_| Error::hub_stopped())
    }

    /// Remove a subscriber and close its queue. Unknown ids are ignored.
    pub fn unregister(&self, id: &SubscriberId) {
        if self
            .commands
            .send(Command::Unregister { id: id.clone() })
            .is_err()
        {
            debug!("SSE hub stopped, dropping unregister for {id}");
        }
    }

    /// Deliver a payload to every registered subscriber without blocking.
    /// Subscribers whose queue is full are evicted.
    pub fn broadcast(&self, payload: Payload) {
        if self.commands.send(Command::Broadcast { payload }).is_err() {
            warn!("SSE hub stopped, dropping broadcast");
        }
    }

    /// Current registry statistics. Answered in order with every other
    /// intent, so all intents submitted before this call are reflected.
    pub async fn stats(&self) -> Result<Stats> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Stats { reply })
            .map_err(|_| Error::hub_stopped())?;
        response.await.map_err(|_| Error::hub_stopped())
    }

    fn downgrade(&self) -> WeakHub {
        WeakHub {
            commands: self.commands.downgrade(),
        }
    }
}

/// Handle held by the control loop itself. It must not keep the intake open,
/// otherwise the loop would never observe that every `Hub` is gone.
struct WeakHub {
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl WeakHub {
    fn upgrade(&self) -> Option<Hub> {
        self.commands.upgrade().map(|commands| Hub { commands })
    }
}

struct ControlLoop {
    registry: Registry,
    intake: mpsc::UnboundedReceiver<Command>,
    hub: WeakHub,
}

impl ControlLoop {
    async fn run(mut self) {
        while let Some(command) = self.intake.recv().await {
            match command {
                Command::Register { reply } => {
                    // A Register command was just received, so some Hub is alive.
                    let Some(hub) = self.hub.upgrade() else {
                        break;
                    };
                    let subscriber = self.registry.register(hub);
                    // If the caller went away, dropping the returned subscriber
                    // queues its own unregister.
                    let _ = reply.send(subscriber);
                }
                Command::Unregister { id } => self.registry.unregister(&id),
                Command::Broadcast { payload } => self.registry.broadcast(&payload),
                Command::Stats { reply } => {
                    let _ = reply.send(self.registry.stats());
                }
            }
        }

        debug!(
            "SSE hub stopped with {} subscriber(s) registered",
            self.registry.len()
        );
    }
}

/// Subscriber registry, owned exclusively by the control loop.
struct Registry {
    queue_capacity: usize,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Payload>>,
    stats: Stats,
}

impl Registry {
    fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity: queue_capacity.max(1),
            subscribers: HashMap::new(),
            stats: Stats::default(),
        }
    }

    fn len(&self) -> usize {
        self.subscribers.len()
    }

    fn register(&mut self, hub: Hub) -> Subscriber {
        let id = SubscriberId::new();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.subscribers.insert(id.clone(), sender);
        self.stats.registered += 1;

        info!("SSE subscriber {id} registered (total: {})", self.len());
        Subscriber::new(id, receiver, hub)
    }

    fn unregister(&mut self, id: &SubscriberId) {
        self.stats.unregister_requests += 1;

        // Dropping the sender closes the queue.
        if self.subscribers.remove(id).is_some() {
            self.stats.unregistered += 1;
            info!("SSE subscriber {id} unregistered (total: {})", self.len());
        }
    }

    fn broadcast(&mut self, payload: &Payload) {
        self.stats.broadcasts += 1;
        let mut evicted = 0;
        let mut disconnected = 0;

        self.subscribers
            .retain(|id, sender| match sender.try_send(payload.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("SSE subscriber {id} is not keeping up, evicting");
                    evicted += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("SSE subscriber {id} is gone, removing");
                    disconnected += 1;
                    false
                }
            });

        self.stats.evicted += evicted;
        self.stats.disconnected += disconnected;

        if evicted + disconnected > 0 {
            info!(
                "Dropped {} slow and {} closed SSE subscriber(s) (total: {})",
                evicted,
                disconnected,
                self.len()
            );
        }
        trace!(
            "Broadcast {} byte payload to {} subscriber(s)",
            payload.len(),
            self.len()
        );
    }

    fn stats(&self) -> Stats {
        Stats {
            subscribers: self.len(),
            ..self.stats
        }
    }
}
