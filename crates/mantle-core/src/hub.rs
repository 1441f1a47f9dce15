//! Broadcast hub: the single owner of the subscriber set.
//!
//! The hub runs as one Tokio task (the actor) fed by a bounded command
//! channel. Register, unregister, publish, and stats requests from any
//! number of callers are processed one at a time in arrival order, and
//! the actor is the only code that ever touches the subscriber set, so
//! the set needs no lock.
//!
//! # Delivery
//!
//! Each published [`StateRecord`] is encoded once into a shared [`Frame`]
//! and pushed into every subscriber's bounded outbound queue. Pushes run
//! concurrently and each is capped by `send_timeout`; a subscriber whose
//! queue is closed or stays full past the timeout is removed and its
//! handle dropped, which releases the connection. Other subscribers are
//! unaffected and the publisher never sees the failure.
//!
//! Records reach a given subscriber in generation order: the fan-out of
//! one record finishes before the next command is taken.
//!
//! # Lifecycle
//!
//! The actor exits on [`Hub::shutdown`] or once every [`Hub`] clone has
//! been dropped. On exit every remaining handle is dropped, closing all
//! connections.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use mantle_types::{StateRecord, SubscriberId};
use serde::Serialize;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::HubConfig;

/// An encoded state record, shared between all subscriber queues.
///
/// Backed by reference-counted [`Bytes`], so handing a frame to each
/// subscriber never copies the payload. Frames are only built from
/// `String`, so the contents are always valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    /// The encoded text.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Consume the frame, returning the shared buffer.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self(Bytes::from(text))
    }
}

/// Errors returned to hub callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The hub actor has terminated and accepts no more requests.
    #[error("hub is closed")]
    Closed,
}

/// Errors produced while encoding a record into a [`Frame`].
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// JSON serialization failed.
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns a [`StateRecord`] into the bytes written to subscribers.
pub trait FrameEncoder: Send + Sync + 'static {
    /// Encode one record.
    fn encode(&self, record: &StateRecord) -> Result<Frame, EncodeError>;
}

/// Encodes records as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl FrameEncoder for JsonEncoder {
    fn encode(&self, record: &StateRecord) -> Result<Frame, EncodeError> {
        Ok(Frame::from(serde_json::to_string(record)?))
    }
}

/// One registered connection as seen by the hub.
///
/// The hub owns the handle from registration until removal. Dropping it
/// closes the outbound queue, which tells the connection's writer to
/// close the socket.
#[derive(Debug)]
pub struct SubscriberHandle {
    id: SubscriberId,
    tx: mpsc::Sender<Frame>,
}

impl SubscriberHandle {
    /// Wrap an existing outbound queue under the given identity.
    pub const fn new(id: SubscriberId, tx: mpsc::Sender<Frame>) -> Self {
        Self { id, tx }
    }

    /// Create a handle with a fresh identity and a bounded outbound queue.
    ///
    /// The receiver belongs to the connection writer.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(SubscriberId::new(), tx), rx)
    }

    /// The identity of this handle.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }
}

/// Counters exposed by the hub for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Subscribers currently registered.
    pub subscribers: usize,
    /// Records fanned out since start.
    pub published: u64,
    /// Individual successful deliveries since start.
    pub delivered: u64,
    /// Subscribers removed because a delivery failed.
    pub dropped_subscribers: u64,
}

/// Final state of the hub actor, returned from its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubReport {
    /// Counters at the moment the actor stopped.
    pub stats: HubStats,
    /// Connections closed during shutdown.
    pub closed_on_shutdown: usize,
}

enum Command {
    Register(SubscriberHandle),
    Unregister(SubscriberId),
    Publish(StateRecord),
    Stats(oneshot::Sender<HubStats>),
    Shutdown,
}

/// Cloneable handle to the hub actor.
///
/// Constructed once at startup and passed to the generator and the
/// listener; there is no global instance.
#[derive(Debug, Clone)]
pub struct Hub {
    tx: mpsc::Sender<Command>,
}

impl Hub {
    /// Spawn a hub actor that encodes records as JSON.
    pub fn spawn(config: &HubConfig) -> (Self, JoinHandle<HubReport>) {
        Self::spawn_with_encoder(config, JsonEncoder)
    }

    /// Spawn a hub actor with a custom frame encoder.
    pub fn spawn_with_encoder<E: FrameEncoder>(
        config: &HubConfig,
        encoder: E,
    ) -> (Self, JoinHandle<HubReport>) {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let actor = HubActor {
            subscribers: BTreeMap::new(),
            encoder,
            send_timeout: config.send_timeout(),
            stats: HubStats::default(),
        };
        let task = tokio::spawn(actor.run(rx));
        (Self { tx }, task)
    }

    /// Queue a subscriber for registration.
    ///
    /// Registering an identity that is already present is a no-op and the
    /// duplicate handle is dropped. If the hub is closed the handle is
    /// dropped, which closes the connection.
    pub async fn register(&self, handle: SubscriberHandle) {
        let id = handle.id();
        if self.tx.send(Command::Register(handle)).await.is_err() {
            debug!(subscriber = %id, "Hub closed, registration discarded");
        }
    }

    /// Queue a subscriber for removal. Unknown identities are ignored.
    pub async fn unregister(&self, id: SubscriberId) {
        if self.tx.send(Command::Unregister(id)).await.is_err() {
            debug!(subscriber = %id, "Hub closed, unregistration discarded");
        }
    }

    /// Hand a record to the hub for fan-out.
    ///
    /// Waits only for room in the command channel; the record is never
    /// dropped while the hub is running.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the actor has terminated.
    pub async fn publish(&self, record: StateRecord) -> Result<(), HubError> {
        self.tx
            .send(Command::Publish(record))
            .await
            .map_err(|_closed| HubError::Closed)
    }

    /// Snapshot of the hub counters, taken in command order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the actor has terminated.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Stats(reply_tx))
            .await
            .map_err(|_closed| HubError::Closed)?;
        reply_rx.await.map_err(|_dropped| HubError::Closed)
    }

    /// Number of registered subscribers once all earlier commands are applied.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the actor has terminated.
    pub async fn subscriber_count(&self) -> Result<usize, HubError> {
        Ok(self.stats().await?.subscribers)
    }

    /// Ask the actor to close every connection and stop.
    ///
    /// Commands queued before this one are still processed.
    pub async fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            debug!("Hub already closed");
        }
    }

    /// Whether the actor has terminated.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct HubActor<E> {
    subscribers: BTreeMap<SubscriberId, SubscriberHandle>,
    encoder: E,
    send_timeout: Duration,
    stats: HubStats,
}

impl<E: FrameEncoder> HubActor<E> {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) -> HubReport {
        info!(send_timeout = ?self.send_timeout, "Hub started");

        while let Some(command) = rx.recv().await {
            match command {
                Command::Register(handle) => self.register(handle),
                Command::Unregister(id) => self.unregister(id),
                Command::Publish(record) => self.publish(&record).await,
                Command::Stats(reply) => {
                    // The caller may have given up waiting.
                    let _ = reply.send(self.snapshot());
                }
                Command::Shutdown => break,
            }
        }

        let closed_on_shutdown = self.subscribers.len();
        self.subscribers.clear();
        let stats = self.snapshot();
        info!(
            closed = closed_on_shutdown,
            published = stats.published,
            delivered = stats.delivered,
            dropped = stats.dropped_subscribers,
            "Hub stopped"
        );
        HubReport {
            stats,
            closed_on_shutdown,
        }
    }

    fn snapshot(&self) -> HubStats {
        HubStats {
            subscribers: self.subscribers.len(),
            ..self.stats
        }
    }

    fn register(&mut self, handle: SubscriberHandle) {
        let id = handle.id();
        if self.subscribers.contains_key(&id) {
            debug!(subscriber = %id, "Subscriber already registered");
            return;
        }
        self.subscribers.insert(id, handle);
        info!(subscriber = %id, total = self.subscribers.len(), "Subscriber connected");
    }

    fn unregister(&mut self, id: SubscriberId) {
        if self.subscribers.remove(&id).is_some() {
            info!(subscriber = %id, total = self.subscribers.len(), "Subscriber disconnected");
        }
    }

    async fn publish(&mut self, record: &StateRecord) {
        let frame = match self.encoder.encode(record) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(cycle = record.cycle(), error = %e, "Failed to encode state record");
                return;
            }
        };

        self.stats.published = self.stats.published.saturating_add(1);
        if self.subscribers.is_empty() {
            return;
        }

        let timeout = self.send_timeout;
        let deliveries = self.subscribers.values().map(|handle| {
            let frame = frame.clone();
            async move { (handle.id, handle.tx.send_timeout(frame, timeout).await) }
        });
        let outcomes = join_all(deliveries).await;

        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    self.stats.delivered = self.stats.delivered.saturating_add(1);
                }
                Err(SendTimeoutError::Timeout(_)) => {
                    self.drop_subscriber(id, "send timed out", record.cycle());
                }
                Err(SendTimeoutError::Closed(_)) => {
                    self.drop_subscriber(id, "connection closed", record.cycle());
                }
            }
        }
    }

    fn drop_subscriber(&mut self, id: SubscriberId, reason: &'static str, cycle: u64) {
        if self.subscribers.remove(&id).is_some() {
            self.stats.dropped_subscribers = self.stats.dropped_subscribers.saturating_add(1);
            info!(
                subscriber = %id,
                reason,
                cycle,
                total = self.subscribers.len(),
                "Subscriber dropped during fan-out"
            );
        }
    }
}
