//! Asynchronous notification bus.
//!
//! The engine publishes two event kinds: connection-status changes and
//! request-sent notifications. Events are queued on an unbounded channel and
//! delivered by a dedicated worker task, so a slow or misbehaving listener
//! can never stall dispatch or retransmission. Each listener observes events
//! in the order the engine generated them.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::task::TaskTracker;

use crate::{body::Body, error::TerminationCause};

/// A connection-status change.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    /// Whether the session is established and usable.
    pub connected: bool,
    /// What voided the session, when `connected` is false and the
    /// termination was not a normal close.
    pub cause: Option<TerminationCause>,
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback observing connection-status changes.
pub type ConnectionListener = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Callback observing each (re)transmitted wire body.
pub type RequestListener = Arc<dyn Fn(&Body) + Send + Sync>;

enum BusMessage {
    Connection(ConnectionEvent),
    RequestSent(Body),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct Listeners {
    connection: DashMap<ListenerId, ConnectionListener>,
    request: DashMap<ListenerId, RequestListener>,
}

/// Single-writer, multiple-reader event fan-out.
pub(crate) struct EventBus {
    tx: mpsc::UnboundedSender<BusMessage>,
    listeners: Arc<Listeners>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create the bus and spawn its delivery worker on `tracker`.
    pub(crate) fn new(tracker: &TaskTracker) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let listeners = Arc::new(Listeners::default());
        tracker.spawn(deliver(rx, Arc::clone(&listeners)));
        Self {
            tx,
            listeners,
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn add_connection_listener(&self, listener: ConnectionListener) -> ListenerId {
        let id = self.allocate_id();
        self.listeners.connection.insert(id, listener);
        id
    }

    pub(crate) fn remove_connection_listener(&self, id: ListenerId) {
        self.listeners.connection.remove(&id);
    }

    pub(crate) fn add_request_listener(&self, listener: RequestListener) -> ListenerId {
        let id = self.allocate_id();
        self.listeners.request.insert(id, listener);
        id
    }

    pub(crate) fn remove_request_listener(&self, id: ListenerId) {
        self.listeners.request.remove(&id);
    }

    /// Queue a connection-status event. Never blocks.
    pub(crate) fn connection(&self, event: ConnectionEvent) {
        let _ = self.tx.send(BusMessage::Connection(event));
    }

    /// Queue a request-sent event. Never blocks.
    pub(crate) fn request_sent(&self, body: Body) {
        let _ = self.tx.send(BusMessage::RequestSent(body));
    }

    /// Wait until every event queued before this call has been delivered.
    pub(crate) async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(BusMessage::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    fn allocate_id(&self) -> ListenerId {
        // Relaxed is enough: the ids only need to be unique.
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

async fn deliver(mut rx: mpsc::UnboundedReceiver<BusMessage>, listeners: Arc<Listeners>) {
    while let Some(message) = rx.recv().await {
        match message {
            BusMessage::Connection(event) => {
                tracing::debug!(connected = event.connected, "delivering connection event");
                for entry in listeners.connection.iter() {
                    (entry.value())(&event);
                }
            }
            BusMessage::RequestSent(body) => {
                for entry in listeners.request.iter() {
                    (entry.value())(&body);
                }
            }
            BusMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
