//! BOSH session engine public API.
//!
//! [`BoshClient`] multiplexes caller payloads onto a bounded pool of
//! concurrent HTTP exchanges against an injected [`Transport`], correlates
//! each response back to the request that produced it, retransmits
//! deterministically after recoverable errors, and reports lifecycle changes
//! through the notification bus. One client is one logical stream.

mod config;
mod engine;
mod scheduler;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::debug;

pub use config::SessionConfig;

use self::engine::{Dispatch, Engine, Outcome};
use crate::{
    body::Body,
    error::Result,
    events::{ConnectionListener, EventBus, ListenerId, RequestListener},
    transport::Transport,
};

/// Client endpoint of one BOSH session.
///
/// The client is cheap to clone via its internal `Arc` sharing and safe to
/// use from several tasks at once: `send` only takes the in-memory engine
/// lock, never a network round trip.
pub struct BoshClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    engine: Mutex<Engine>,
    events: EventBus,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl BoshClient {
    /// Create a session engine over `transport`.
    ///
    /// No request is sent yet; the first [`send`](Self::send) doubles as the
    /// session creation request. Must be called within a tokio runtime, as
    /// it spawns the notification delivery worker.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let tracker = TaskTracker::new();
        let events = EventBus::new(&tracker);
        debug!(pipelining = transport.pipelining(), "session engine created");
        Self {
            inner: Arc::new(ClientInner {
                transport,
                engine: Mutex::new(Engine::new(config)),
                events,
                tracker,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Queue `body` for dispatch and return its assigned request id.
    ///
    /// Returns once the body is queued or dispatched; the response arrives
    /// asynchronously and is observable only through the listeners.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::BoshError::Terminated`] (carrying the fatal
    /// cause) or [`crate::BoshError::Closed`] once the session is over.
    pub async fn send(&self, body: Body) -> Result<u64> {
        let (rid, dispatches) = self.inner.engine.lock().await.enqueue(body)?;
        self.inner.launch(dispatches);
        Ok(rid)
    }

    /// Close the session gracefully.
    ///
    /// Sends a session-end marker when the session got far enough to address
    /// one, stops accepting sends, and lets in-flight exchanges resolve
    /// naturally. Idempotent.
    pub async fn close(&self) {
        let outcome = self.inner.engine.lock().await.close();
        self.inner.apply(outcome);
    }

    /// Wait until every notification queued so far has been delivered.
    ///
    /// A synchronization point for callers and tests, not a protocol
    /// primitive.
    pub async fn drain(&self) { self.inner.events.flush().await; }

    /// Register a connection-status listener.
    pub fn add_connection_listener(&self, listener: ConnectionListener) -> ListenerId {
        self.inner.events.add_connection_listener(listener)
    }

    /// Unregister a connection-status listener.
    pub fn remove_connection_listener(&self, id: ListenerId) {
        self.inner.events.remove_connection_listener(id);
    }

    /// Register a listener observing every (re)transmitted wire body.
    pub fn add_request_listener(&self, listener: RequestListener) -> ListenerId {
        self.inner.events.add_request_listener(listener)
    }

    /// Unregister a request listener.
    pub fn remove_request_listener(&self, id: ListenerId) {
        self.inner.events.remove_request_listener(id);
    }
}

impl Clone for BoshClient {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ClientInner {
    /// Launch exchanges in order, emitting a request-sent notification for
    /// each before it goes to the transport. Retransmission order therefore
    /// reaches observers exactly as the engine produced it, whatever order
    /// the transport completes the exchanges in.
    fn launch(self: &Arc<Self>, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            self.events.request_sent(dispatch.body.clone());
            let inner = Arc::clone(self);
            self.tracker.spawn(async move {
                let Dispatch { rid, attempt, body } = dispatch;
                let result = tokio::select! {
                    () = inner.cancel.cancelled() => return,
                    result = inner.transport.dispatch(&body) => result,
                };
                let outcome = inner.engine.lock().await.on_response(rid, attempt, result);
                inner.apply(outcome);
            });
        }
    }

    fn apply(self: &Arc<Self>, outcome: Outcome) {
        if let Some(event) = outcome.connection {
            // A terminal transition abandons in-flight exchanges; a normal
            // close lets them resolve.
            if !event.connected && event.cause.is_some() {
                self.cancel.cancel();
            }
            self.events.connection(event);
        }
        self.launch(outcome.dispatches);
    }
}
