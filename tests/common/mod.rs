//! Shared utilities for integration tests.
//!
//! Provides a scriptable stub connection manager that records every
//! dispatched exchange and lets each test answer them in any order, plus
//! helpers for establishing a session and observing connection-status
//! events. The stub mirrors the real transport seam: each dispatch parks on
//! a oneshot until the test scripts its outcome.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use boshwire::{
    Body,
    BoshClient,
    ConnectionEvent,
    SessionConfig,
    Transport,
    TransportError,
    TransportResponse,
    body::attributes,
};
use tokio::{
    sync::{Notify, oneshot},
    time::{Instant, sleep, timeout},
};

/// Session id handed out by the stub connection manager.
pub const SID: &str = "123XYZ";

/// Deterministic first rid used by all test sessions.
pub const FIRST_RID: u64 = 1000;

const WAIT_BUDGET: Duration = Duration::from_secs(5);

/// One dispatched exchange awaiting a scripted outcome.
pub struct Exchange {
    pub body: Body,
    responder: oneshot::Sender<Result<TransportResponse, TransportError>>,
}

impl Exchange {
    /// The `rid` attribute stamped on the dispatched wire body.
    pub fn rid(&self) -> u64 {
        self.body
            .attribute(&attributes::RID)
            .and_then(|value| value.parse().ok())
            .expect("dispatched body carries a numeric rid")
    }

    /// Answer with HTTP 200 and `body`.
    pub fn respond(self, body: Body) { self.respond_with_status(200, body); }

    /// Answer with an explicit HTTP status.
    pub fn respond_with_status(self, status: u16, body: Body) {
        let _ = self.responder.send(Ok(TransportResponse::new(status, body)));
    }

    /// Fail the exchange at the transport level.
    pub fn fail(self, err: TransportError) {
        let _ = self.responder.send(Err(err));
    }
}

/// Scriptable transport double standing in for the connection manager.
pub struct StubTransport {
    pending: Mutex<VecDeque<Exchange>>,
    notify: Notify,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        })
    }

    /// Await the oldest not-yet-claimed exchange.
    pub async fn await_exchange(&self) -> Exchange {
        timeout(WAIT_BUDGET, async {
            loop {
                let notified = self.notify.notified();
                if let Some(exchange) = self.pending.lock().expect("lock").pop_front() {
                    return exchange;
                }
                notified.await;
            }
        })
        .await
        .expect("timed out waiting for an exchange")
    }

    /// Assert that no exchange is dispatched within a short window.
    pub async fn assert_quiet(&self) {
        sleep(Duration::from_millis(100)).await;
        assert!(
            self.pending.lock().expect("lock").is_empty(),
            "unexpected exchange dispatched"
        );
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn dispatch(&self, body: &Body) -> Result<TransportResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().expect("lock").push_back(Exchange {
            body: body.clone(),
            responder: tx,
        });
        self.notify.notify_one();
        rx.await
            .unwrap_or_else(|_| Err(TransportError::Other("exchange abandoned by stub".into())))
    }
}

/// Build a client over `transport` with a deterministic initial rid.
pub fn client(transport: &Arc<StubTransport>) -> BoshClient {
    client_with(transport, SessionConfig::default().with_initial_rid(FIRST_RID))
}

/// Build a client with an explicit configuration.
pub fn client_with(transport: &Arc<StubTransport>, config: SessionConfig) -> BoshClient {
    BoshClient::new(Arc::clone(transport) as Arc<dyn Transport>, config)
}

/// A modern session creation response (`ver` present).
pub fn creation_response() -> Body {
    Body::builder()
        .attribute(attributes::SID.clone(), SID)
        .attribute(attributes::WAIT.clone(), "1")
        .attribute(attributes::VER.clone(), "1.11")
        .build()
}

/// A legacy session creation response (no `ver`).
pub fn legacy_creation_response() -> Body {
    Body::builder()
        .attribute(attributes::SID.clone(), SID)
        .attribute(attributes::WAIT.clone(), "1")
        .build()
}

/// Recorder of connection-status events observed through the bus.
#[derive(Clone)]
pub struct ConnProbe {
    events: Arc<Mutex<Vec<ConnectionEvent>>>,
}

impl ConnProbe {
    pub fn attach(client: &BoshClient) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        client.add_connection_listener(Arc::new(move |event: &ConnectionEvent| {
            sink.lock().expect("lock").push(event.clone());
        }));
        Self { events }
    }

    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.events.lock().expect("lock").clone()
    }

    /// Wait for the first event reporting an established session.
    pub async fn wait_for_connect(&self) -> ConnectionEvent {
        self.wait_for(|event| event.connected).await
    }

    /// Wait for the first event reporting a dead session.
    pub async fn wait_for_disconnect(&self) -> ConnectionEvent {
        self.wait_for(|event| !event.connected).await
    }

    async fn wait_for(&self, matches: impl Fn(&ConnectionEvent) -> bool) -> ConnectionEvent {
        let deadline = Instant::now() + WAIT_BUDGET;
        loop {
            if let Some(event) = self
                .events
                .lock()
                .expect("lock")
                .iter()
                .find(|event| matches(event))
            {
                return event.clone();
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for a connection event"
            );
            sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Poll until `condition` holds, failing the test after the wait budget.
pub async fn wait_until(condition: impl Fn() -> bool, what: &str) {
    let deadline = Instant::now() + WAIT_BUDGET;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

/// Drive a fresh session to `Active`, optionally negotiating a `requests`
/// limit, and return the creation rid.
pub async fn establish(
    client: &BoshClient,
    transport: &StubTransport,
    requests: Option<u16>,
) -> u64 {
    let probe = ConnProbe::attach(client);
    client
        .send(Body::builder().build())
        .await
        .expect("creation send");
    let exchange = transport.await_exchange().await;
    let rid = exchange.rid();
    let mut response = creation_response();
    if let Some(requests) = requests {
        response = response.with_attribute(attributes::REQUESTS.clone(), requests.to_string());
    }
    exchange.respond(response);
    probe.wait_for_connect().await;
    client.drain().await;
    rid
}
