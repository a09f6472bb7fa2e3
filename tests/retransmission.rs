//! Recoverable error handling and deterministic retransmission.

mod common;

use std::sync::{Arc, Mutex};

use boshwire::{Body, BodyQName, SessionConfig, TerminationCause, TransportError, body::attributes};
use common::{ConnProbe, FIRST_RID, StubTransport, client, client_with, establish, wait_until};

const TEST_NS: &str = "urn:boshwire:test";

fn marker(value: &str) -> Body {
    Body::builder()
        .namespace_definition("t", TEST_NS)
        .attribute(BodyQName::with_prefix(TEST_NS, "ref", "t"), value)
        .build()
}

/// Collect the canonical form of every wire body the engine reports sent.
fn request_log(session: &boshwire::BoshClient) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    session.add_request_listener(Arc::new(move |body: &Body| {
        sink.lock().expect("lock").push(body.to_xml());
    }));
    log
}

#[tokio::test]
async fn recoverable_error_retransmits_outstanding_requests_in_order() {
    let transport = StubTransport::new();
    let session = client(&transport);
    establish(&session, &transport, Some(3)).await;

    session.send(marker("Req1")).await.expect("send");
    let exchange1 = transport.await_exchange().await;
    session.send(marker("Req2")).await.expect("send");
    let exchange2 = transport.await_exchange().await;
    let expected1 = exchange1.body.to_xml();
    let expected2 = exchange2.body.to_xml();

    // The second request resolves normally before the error is observed; it
    // is still session-level unacknowledged and must be retransmitted too.
    exchange2.respond(marker("Resp2"));
    session.drain().await;

    let resends = request_log(&session);

    exchange1.respond(marker("Resp1").with_attribute(attributes::TYPE.clone(), "error"));

    // Both duplicates reach the transport, in either arrival order.
    let duplicate_a = transport.await_exchange().await;
    let duplicate_b = transport.await_exchange().await;
    let mut actual = vec![duplicate_a.body.to_xml(), duplicate_b.body.to_xml()];
    actual.sort_unstable();
    let mut expected = vec![expected1.clone(), expected2.clone()];
    expected.sort_unstable();
    assert_eq!(actual, expected, "retransmissions must be byte-identical");
    duplicate_a.respond(marker("Resp3"));
    duplicate_b.respond(marker("Resp4"));

    // Observers see the retransmissions in ascending rid order, whatever
    // order the transport accepted them in.
    wait_until(
        || resends.lock().expect("lock").len() >= 2,
        "both request-sent notifications",
    )
    .await;
    let resends = resends.lock().expect("lock");
    assert_eq!(resends[0], expected1);
    assert_eq!(resends[1], expected2);

    session.drain().await;
}

#[tokio::test]
async fn duplicate_error_signals_produce_one_retransmission_round() {
    let transport = StubTransport::new();
    let session = client(&transport);
    establish(&session, &transport, Some(3)).await;

    session.send(marker("Req1")).await.expect("send");
    let exchange1 = transport.await_exchange().await;
    session.send(marker("Req2")).await.expect("send");
    let exchange2 = transport.await_exchange().await;
    session.drain().await;

    let resends = request_log(&session);

    exchange1.respond(marker("Err1").with_attribute(attributes::TYPE.clone(), "error"));
    let duplicate1 = transport.await_exchange().await;
    let duplicate2 = transport.await_exchange().await;

    // The original second exchange now errors as well; its attempt was
    // superseded by the pending round, so nothing more may be retransmitted.
    exchange2.respond(marker("Err2").with_attribute(attributes::TYPE.clone(), "error"));
    transport.assert_quiet().await;

    wait_until(
        || resends.lock().expect("lock").len() >= 2,
        "the retransmission round",
    )
    .await;
    assert_eq!(resends.lock().expect("lock").len(), 2);

    duplicate1.respond(Body::builder().build());
    duplicate2.respond(Body::builder().build());
}

#[tokio::test]
async fn transport_failure_retries_with_an_identical_body() {
    let transport = StubTransport::new();
    let session = client(&transport);
    establish(&session, &transport, None).await;

    session.send(marker("Req1")).await.expect("send");
    let exchange = transport.await_exchange().await;
    let original = exchange.body.to_xml();
    exchange.fail(TransportError::Timeout);

    let retry = transport.await_exchange().await;
    assert_eq!(retry.body.to_xml(), original);
    retry.respond(Body::builder().build());

    // The session survives a recovered transport failure.
    session.send(marker("Req2")).await.expect("send");
    let exchange = transport.await_exchange().await;
    exchange.respond(Body::builder().build());
}

#[tokio::test]
async fn exhausted_transport_retries_void_the_session() {
    let transport = StubTransport::new();
    let session = client_with(
        &transport,
        SessionConfig {
            max_attempts: 2,
            ..SessionConfig::default()
        }
        .with_initial_rid(FIRST_RID),
    );
    establish(&session, &transport, None).await;
    let probe = ConnProbe::attach(&session);

    session.send(marker("Req1")).await.expect("send");
    transport.await_exchange().await.fail(TransportError::Timeout);
    transport.await_exchange().await.fail(TransportError::Timeout);

    let event = probe.wait_for_disconnect().await;
    assert!(matches!(event.cause, Some(TerminationCause::Transport(_))));
    assert!(session.send(marker("Req2")).await.is_err());
}
