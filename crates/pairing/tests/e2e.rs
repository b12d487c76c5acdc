//! End-to-end pairing tests over the in-process transport fabric.

use std::sync::Arc;
use std::time::Duration;

use pairing::{
    ChannelEvent, Listener, MemoryTransport, PairError, PairSocket, RawChannel, Role,
    SocketEvent, Transport,
};
use protocol::Rendezvous;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TestMessage {
    seq: u64,
    body: String,
    blob: Vec<u8>,
}

impl TestMessage {
    fn sample(seq: u64) -> Self {
        Self {
            seq,
            body: format!("message {seq}"),
            blob: vec![0, 1, 2, 0xFF, 0x80],
        }
    }
}

type Socket = PairSocket<TestMessage>;
type Events = mpsc::Receiver<SocketEvent<TestMessage>>;

/// Receives the next session event, failing the test on a stuck stream.
async fn next_event(events: &mut Events) -> SocketEvent<TestMessage> {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event stream ended unexpectedly")
}

async fn expect_open(events: &mut Events) {
    match next_event(events).await {
        SocketEvent::Open => {}
        other => panic!("expected Open, got {other:?}"),
    }
}

async fn expect_message(events: &mut Events) -> TestMessage {
    match next_event(events).await {
        SocketEvent::Message(message) => message,
        other => panic!("expected Message, got {other:?}"),
    }
}

fn spawn_pair(
    transport: &Arc<MemoryTransport>,
    code: &str,
) -> ((Socket, Events), (Socket, Events)) {
    let initiator = Socket::new(code, Role::Initiator, transport.clone()).unwrap();
    let initiator_events = initiator.events().unwrap();
    let responder = Socket::new(code, Role::Responder, transport.clone()).unwrap();
    let responder_events = responder.events().unwrap();
    ((initiator, initiator_events), (responder, responder_events))
}

#[tokio::test]
async fn test_full_pairing_exchanges_values_both_ways() {
    let transport = Arc::new(MemoryTransport::new());
    let ((initiator, mut initiator_events), (responder, mut responder_events)) =
        spawn_pair(&transport, "otter-paints-07");

    expect_open(&mut initiator_events).await;
    expect_open(&mut responder_events).await;

    let from_initiator = TestMessage::sample(1);
    initiator.send(&from_initiator).await.unwrap();
    assert_eq!(expect_message(&mut responder_events).await, from_initiator);

    let from_responder = TestMessage::sample(2);
    responder.send(&from_responder).await.unwrap();
    assert_eq!(expect_message(&mut initiator_events).await, from_responder);

    initiator.close().await;
    responder.close().await;
}

#[tokio::test]
async fn test_pairing_works_when_responder_starts_first() {
    let transport = Arc::new(MemoryTransport::new());
    let code = "heron-waits-11";

    let responder = Socket::new(code, Role::Responder, transport.clone()).unwrap();
    let mut responder_events = responder.events().unwrap();

    // Let the responder's dial park against the unregistered initiator id.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let initiator = Socket::new(code, Role::Initiator, transport.clone()).unwrap();
    let mut initiator_events = initiator.events().unwrap();

    expect_open(&mut responder_events).await;
    expect_open(&mut initiator_events).await;

    let message = TestMessage::sample(3);
    responder.send(&message).await.unwrap();
    assert_eq!(expect_message(&mut initiator_events).await, message);

    initiator.close().await;
    responder.close().await;
}

#[tokio::test]
async fn test_responder_discards_stray_connection_and_recovers() {
    let transport = Arc::new(MemoryTransport::new());
    let code = "gull-races-23";
    let rendezvous = Rendezvous::derive(code).unwrap();

    let responder = Socket::new(code, Role::Responder, transport.clone()).unwrap();
    let mut responder_events = responder.events().unwrap();

    // A stray connection lands while the responder's dial is still
    // unresolved (the initiator does not exist yet).
    let intruder = transport.open("bystander").await.unwrap();
    let stray = intruder
        .connect(rendezvous.responder_id(), true)
        .await
        .unwrap();
    let mut stray_events = stray.events().unwrap();

    // The responder must shrug the stray off, not fail the session.
    match tokio::time::timeout(Duration::from_secs(5), stray_events.recv()).await {
        Ok(Some(ChannelEvent::Closed)) | Ok(None) => {}
        other => panic!("expected the stray channel to be closed, got {other:?}"),
    }

    let initiator = Socket::new(code, Role::Initiator, transport.clone()).unwrap();
    let mut initiator_events = initiator.events().unwrap();

    expect_open(&mut responder_events).await;
    expect_open(&mut initiator_events).await;

    let message = TestMessage::sample(4);
    initiator.send(&message).await.unwrap();
    assert_eq!(expect_message(&mut responder_events).await, message);

    initiator.close().await;
    responder.close().await;
    intruder.close().await;
}

#[tokio::test]
async fn test_close_before_handshake_completes() {
    let transport = Arc::new(MemoryTransport::new());

    // No peer ever shows up; the handshake can only wait.
    let socket = Socket::new("lonely-12", Role::Initiator, transport.clone()).unwrap();
    let mut events = socket.events().unwrap();

    socket.close().await;

    match next_event(&mut events).await {
        SocketEvent::Closed => {}
        other => panic!("expected Closed, got {other:?}"),
    }

    // No Open may follow, and the identity must be free again.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());

    let rendezvous = Rendezvous::derive("lonely-12").unwrap();
    let reopened = transport.open(rendezvous.initiator_id()).await;
    assert!(reopened.is_ok(), "listening identity was not released");
}

#[tokio::test]
async fn test_double_close_is_a_no_op() {
    let transport = Arc::new(MemoryTransport::new());
    let ((initiator, mut initiator_events), (responder, mut responder_events)) =
        spawn_pair(&transport, "crane-folds-31");

    expect_open(&mut initiator_events).await;
    expect_open(&mut responder_events).await;

    initiator.close().await;
    initiator.close().await;

    match next_event(&mut initiator_events).await {
        SocketEvent::Closed => {}
        other => panic!("expected Closed, got {other:?}"),
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(initiator_events.try_recv().is_err());

    responder.close().await;
}

#[tokio::test]
async fn test_peer_close_closes_the_session() {
    let transport = Arc::new(MemoryTransport::new());
    let ((initiator, mut initiator_events), (responder, mut responder_events)) =
        spawn_pair(&transport, "ibis-leaves-44");

    expect_open(&mut initiator_events).await;
    expect_open(&mut responder_events).await;

    initiator.close().await;

    // The responder observes the channel close and tears down too.
    loop {
        match next_event(&mut responder_events).await {
            SocketEvent::Closed => break,
            SocketEvent::Error(_) => continue,
            other => panic!("expected Closed (or Error), got {other:?}"),
        }
    }
    assert!(matches!(
        responder.send(&TestMessage::sample(9)).await,
        Err(PairError::NotConnected)
    ));
}

#[tokio::test]
async fn test_send_before_open_fails() {
    let transport = Arc::new(MemoryTransport::new());
    let socket = Socket::new("early-bird-05", Role::Initiator, transport).unwrap();

    let result = socket.send(&TestMessage::sample(0)).await;
    assert!(matches!(result, Err(PairError::NotConnected)));

    socket.close().await;
}

#[tokio::test]
async fn test_send_after_close_fails() {
    let transport = Arc::new(MemoryTransport::new());
    let ((initiator, mut initiator_events), (responder, mut responder_events)) =
        spawn_pair(&transport, "late-owl-19");

    expect_open(&mut initiator_events).await;
    expect_open(&mut responder_events).await;

    initiator.close().await;
    let result = initiator.send(&TestMessage::sample(1)).await;
    assert!(matches!(result, Err(PairError::NotConnected)));

    responder.close().await;
}

#[tokio::test]
async fn test_unreliable_channel_fails_the_contract() {
    let transport = Arc::new(MemoryTransport::new());
    let code = "pigeon-drops-50";
    let rendezvous = Rendezvous::derive(code).unwrap();

    let initiator = Socket::new(code, Role::Initiator, transport.clone()).unwrap();
    let mut initiator_events = initiator.events().unwrap();

    // An impostor claims the responder identity and offers an unreliable
    // channel to the waiting initiator.
    let impostor = transport.open(rendezvous.responder_id()).await.unwrap();
    let _unreliable = impostor
        .connect(rendezvous.initiator_id(), false)
        .await
        .unwrap();

    match next_event(&mut initiator_events).await {
        SocketEvent::Error(PairError::Contract(_)) => {}
        other => panic!("expected a contract error, got {other:?}"),
    }
    match next_event(&mut initiator_events).await {
        SocketEvent::Closed => {}
        other => panic!("expected Closed, got {other:?}"),
    }

    impostor.close().await;
}

#[tokio::test]
async fn test_event_stream_is_take_once() {
    let transport = Arc::new(MemoryTransport::new());
    let socket = Socket::new("single-take-60", Role::Initiator, transport).unwrap();

    assert!(socket.events().is_some());
    assert!(socket.events().is_none());

    socket.close().await;
}

#[tokio::test]
async fn test_dynamic_values_roundtrip() {
    use rmpv::Value;

    let transport = Arc::new(MemoryTransport::new());
    let code = "finch-sings-73";

    let initiator = PairSocket::<Value>::new(code, Role::Initiator, transport.clone()).unwrap();
    let mut initiator_events = initiator.events().unwrap();
    let responder = PairSocket::<Value>::new(code, Role::Responder, transport.clone()).unwrap();
    let mut responder_events = responder.events().unwrap();

    match tokio::time::timeout(Duration::from_secs(5), initiator_events.recv()).await {
        Ok(Some(SocketEvent::Open)) => {}
        other => panic!("expected Open, got {other:?}"),
    }
    match tokio::time::timeout(Duration::from_secs(5), responder_events.recv()).await {
        Ok(Some(SocketEvent::Open)) => {}
        other => panic!("expected Open, got {other:?}"),
    }

    let value = Value::Map(vec![
        (Value::from("kind"), Value::from("greeting")),
        (Value::from("count"), Value::from(3)),
    ]);
    initiator.send(&value).await.unwrap();

    match tokio::time::timeout(Duration::from_secs(5), responder_events.recv()).await {
        Ok(Some(SocketEvent::Message(received))) => assert_eq!(received, value),
        other => panic!("expected Message, got {other:?}"),
    }

    initiator.close().await;
    responder.close().await;
}
