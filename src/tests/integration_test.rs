use super::{start_broker, start_client};
use crate::broker::BrokerAddrs;
use crate::client::{Client, ConsumerSlot};
use crate::config::ClientSettings;
use crate::message::Envelope;
use crate::transport::{Context, InboundSocket, OutboundSocket};
use crate::utils::error::ClientError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const SECOND: Duration = Duration::from_secs(1);

#[tokio::test]
async fn integration_ping_reaches_subscriber() {
    let broker = start_broker().await;
    let mut a = start_client(&broker, "a").await;
    a.subscribe(["alpha"]).await.unwrap();
    let mut b = start_client(&broker, "b").await;

    b.send("alpha", json!({"type": "ping"})).unwrap();

    let message = a.wait_for_message_on_topic("alpha", SECOND).await.unwrap();
    assert_eq!(message.topic, "alpha");
    assert_eq!(message.envelope.kind, "ping");
    assert_eq!(message.envelope.name, "b");

    a.stop().await.unwrap();
    b.stop().await.unwrap();
    broker.stop().await;
}

#[tokio::test]
async fn integration_messages_arrive_in_publish_order() {
    let broker = start_broker().await;
    let mut a = start_client(&broker, "a").await;
    a.subscribe(["ordered"]).await.unwrap();
    let mut b = start_client(&broker, "b").await;

    for i in 0..20 {
        b.send("ordered", Envelope::new("seq").with_field("i", i))
            .unwrap();
    }

    for expected in 0..20 {
        let message = a.wait_for_message(|_| true, SECOND).await.unwrap();
        assert_eq!(message.envelope.field("i"), Some(&json!(expected)));
    }

    a.stop().await.unwrap();
    b.stop().await.unwrap();
    broker.stop().await;
}

#[tokio::test]
async fn integration_no_loss_right_after_subscribe() {
    let broker = start_broker().await;
    let mut a = start_client(&broker, "a").await;
    let mut b = start_client(&broker, "b").await;

    // a single message published the instant subscribe returns
    a.subscribe(["first"]).await.unwrap();
    b.send("first", Envelope::new("only")).unwrap();
    let message = a.wait_for_message_on_topic("first", SECOND).await.unwrap();
    assert_eq!(message.envelope.kind, "only");

    a.subscribe(["burst"]).await.unwrap();
    for i in 0..50 {
        b.send("burst", Envelope::new("n").with_field("i", i)).unwrap();
    }
    let mut received = 0;
    while received < 50 {
        a.wait_for_message_on_topic("burst", SECOND).await.unwrap();
        received += 1;
    }
    assert_eq!(a.buffered(), 0);

    a.stop().await.unwrap();
    b.stop().await.unwrap();
    broker.stop().await;
}

#[tokio::test]
async fn integration_probes_are_invisible_to_consumers() {
    let broker = start_broker().await;
    let mut a = start_client(&broker, "a").await;
    a.subscribe(["alpha", "beta", "gamma"]).await.unwrap();
    assert!(a.is_subscribed("beta"));

    let err = a
        .wait_for_message(|_| true, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(a.buffered(), 0);

    a.stop().await.unwrap();
    broker.stop().await;
}

#[tokio::test]
async fn integration_timeout_fires_within_budget() {
    let broker = start_broker().await;
    let mut a = start_client(&broker, "a").await;
    a.subscribe(["alpha"]).await.unwrap();
    let mut b = start_client(&broker, "b").await;
    b.send("alpha", Envelope::new("noise")).unwrap();

    let budget = Duration::from_millis(300);
    let started = Instant::now();
    let err = a.wait_for_message(|_| false, budget).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, ClientError::Timeout(t) if t == budget));
    assert!(elapsed >= budget);
    assert!(elapsed < budget + Duration::from_millis(500));
    assert_eq!(a.consumer(), ConsumerSlot::Idle);

    a.stop().await.unwrap();
    b.stop().await.unwrap();
    broker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn integration_single_consumer_is_enforced() {
    let broker = start_broker().await;
    let a = start_client(&broker, "a").await;
    a.subscribe(["alpha"]).await.unwrap();
    let a = Arc::new(a);
    let mut b = start_client(&broker, "b").await;

    let first = tokio::spawn({
        let a = a.clone();
        async move { a.wait_for_message_on_topic("alpha", SECOND).await }
    });
    while a.consumer() != ConsumerSlot::Waiting {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let second = tokio::spawn({
        let a = a.clone();
        async move { a.wait_for_message_on_topic("alpha", SECOND).await }
    });
    assert!(matches!(
        second.await.unwrap(),
        Err(ClientError::ConcurrentWait)
    ));

    b.send("alpha", Envelope::new("ping")).unwrap();
    assert_eq!(first.await.unwrap().unwrap().envelope.kind, "ping");
    assert_eq!(a.consumer(), ConsumerSlot::Idle);

    let mut a = Arc::try_unwrap(a).expect("waiters still hold the client");
    a.stop().await.unwrap();
    b.stop().await.unwrap();
    broker.stop().await;
}

#[tokio::test]
async fn integration_stop_joins_receive_loop() {
    let broker = start_broker().await;
    let mut a = start_client(&broker, "a").await;
    assert!(a.is_running());

    tokio::time::timeout(SECOND, a.stop())
        .await
        .expect("stop hung")
        .unwrap();
    assert!(!a.is_running());
    // second stop is a no-op; the client cannot be restarted
    a.stop().await.unwrap();
    assert!(matches!(a.start().await, Err(ClientError::AlreadyStarted)));
    assert!(matches!(
        a.send("alpha", Envelope::new("late")),
        Err(ClientError::NotRunning)
    ));

    broker.stop().await;
}

#[tokio::test]
async fn integration_unsubscribe_forgets_topic() {
    let broker = start_broker().await;
    let mut a = start_client(&broker, "a").await;
    a.subscribe(["alpha"]).await.unwrap();

    a.unsubscribe("alpha").unwrap();
    assert!(!a.is_subscribed("alpha"));
    assert!(matches!(
        a.wait_for_message_on_topic("alpha", SECOND).await,
        Err(ClientError::NotSubscribed(_))
    ));

    a.stop().await.unwrap();
    broker.stop().await;
}

#[tokio::test]
async fn integration_empty_topic_is_rejected() {
    let broker = start_broker().await;
    let mut a = start_client(&broker, "a").await;

    assert!(matches!(
        a.subscribe([""]).await,
        Err(ClientError::EmptyTopic)
    ));
    assert!(matches!(
        a.send("", Envelope::new("x")),
        Err(ClientError::EmptyTopic)
    ));

    a.stop().await.unwrap();
    broker.stop().await;
}

#[tokio::test]
async fn integration_handshake_fails_without_relay() {
    // both sides are reachable but nothing forwards between them
    let context = Context::new();
    let inbound = InboundSocket::bind("127.0.0.1:0", &context).await.unwrap();
    let outbound = OutboundSocket::bind("127.0.0.1:0", &context).await.unwrap();
    let addrs = BrokerAddrs::new(
        inbound.local_addr().to_string(),
        outbound.local_addr().to_string(),
    );

    let settings = ClientSettings {
        handshake_attempts: 3,
        handshake_delay_ms: 10,
        ..ClientSettings::default()
    };
    let mut client = Client::new(addrs, settings);
    let err = client.start().await.unwrap_err();

    match err {
        ClientError::HandshakeFailed { topics, attempts } => {
            assert_eq!(attempts, 3);
            assert_eq!(topics, vec![client.command_topic().to_string()]);
        }
        other => panic!("Expected HandshakeFailed, got {other:?}"),
    }

    // a failed start leaves nothing running and stopping stays bounded
    assert!(!client.is_running());
    tokio::time::timeout(SECOND, client.stop())
        .await
        .expect("stop hung after failed start")
        .unwrap();
    assert!(matches!(client.start().await, Err(ClientError::AlreadyStarted)));

    context.terminate();
    inbound.close();
    outbound.close();
}
