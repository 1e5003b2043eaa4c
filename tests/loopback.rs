mod common;

use std::time::Duration;

use nas_panel_codec::{Packet, QoS};

use common::{TestBroker, TestClient};

/// Client A connects and publishes a retained message. Client B, already
/// subscribed, receives it live with retain cleared; a new subscriber C
/// receives the same payload with retain set, delivered from the store.
#[tokio::test]
async fn connect_publish_subscribe_loopback() {
    let broker = TestBroker::spawn().await;

    let mut a = TestClient::connect(broker.addr).await;
    a.connect_packet("a", true, 30).await;
    assert!(matches!(a.read_packet().await, Packet::ConnectAck(_)));

    let mut b = TestClient::connect(broker.addr).await;
    b.connect_packet("b", true, 30).await;
    assert!(matches!(b.read_packet().await, Packet::ConnectAck(_)));
    b.subscribe(1, "nas/panel/data", QoS::AtLeastOnce).await;
    assert!(matches!(b.read_packet().await, Packet::SubscribeAck(_)));

    a.publish("nas/panel/data", br#"{"x":1}"#, QoS::AtLeastOnce, true, Some(1))
        .await;
    assert!(matches!(a.read_packet().await, Packet::PublishAck(_)));

    match b.read_packet().await {
        Packet::Publish(publish) => {
            assert_eq!(publish.payload, br#"{"x":1}"#);
            assert!(!publish.retain);
            assert_eq!(publish.qos, QoS::AtLeastOnce);
        }
        other => panic!("expected a PUBLISH, got {other:?}"),
    }

    let mut c = TestClient::connect(broker.addr).await;
    c.connect_packet("c", true, 30).await;
    assert!(matches!(c.read_packet().await, Packet::ConnectAck(_)));
    c.subscribe(1, "nas/panel/+", QoS::AtLeastOnce).await;
    assert!(matches!(c.read_packet().await, Packet::SubscribeAck(_)));

    match c.read_packet().await {
        Packet::Publish(publish) => {
            assert_eq!(publish.payload, br#"{"x":1}"#);
            assert!(publish.retain);
        }
        other => panic!("expected the retained PUBLISH, got {other:?}"),
    }

    broker.shutdown().await;
}

/// An empty retained publish clears the retained store entry; a new
/// subscriber afterwards receives nothing for that topic.
#[tokio::test]
async fn retained_delete_with_empty_payload() {
    let broker = TestBroker::spawn().await;

    let mut a = TestClient::connect(broker.addr).await;
    a.connect_packet("a", true, 30).await;
    assert!(matches!(a.read_packet().await, Packet::ConnectAck(_)));

    a.publish("nas/panel/data", br#"{"x":1}"#, QoS::AtLeastOnce, true, Some(1))
        .await;
    assert!(matches!(a.read_packet().await, Packet::PublishAck(_)));

    a.publish("nas/panel/data", b"", QoS::AtLeastOnce, true, Some(2)).await;
    assert!(matches!(a.read_packet().await, Packet::PublishAck(_)));

    let mut d = TestClient::connect(broker.addr).await;
    d.connect_packet("d", true, 30).await;
    assert!(matches!(d.read_packet().await, Packet::ConnectAck(_)));
    d.subscribe(1, "nas/panel/data", QoS::AtLeastOnce).await;
    assert!(matches!(d.read_packet().await, Packet::SubscribeAck(_)));

    assert!(
        d.try_read_packet(Duration::from_millis(300)).await.is_none(),
        "no retained message should be delivered after it was cleared"
    );

    broker.shutdown().await;
}

/// An unrelated client keeps working while a different client gets closed
/// for sending a malformed PUBLISH (its topic length overruns the packet's
/// remaining length).
#[tokio::test]
async fn malformed_packet_is_isolated_to_its_own_connection() {
    let broker = TestBroker::spawn().await;

    let mut bystander = TestClient::connect(broker.addr).await;
    bystander.connect_packet("bystander", true, 30).await;
    assert!(matches!(bystander.read_packet().await, Packet::ConnectAck(_)));
    bystander.subscribe(1, "nas/panel/data", QoS::AtMostOnce).await;
    assert!(matches!(bystander.read_packet().await, Packet::SubscribeAck(_)));

    let mut offender = TestClient::connect(broker.addr).await;
    offender.connect_packet("offender", true, 30).await;
    assert!(matches!(offender.read_packet().await, Packet::ConnectAck(_)));

    // PUBLISH fixed header claims remaining length 20 but the topic length
    // prefix (0x00, 0xff) says 255 bytes of topic follow, with nothing
    // near that much actually in the frame.
    offender
        .send_raw(&[0x30, 20, 0x00, 0xff, b'x', b'x', b'x', b'x'])
        .await;
    assert!(offender.wait_closed(Duration::from_secs(2)).await);

    let mut other = TestClient::connect(broker.addr).await;
    other.connect_packet("other", true, 30).await;
    assert!(matches!(other.read_packet().await, Packet::ConnectAck(_)));
    other
        .publish("nas/panel/data", b"still alive", QoS::AtMostOnce, false, None)
        .await;

    match bystander.read_packet().await {
        Packet::Publish(publish) => assert_eq!(publish.payload, b"still alive"),
        other => panic!("expected the bystander's PUBLISH, got {other:?}"),
    }

    broker.shutdown().await;
}

/// A subscriber that stops reading gets its outbound queue filled and is
/// disconnected; its will fires, and other subscribers are unaffected.
#[tokio::test]
async fn slow_consumer_is_disconnected_and_will_fires() {
    let broker = TestBroker::spawn().await;

    let mut slow = TestClient::connect(broker.addr).await;
    slow.connect_with_will(
        "slow",
        30,
        "nas/panel/status",
        b"offline",
        QoS::AtMostOnce,
    )
    .await;
    assert!(matches!(slow.read_packet().await, Packet::ConnectAck(_)));
    slow.subscribe(1, "nas/panel/data", QoS::AtMostOnce).await;
    assert!(matches!(slow.read_packet().await, Packet::SubscribeAck(_)));

    let mut witness = TestClient::connect(broker.addr).await;
    witness.connect_packet("witness", true, 30).await;
    assert!(matches!(witness.read_packet().await, Packet::ConnectAck(_)));
    witness.subscribe(1, "nas/panel/status", QoS::AtMostOnce).await;
    assert!(matches!(witness.read_packet().await, Packet::SubscribeAck(_)));

    let mut publisher = TestClient::connect(broker.addr).await;
    publisher.connect_packet("publisher", true, 30).await;
    assert!(matches!(publisher.read_packet().await, Packet::ConnectAck(_)));

    // Flood past the outbound queue capacity without ever draining `slow`.
    for i in 0..400u32 {
        publisher
            .publish("nas/panel/data", format!("msg-{i}").as_bytes(), QoS::AtMostOnce, false, None)
            .await;
    }

    let mut saw_will = false;
    for _ in 0..5 {
        match witness.try_read_packet(Duration::from_secs(2)).await {
            Some(Packet::Publish(publish)) if publish.topic_name == "nas/panel/status" => {
                assert_eq!(publish.payload, b"offline");
                saw_will = true;
                break;
            }
            Some(_) => continue,
            None => break,
        }
    }
    assert!(saw_will, "expected the slow consumer's will to fire");

    // The publisher keeps working afterwards.
    publisher
        .publish("nas/panel/data", b"after", QoS::AtMostOnce, false, None)
        .await;

    broker.shutdown().await;
}
