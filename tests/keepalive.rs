mod common;

use std::time::Duration;

use nas_panel_codec::{Packet, QoS};

use common::{TestBroker, TestClient};

/// A session that negotiates keep-alive=2 and then goes silent is closed
/// once 1.5x that interval has elapsed, and its will fires exactly once.
#[tokio::test]
async fn keep_alive_expiry_fires_will() {
    let broker = TestBroker::spawn().await;

    let mut witness = TestClient::connect(broker.addr).await;
    witness.connect_packet("witness", true, 30).await;
    assert!(matches!(witness.read_packet().await, Packet::ConnectAck(_)));
    witness.subscribe(1, "nas/panel/status", QoS::AtMostOnce).await;
    assert!(matches!(witness.read_packet().await, Packet::SubscribeAck(_)));

    let mut quiet = TestClient::connect(broker.addr).await;
    quiet
        .connect_with_will("quiet", 2, "nas/panel/status", b"offline", QoS::AtMostOnce)
        .await;
    assert!(matches!(quiet.read_packet().await, Packet::ConnectAck(_)));

    // Send nothing further; 1.5 * keep_alive = 3s should close it.
    assert!(quiet.wait_closed(Duration::from_secs(4)).await);

    match witness.read_packet().await {
        Packet::Publish(publish) => {
            assert_eq!(publish.topic_name, "nas/panel/status");
            assert_eq!(publish.payload, b"offline");
        }
        other => panic!("expected the will PUBLISH, got {other:?}"),
    }

    broker.shutdown().await;
}

/// A session with keep-alive=0 has no timer and is never closed for
/// inactivity by the per-session mechanism.
#[tokio::test]
async fn zero_keep_alive_disables_the_timer() {
    let broker = TestBroker::spawn().await;

    let mut client = TestClient::connect(broker.addr).await;
    client.connect_packet("forever", true, 0).await;
    assert!(matches!(client.read_packet().await, Packet::ConnectAck(_)));

    // Stay silent well past what a keep-alive=2 session would tolerate.
    assert!(!client.wait_closed(Duration::from_secs(4)).await);

    client.ping().await;
    assert!(matches!(client.read_packet().await, Packet::PingResponse(_)));

    broker.shutdown().await;
}
