use std::net::SocketAddr;
use std::time::Duration;

use nas_panel_codec::{
    ByteArray, ConnectFlags, ConnectPacket, DisconnectPacket, EncodePacket, FixedHeader, Packet,
    PingRequestPacket, PublishPacket, QoS, SubscribePacket, SubscribeTopic, UnsubscribePacket,
    VarInt,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A bare-bones MQTT client used only to drive integration scenarios
/// against an in-process broker: it speaks just enough of the wire codec
/// to send requests and decode whatever comes back.
pub struct TestClient {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect to broker");
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    pub async fn send<P: EncodePacket>(&mut self, packet: &P) {
        let mut buf = Vec::new();
        packet.encode(&mut buf).expect("encode packet");
        self.stream.write_all(&buf).await.expect("write packet");
    }

    pub async fn connect_packet(
        &mut self,
        client_id: &str,
        clean_session: bool,
        keep_alive: u16,
    ) {
        let packet = ConnectPacket {
            flags: ConnectFlags {
                clean_session,
                ..ConnectFlags::default()
            },
            keep_alive,
            client_id: client_id.to_string(),
            will_topic: None,
            will_message: Vec::new(),
            username: None,
            password: None,
        };
        self.send(&packet).await;
    }

    pub async fn connect_with_will(
        &mut self,
        client_id: &str,
        keep_alive: u16,
        will_topic: &str,
        will_message: &[u8],
        will_qos: QoS,
    ) {
        let packet = ConnectPacket {
            flags: ConnectFlags {
                will: true,
                will_qos,
                clean_session: true,
                ..ConnectFlags::default()
            },
            keep_alive,
            client_id: client_id.to_string(),
            will_topic: Some(will_topic.to_string()),
            will_message: will_message.to_vec(),
            username: None,
            password: None,
        };
        self.send(&packet).await;
    }

    pub async fn subscribe(&mut self, packet_id: u16, filter: &str, qos: QoS) {
        let packet = SubscribePacket {
            packet_id,
            topics: vec![SubscribeTopic {
                filter: filter.to_string(),
                qos,
            }],
        };
        self.send(&packet).await;
    }

    pub async fn unsubscribe(&mut self, packet_id: u16, filter: &str) {
        let packet = UnsubscribePacket {
            packet_id,
            filters: vec![filter.to_string()],
        };
        self.send(&packet).await;
    }

    pub async fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool, packet_id: Option<u16>) {
        let packet = PublishPacket {
            dup: false,
            qos,
            retain,
            topic_name: topic.to_string(),
            packet_id,
            payload: payload.to_vec(),
        };
        self.send(&packet).await;
    }

    pub async fn ping(&mut self) {
        self.send(&PingRequestPacket).await;
    }

    pub async fn disconnect(&mut self) {
        self.send(&DisconnectPacket).await;
    }

    /// Send raw bytes directly, bypassing the codec -- for malformed-packet
    /// scenarios the encoder can't produce.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write raw bytes");
    }

    /// Read exactly one packet, waiting indefinitely.
    pub async fn read_packet(&mut self) -> Packet {
        self.try_read_packet(Duration::from_secs(5))
            .await
            .expect("expected a packet before the timeout")
    }

    /// Read one packet, or `None` if nothing arrives within `timeout`
    /// (connection closed, or the broker genuinely has nothing to send).
    pub async fn try_read_packet(&mut self, timeout: Duration) -> Option<Packet> {
        tokio::time::timeout(timeout, self.next_frame()).await.ok().flatten()
    }

    /// Wait for the connection to be closed by the peer.
    pub async fn wait_closed(&mut self, timeout: Duration) -> bool {
        let mut scratch = [0u8; 1];
        matches!(
            tokio::time::timeout(timeout, self.stream.read(&mut scratch)).await,
            Ok(Ok(0))
        )
    }

    async fn next_frame(&mut self) -> Option<Packet> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Ok(header) = Packet::peek_fixed_header(&self.buf) {
                let needed = fixed_header_len(&header) + header.remaining_length;
                if self.buf.len() >= needed {
                    let frame: Vec<u8> = self.buf.drain(..needed).collect();
                    let mut ba = ByteArray::new(&frame);
                    return Packet::decode(&mut ba).ok();
                }
            }
            let n = self.stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

fn fixed_header_len(header: &FixedHeader) -> usize {
    1 + VarInt::new(header.remaining_length).map(|v| v.bytes()).unwrap_or(1)
}
