// Per-connection reader and writer tasks. The reader owns the decode
// buffer and only ever talks to the broker core via `SessionToBrokerCmd`;
// the writer owns the socket's write half and drains a bounded queue of
// `BrokerToSessionCmd`, so every outbound packet -- whether a direct reply
// or a fan-out from another client -- goes through the same path.

use nas_panel_codec::{
    ByteArray, ConnectAckPacket, ConnectPacket, ConnectReturnCode, DecodeError,
    DisconnectPacket, EncodePacket, FixedHeader, Packet, PingResponsePacket, PublishAckPacket,
    QoS, SubscribeAckPacket, SubscribePacket, SubscribeTopic, UnsubscribeAckPacket,
    UnsubscribePacket,
};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::timeout;

use crate::broker::state::Will;
use crate::commands::{BrokerToSessionCmd, SessionToBrokerCmd};
use crate::types::SessionId;

pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Read bytes off the socket, decode complete packets, and forward them
/// to the broker core. Exits on EOF, a malformed packet, a client-sent
/// DISCONNECT, or keep-alive expiry -- each path reports itself to the
/// broker core as either a graceful `Disconnect` (no will) or an abrupt
/// `Closed` (will fires), matching the session state machine.
pub async fn run_reader(
    session_id: SessionId,
    mut read_half: OwnedReadHalf,
    broker_tx: Sender<SessionToBrokerCmd>,
    peer_addr: String,
) {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    let mut keep_alive: Option<Duration> = None;

    loop {
        let framed = match keep_alive {
            Some(limit) => match timeout(limit, next_frame(&mut read_half, &mut buf, &mut chunk)).await {
                Ok(result) => result,
                Err(_) => {
                    log::warn!("session {session_id} ({peer_addr}): keep-alive expired, closing");
                    let _ = broker_tx.send(SessionToBrokerCmd::Closed(session_id)).await;
                    return;
                }
            },
            None => next_frame(&mut read_half, &mut buf, &mut chunk).await,
        };

        let fixed_header = match framed {
            Ok(Some(header)) => header,
            Ok(None) => {
                log::debug!("session {session_id} ({peer_addr}): connection closed");
                let _ = broker_tx.send(SessionToBrokerCmd::Closed(session_id)).await;
                return;
            }
            Err(_) => {
                log::warn!("session {session_id} ({peer_addr}): malformed packet, closing");
                let _ = broker_tx.send(SessionToBrokerCmd::Closed(session_id)).await;
                return;
            }
        };

        let packet_len = fixed_header_len(&fixed_header) + fixed_header.remaining_length;
        let frame: Vec<u8> = buf.drain(..packet_len).collect();
        let mut ba = ByteArray::new(&frame);
        let packet = match Packet::decode(&mut ba) {
            Ok(packet) => packet,
            Err(err) => {
                log::warn!("session {session_id} ({peer_addr}): decode error {err}");
                let _ = broker_tx.send(SessionToBrokerCmd::Closed(session_id)).await;
                return;
            }
        };

        let cmd = match packet {
            Packet::Connect(connect) => {
                if connect.keep_alive != 0 {
                    keep_alive = Some(Duration::from_millis(u64::from(connect.keep_alive) * 1500));
                }
                Some(SessionToBrokerCmd::Connect(session_id, connect, peer_addr.clone()))
            }
            Packet::Publish(publish) => Some(SessionToBrokerCmd::Publish(session_id, publish)),
            Packet::Subscribe(subscribe) => {
                Some(SessionToBrokerCmd::Subscribe(session_id, subscribe))
            }
            Packet::Unsubscribe(unsubscribe) => {
                Some(SessionToBrokerCmd::Unsubscribe(session_id, unsubscribe))
            }
            Packet::PingRequest(_) => Some(SessionToBrokerCmd::PingRequest(session_id)),
            Packet::Disconnect(_) => {
                let _ = broker_tx.send(SessionToBrokerCmd::Disconnect(session_id)).await;
                return;
            }
            Packet::ConnectAck(_)
            | Packet::PublishAck(_)
            | Packet::SubscribeAck(_)
            | Packet::UnsubscribeAck(_)
            | Packet::PingResponse(_) => {
                log::warn!("session {session_id}: client sent a server-only packet type");
                let _ = broker_tx.send(SessionToBrokerCmd::Closed(session_id)).await;
                return;
            }
        };

        if let Some(cmd) = cmd {
            if broker_tx.send(cmd).await.is_err() {
                return;
            }
        }
    }
}

fn fixed_header_len(header: &FixedHeader) -> usize {
    1 + nas_panel_codec::VarInt::new(header.remaining_length)
        .map(|v| v.bytes())
        .unwrap_or(1)
}

/// Read until `buf` holds at least one complete frame, returning its
/// fixed header. `Ok(None)` means EOF with no partial frame pending;
/// `Err` means the bytes already buffered can never decode to a valid
/// header (bad packet type/flags or an overlong var-int) and the
/// connection must be closed rather than read from again.
async fn next_frame(
    read_half: &mut OwnedReadHalf,
    buf: &mut Vec<u8>,
    chunk: &mut [u8],
) -> Result<Option<FixedHeader>, DecodeError> {
    loop {
        match Packet::peek_fixed_header(buf) {
            Ok(header) => {
                let needed = fixed_header_len(&header) + header.remaining_length;
                if buf.len() >= needed {
                    return Ok(Some(header));
                }
            }
            // Not enough bytes yet to know the header: keep reading.
            Err(DecodeError::OutOfRange) => {}
            // The bytes we have can't ever decode: a bad type/flags byte
            // or a var-int that ran past its continuation limit.
            Err(err) => return Err(err),
        }
        let n = match read_half.read(chunk).await {
            Ok(0) => return Ok(None),
            Ok(n) => n,
            Err(_) => return Ok(None),
        };
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Drain `inbox` and write each packet to the socket. Exits when the
/// channel closes (broker dropped the sender on session removal).
pub async fn run_writer(
    session_id: SessionId,
    mut write_half: OwnedWriteHalf,
    mut inbox: Receiver<BrokerToSessionCmd>,
) {
    while let Some(cmd) = inbox.recv().await {
        let mut buf = Vec::new();
        let encoded = match cmd {
            BrokerToSessionCmd::ConnectAck(packet) => packet.encode(&mut buf),
            BrokerToSessionCmd::Publish(packet) => packet.encode(&mut buf),
            BrokerToSessionCmd::PublishAck(packet_id) => {
                PublishAckPacket { packet_id }.encode(&mut buf)
            }
            BrokerToSessionCmd::SubscribeAck(packet) => packet.encode(&mut buf),
            BrokerToSessionCmd::UnsubscribeAck(packet) => packet.encode(&mut buf),
            BrokerToSessionCmd::PingResponse => PingResponsePacket.encode(&mut buf),
            BrokerToSessionCmd::Kick => {
                let _ = DisconnectPacket.encode(&mut buf);
                let _ = write_half.write_all(&buf).await;
                break;
            }
        };

        if encoded.is_err() {
            log::error!("session {session_id}: failed to encode outbound packet");
            continue;
        }
        if write_half.write_all(&buf).await.is_err() {
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

pub fn connect_ack(session_present: bool, code: ConnectReturnCode) -> ConnectAckPacket {
    ConnectAckPacket {
        session_present,
        return_code: code,
    }
}

pub fn will_from_connect(packet: &ConnectPacket) -> Option<Will> {
    if !packet.flags.will {
        return None;
    }
    Some(Will {
        topic: packet.will_topic.clone().unwrap_or_default(),
        payload: packet.will_message.clone(),
        qos: packet.flags.will_qos.min(QoS::AtLeastOnce),
        retain: packet.flags.will_retain,
    })
}

pub fn subscribe_requests(packet: &SubscribePacket) -> Vec<(String, QoS)> {
    packet
        .topics
        .iter()
        .map(|t: &SubscribeTopic| (t.filter.clone(), t.qos))
        .collect()
}

pub fn unsubscribe_filters(packet: &UnsubscribePacket) -> Vec<String> {
    packet.filters.clone()
}

pub fn subscribe_ack(packet_id: u16, codes: Vec<nas_panel_codec::SubscribeReturnCode>) -> SubscribeAckPacket {
    SubscribeAckPacket {
        packet_id,
        return_codes: codes,
    }
}

pub fn unsubscribe_ack(packet_id: u16) -> UnsubscribeAckPacket {
    UnsubscribeAckPacket { packet_id }
}
