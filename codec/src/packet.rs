use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::connect::ConnectPacket;
use crate::connect_ack::ConnectAckPacket;
use crate::disconnect::DisconnectPacket;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};
use crate::pingreq::PingRequestPacket;
use crate::pingresp::PingResponsePacket;
use crate::puback::PublishAckPacket;
use crate::publish::PublishPacket;
use crate::suback::SubscribeAckPacket;
use crate::subscribe::SubscribePacket;
use crate::unsuback::UnsubscribeAckPacket;
use crate::unsubscribe::UnsubscribePacket;

/// Any decoded MQTT control packet. A connection's reader loop decodes
/// into this enum and dispatches on the variant; the writer side only
/// ever constructs the few variants the broker is allowed to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(ConnectPacket),
    ConnectAck(ConnectAckPacket),
    Publish(PublishPacket),
    PublishAck(PublishAckPacket),
    Subscribe(SubscribePacket),
    SubscribeAck(SubscribeAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubscribeAck(UnsubscribeAckPacket),
    PingRequest(PingRequestPacket),
    PingResponse(PingResponsePacket),
    Disconnect(DisconnectPacket),
}

impl Packet {
    /// Peek at the fixed header without consuming it, so the caller can
    /// decide whether a full `remaining_length` worth of bytes has
    /// arrived before attempting a full decode.
    pub fn peek_fixed_header(buf: &[u8]) -> Result<FixedHeader, DecodeError> {
        let mut ba = ByteArray::new(buf);
        FixedHeader::decode(&mut ba)
    }

    pub fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let start = ba.offset();
        let fixed_header = FixedHeader::decode(ba)?;
        ba.reset_offset(start);

        match fixed_header.packet_type {
            PacketType::Connect => ConnectPacket::decode(ba).map(Packet::Connect),
            PacketType::ConnectAck => ConnectAckPacket::decode(ba).map(Packet::ConnectAck),
            PacketType::Publish { .. } => PublishPacket::decode(ba).map(Packet::Publish),
            PacketType::PublishAck => PublishAckPacket::decode(ba).map(Packet::PublishAck),
            PacketType::Subscribe => SubscribePacket::decode(ba).map(Packet::Subscribe),
            PacketType::SubscribeAck => SubscribeAckPacket::decode(ba).map(Packet::SubscribeAck),
            PacketType::Unsubscribe => UnsubscribePacket::decode(ba).map(Packet::Unsubscribe),
            PacketType::UnsubscribeAck => {
                UnsubscribeAckPacket::decode(ba).map(Packet::UnsubscribeAck)
            }
            PacketType::PingRequest => PingRequestPacket::decode(ba).map(Packet::PingRequest),
            PacketType::PingResponse => PingResponsePacket::decode(ba).map(Packet::PingResponse),
            PacketType::Disconnect => DisconnectPacket::decode(ba).map(Packet::Disconnect),
        }
    }
}

impl EncodePacket for Packet {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        match self {
            Packet::Connect(p) => p.encode(buf),
            Packet::ConnectAck(p) => p.encode(buf),
            Packet::Publish(p) => p.encode(buf),
            Packet::PublishAck(p) => p.encode(buf),
            Packet::Subscribe(p) => p.encode(buf),
            Packet::SubscribeAck(p) => p.encode(buf),
            Packet::Unsubscribe(p) => p.encode(buf),
            Packet::UnsubscribeAck(p) => p.encode(buf),
            Packet::PingRequest(p) => p.encode(buf),
            Packet::PingResponse(p) => p.encode(buf),
            Packet::Disconnect(p) => p.encode(buf),
        }
    }
}
