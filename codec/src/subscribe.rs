use std::convert::TryFrom;

use crate::base::{DecodePacket, EncodePacket, PacketId, QoS};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// One `(filter, requested QoS)` pair from a SUBSCRIBE payload. The filter
/// is kept as a raw string here; the broker parses it into a `TopicFilter`
/// when it installs the subscription, so a malformed filter inside an
/// otherwise well-formed SUBSCRIBE can be failed per-filter rather than
/// aborting the whole packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeTopic {
    pub filter: String,
    pub qos: QoS,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_id: PacketId,
    pub topics: Vec<SubscribeTopic>,
}

impl DecodePacket for SubscribePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type != PacketType::Subscribe {
            return Err(DecodeError::InvalidPacketType);
        }

        let packet_id = ba.read_u16()?;
        let payload_end = ba.offset() + fixed_header.remaining_length - 2;

        let mut topics = Vec::new();
        while ba.offset() < payload_end {
            let filter = ba.read_string()?;
            let qos = QoS::try_from(ba.read_byte()? & 0b0000_0011)?;
            topics.push(SubscribeTopic { filter, qos });
        }

        if topics.is_empty() {
            return Err(DecodeError::EmptyTopicFilters);
        }

        Ok(Self { packet_id, topics })
    }
}

impl EncodePacket for SubscribePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.packet_id.to_be_bytes());
        for topic in &self.topics {
            crate::base::encode_string(&topic.filter, &mut body)?;
            body.push(topic.qos as u8);
        }

        let old_len = buf.len();
        FixedHeader::new(PacketType::Subscribe, body.len())?.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(buf.len() - old_len)
    }
}
