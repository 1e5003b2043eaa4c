use crate::base::{DecodePacket, EncodePacket, PacketId};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub packet_id: PacketId,
    pub filters: Vec<String>,
}

impl DecodePacket for UnsubscribePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type != PacketType::Unsubscribe {
            return Err(DecodeError::InvalidPacketType);
        }
        let packet_id = ba.read_u16()?;
        let payload_end = ba.offset() + fixed_header.remaining_length - 2;
        let mut filters = Vec::new();
        while ba.offset() < payload_end {
            filters.push(ba.read_string()?);
        }
        if filters.is_empty() {
            return Err(DecodeError::EmptyTopicFilters);
        }
        Ok(Self { packet_id, filters })
    }
}

impl EncodePacket for UnsubscribePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.packet_id.to_be_bytes());
        for filter in &self.filters {
            crate::base::encode_string(filter, &mut body)?;
        }

        let old_len = buf.len();
        FixedHeader::new(PacketType::Unsubscribe, body.len())?.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(buf.len() - old_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_multiple_filters() {
        let packet = UnsubscribePacket {
            packet_id: 3,
            filters: vec!["nas/panel/+".to_string(), "$SYS/#".to_string()],
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(UnsubscribePacket::decode(&mut ba).unwrap(), packet);
    }
}
