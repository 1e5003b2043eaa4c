use crate::base::{DecodePacket, EncodePacket, PacketId, QoS};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};
use crate::topic::validate_topic_name;

/// A PUBLISH packet. `packet_id` is `None` for QoS 0 and `Some` for QoS 1
/// (QoS 2 is never produced on the wire by this broker; see [`QoS::min`]
/// callers in the session layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic_name: String,
    pub packet_id: Option<PacketId>,
    pub payload: Vec<u8>,
}

impl DecodePacket for PublishPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let PacketType::Publish { dup, qos, retain } = fixed_header.packet_type else {
            return Err(DecodeError::InvalidPacketType);
        };

        let topic_name = ba.read_string()?;
        validate_topic_name(&topic_name).map_err(|_| DecodeError::InvalidTopicName)?;

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            Some(ba.read_u16()?)
        };

        let payload = ba.read_remaining().to_vec();

        Ok(Self {
            dup,
            qos,
            retain,
            topic_name,
            packet_id,
            payload,
        })
    }
}

impl EncodePacket for PublishPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        crate::base::encode_string(&self.topic_name, &mut body)?;
        if let Some(packet_id) = self.packet_id {
            body.extend_from_slice(&packet_id.to_be_bytes());
        }
        body.extend_from_slice(&self.payload);

        let old_len = buf.len();
        let packet_type = PacketType::Publish {
            dup: self.dup,
            qos: self.qos,
            retain: self.retain,
        };
        let fixed_header = FixedHeader::new(packet_type, body.len())?;
        fixed_header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(buf.len() - old_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos0_has_no_packet_id() {
        let packet = PublishPacket {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: true,
            topic_name: "nas/panel/metrics".to_string(),
            packet_id: None,
            payload: br#"{"cpu":42}"#.to_vec(),
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(PublishPacket::decode(&mut ba).unwrap(), packet);
    }

    #[test]
    fn qos1_round_trips_with_packet_id() {
        let packet = PublishPacket {
            dup: true,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic_name: "nas/panel/cmd".to_string(),
            packet_id: Some(7),
            payload: b"ping".to_vec(),
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(PublishPacket::decode(&mut ba).unwrap(), packet);
    }
}
