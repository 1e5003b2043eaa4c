use std::convert::TryFrom;

use crate::base::{DecodePacket, EncodePacket, PacketId, QoS};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// One SUBACK return code: the granted QoS for a filter, or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeReturnCode {
    Granted(QoS),
    Failure,
}

impl From<SubscribeReturnCode> for u8 {
    fn from(code: SubscribeReturnCode) -> Self {
        match code {
            SubscribeReturnCode::Granted(qos) => qos as u8,
            SubscribeReturnCode::Failure => 0x80,
        }
    }
}

impl SubscribeReturnCode {
    fn decode_byte(byte: u8) -> Result<Self, DecodeError> {
        if byte == 0x80 {
            Ok(Self::Failure)
        } else {
            Ok(Self::Granted(QoS::try_from(byte)?))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeAckPacket {
    pub packet_id: PacketId,
    pub return_codes: Vec<SubscribeReturnCode>,
}

impl DecodePacket for SubscribeAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type != PacketType::SubscribeAck {
            return Err(DecodeError::InvalidPacketType);
        }
        let packet_id = ba.read_u16()?;
        let payload_end = ba.offset() + fixed_header.remaining_length - 2;
        let mut return_codes = Vec::new();
        while ba.offset() < payload_end {
            return_codes.push(SubscribeReturnCode::decode_byte(ba.read_byte()?)?);
        }
        Ok(Self {
            packet_id,
            return_codes,
        })
    }
}

impl EncodePacket for SubscribeAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.packet_id.to_be_bytes());
        for code in &self.return_codes {
            body.push((*code).into());
        }

        let old_len = buf.len();
        FixedHeader::new(PacketType::SubscribeAck, body.len())?.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(buf.len() - old_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_grants_and_failures() {
        let packet = SubscribeAckPacket {
            packet_id: 5,
            return_codes: vec![
                SubscribeReturnCode::Granted(QoS::AtLeastOnce),
                SubscribeReturnCode::Failure,
            ],
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(SubscribeAckPacket::decode(&mut ba).unwrap(), packet);
    }

    #[test]
    fn qos2_subscribe_is_downgraded_to_granted_one() {
        // The session layer is responsible for never emitting
        // `Granted(QoS::ExactOnce)`; this just confirms the wire
        // representation has no separate "downgraded" marker.
        let code = SubscribeReturnCode::Granted(QoS::AtLeastOnce);
        assert_eq!(u8::from(code), 1);
    }
}
