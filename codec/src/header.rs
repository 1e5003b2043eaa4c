use std::convert::TryFrom;

use crate::base::{DecodePacket, EncodePacket, QoS};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::var_int::VarInt;

/// Control packet type, carrying the flag-nibble fields that vary by type
/// (PUBLISH's dup/qos/retain) directly in the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Connect,
    ConnectAck,
    Publish { dup: bool, qos: QoS, retain: bool },
    PublishAck,
    Subscribe,
    SubscribeAck,
    Unsubscribe,
    UnsubscribeAck,
    PingRequest,
    PingResponse,
    Disconnect,
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        let type_bits: u8 = match packet_type {
            PacketType::Connect => 1,
            PacketType::ConnectAck => 2,
            PacketType::Publish { .. } => 3,
            PacketType::PublishAck => 4,
            PacketType::Subscribe => 8,
            PacketType::SubscribeAck => 9,
            PacketType::Unsubscribe => 10,
            PacketType::UnsubscribeAck => 11,
            PacketType::PingRequest => 12,
            PacketType::PingResponse => 13,
            PacketType::Disconnect => 14,
        };

        let flag_bits: u8 = match packet_type {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b1000 } else { 0 };
                let qos = (qos as u8) << 1;
                let retain = u8::from(retain);
                dup | qos | retain
            }
            // Reserved bits for SUBSCRIBE/UNSUBSCRIBE are fixed at 0b0010.
            PacketType::Subscribe | PacketType::Unsubscribe => 0b0010,
            _ => 0,
        };

        (type_bits << 4) | flag_bits
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        let type_bits = (v & 0b1111_0000) >> 4;
        let flags = v & 0b0000_1111;

        let zero_flags = |packet: Self| -> Result<Self, DecodeError> {
            if flags == 0 {
                Ok(packet)
            } else {
                Err(DecodeError::InvalidPacketFlags)
            }
        };

        match type_bits {
            1 => zero_flags(Self::Connect),
            2 => zero_flags(Self::ConnectAck),
            3 => {
                let dup = flags & 0b1000 != 0;
                let retain = flags & 0b0001 != 0;
                let qos = QoS::try_from((flags & 0b0110) >> 1)?;
                Ok(Self::Publish { dup, qos, retain })
            }
            4 => zero_flags(Self::PublishAck),
            8 => {
                if flags == 0b0010 {
                    Ok(Self::Subscribe)
                } else {
                    Err(DecodeError::InvalidPacketFlags)
                }
            }
            9 => zero_flags(Self::SubscribeAck),
            10 => {
                if flags == 0b0010 {
                    Ok(Self::Unsubscribe)
                } else {
                    Err(DecodeError::InvalidPacketFlags)
                }
            }
            11 => zero_flags(Self::UnsubscribeAck),
            12 => zero_flags(Self::PingRequest),
            13 => zero_flags(Self::PingResponse),
            14 => zero_flags(Self::Disconnect),
            _ => Err(DecodeError::InvalidPacketType),
        }
    }
}

/// Fixed header: one type+flags byte, followed by a variable byte integer
/// giving the length of everything that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub remaining_length: usize,
}

impl FixedHeader {
    pub fn new(packet_type: PacketType, remaining_length: usize) -> Result<Self, EncodeError> {
        VarInt::new(remaining_length)?;
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }
}

impl DecodePacket for FixedHeader {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let flag_byte = ba.read_byte()?;
        let packet_type = PacketType::try_from(flag_byte)?;
        let remaining_length = VarInt::decode(ba)?.value();
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }
}

impl EncodePacket for FixedHeader {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(self.packet_type.into());
        let var_int = VarInt::new(self.remaining_length)?;
        let n = var_int.encode(buf)?;
        Ok(1 + n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_publish_flags() {
        let buf = [0b0011_1101, 0x00];
        let mut ba = ByteArray::new(&buf);
        let header = FixedHeader::decode(&mut ba).unwrap();
        assert_eq!(
            header.packet_type,
            PacketType::Publish {
                dup: true,
                qos: QoS::ExactOnce,
                retain: true,
            }
        );
    }

    #[test]
    fn subscribe_requires_reserved_flags() {
        let buf = [0b1000_0000, 0x00];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            FixedHeader::decode(&mut ba),
            Err(DecodeError::InvalidPacketFlags)
        );
    }
}
