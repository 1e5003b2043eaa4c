use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingResponsePacket;

impl DecodePacket for PingResponsePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type != PacketType::PingResponse
            || fixed_header.remaining_length != 0
        {
            return Err(DecodeError::InvalidPacketType);
        }
        Ok(Self)
    }
}

impl EncodePacket for PingResponsePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        FixedHeader::new(PacketType::PingResponse, 0)?.encode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_to_two_bytes() {
        let mut buf = Vec::new();
        PingResponsePacket.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0xd0, 0x00]);
    }
}
