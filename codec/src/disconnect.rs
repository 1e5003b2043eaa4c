use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// A graceful DISCONNECT. Receiving one tells the session to drop its
/// will message before closing the connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisconnectPacket;

impl DecodePacket for DisconnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type != PacketType::Disconnect || fixed_header.remaining_length != 0
        {
            return Err(DecodeError::InvalidPacketType);
        }
        Ok(Self)
    }
}

impl EncodePacket for DisconnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        FixedHeader::new(PacketType::Disconnect, 0)?.encode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_to_two_bytes() {
        let mut buf = Vec::new();
        DisconnectPacket.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0xe0, 0x00]);
    }
}
