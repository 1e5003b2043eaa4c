use std::convert::TryFrom;

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};

/// Packet identifier used to correlate SUBSCRIBE/PUBLISH (QoS>0)/UNSUBSCRIBE
/// requests with their acknowledgements.
pub type PacketId = u16;

pub trait DecodePacket: Sized {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError>;
}

pub trait EncodePacket {
    /// Encode `self` onto the end of `buf`, returning the number of bytes written.
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError>;
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactOnce = 2,
}

impl QoS {
    #[must_use]
    pub const fn min(self, other: QoS) -> QoS {
        if (self as u8) < (other as u8) {
            self
        } else {
            other
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactOnce),
            _ => Err(DecodeError::InvalidQoS),
        }
    }
}

pub fn encode_string(s: &str, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
    use byteorder::{BigEndian, WriteBytesExt};
    use std::io::Write;

    if s.len() > u16::MAX as usize {
        return Err(EncodeError::StringTooLong);
    }
    #[allow(clippy::cast_possible_truncation)]
    buf.write_u16::<BigEndian>(s.len() as u16)
        .map_err(|_| EncodeError::StringTooLong)?;
    buf.write_all(s.as_bytes())
        .map_err(|_| EncodeError::StringTooLong)?;
    Ok(2 + s.len())
}
