use std::convert::TryFrom;

use crate::base::{encode_string, DecodePacket, EncodePacket, QoS};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 4;

/// The `ConnectFlags` byte: username/password/will-retain/will-qos/will/clean-session.
/// Bit 0 is reserved and must be zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectFlags {
    pub has_username: bool,
    pub has_password: bool,
    pub will_retain: bool,
    pub will_qos: QoS,
    pub will: bool,
    pub clean_session: bool,
}

impl DecodePacket for ConnectFlags {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let flags = ba.read_byte()?;
        if flags & 0b0000_0001 != 0 {
            return Err(DecodeError::InvalidConnectFlags);
        }
        let has_username = flags & 0b1000_0000 != 0;
        let has_password = flags & 0b0100_0000 != 0;
        if has_password && !has_username {
            return Err(DecodeError::InvalidConnectFlags);
        }
        Ok(Self {
            has_username,
            has_password,
            will_retain: flags & 0b0010_0000 != 0,
            will_qos: QoS::try_from((flags & 0b0001_1000) >> 3)?,
            will: flags & 0b0000_0100 != 0,
            clean_session: flags & 0b0000_0010 != 0,
        })
    }
}

impl EncodePacket for ConnectFlags {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut flags = 0u8;
        flags |= u8::from(self.has_username) << 7;
        flags |= u8::from(self.has_password) << 6;
        flags |= u8::from(self.will_retain) << 5;
        flags |= (self.will_qos as u8) << 3;
        flags |= u8::from(self.will) << 2;
        flags |= u8::from(self.clean_session) << 1;
        buf.push(flags);
        Ok(1)
    }
}

/// CONNECT, decoded from a client's opening packet. `client_id` may be
/// empty here; the session layer is responsible for substituting a
/// server-generated id when `clean_session` allows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    pub flags: ConnectFlags,
    pub keep_alive: u16,
    pub client_id: String,
    pub will_topic: Option<String>,
    pub will_message: Vec<u8>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl DecodePacket for ConnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type != PacketType::Connect {
            return Err(DecodeError::InvalidPacketType);
        }

        let protocol_name = ba.read_string()?;
        if protocol_name != PROTOCOL_NAME {
            return Err(DecodeError::InvalidProtocolName);
        }
        let protocol_level = ba.read_byte()?;
        if protocol_level != PROTOCOL_LEVEL {
            return Err(DecodeError::InvalidProtocolLevel);
        }

        let flags = ConnectFlags::decode(ba)?;
        let keep_alive = ba.read_u16()?;
        let client_id = ba.read_string()?;

        let (will_topic, will_message) = if flags.will {
            (Some(ba.read_string()?), {
                let len = ba.read_u16()? as usize;
                ba.read_bytes(len)?.to_vec()
            })
        } else {
            (None, Vec::new())
        };

        let username = if flags.has_username {
            Some(ba.read_string()?)
        } else {
            None
        };
        let password = if flags.has_password {
            let len = ba.read_u16()? as usize;
            Some(ba.read_bytes(len)?.to_vec())
        } else {
            None
        };

        Ok(Self {
            flags,
            keep_alive,
            client_id,
            will_topic,
            will_message,
            username,
            password,
        })
    }
}

impl EncodePacket for ConnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut body = Vec::new();
        encode_string(PROTOCOL_NAME, &mut body)?;
        body.push(PROTOCOL_LEVEL);
        self.flags.encode(&mut body)?;
        body.extend_from_slice(&self.keep_alive.to_be_bytes());
        encode_string(&self.client_id, &mut body)?;
        if self.flags.will {
            encode_string(self.will_topic.as_deref().unwrap_or(""), &mut body)?;
            if self.will_message.len() > u16::MAX as usize {
                return Err(EncodeError::PayloadTooLarge);
            }
            #[allow(clippy::cast_possible_truncation)]
            body.extend_from_slice(&(self.will_message.len() as u16).to_be_bytes());
            body.extend_from_slice(&self.will_message);
        }
        if let Some(username) = &self.username {
            encode_string(username, &mut body)?;
        }
        if let Some(password) = &self.password {
            #[allow(clippy::cast_possible_truncation)]
            body.extend_from_slice(&(password.len() as u16).to_be_bytes());
            body.extend_from_slice(password);
        }

        let old_len = buf.len();
        let fixed_header = FixedHeader::new(PacketType::Connect, body.len())?;
        fixed_header.encode(buf)?;
        buf.extend_from_slice(&body);
        Ok(buf.len() - old_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_connect() {
        let buf: Vec<u8> = vec![
            0x10, 0x10, // fixed header
            0x00, 0x04, b'M', b'Q', b'T', b'T', // protocol name
            0x04, // level
            0x02, // clean session only
            0x00, 0x3c, // keep alive 60
            0x00, 0x04, b't', b'e', b's', b't', // client id
        ];
        let mut ba = ByteArray::new(&buf);
        let packet = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(packet.client_id, "test");
        assert!(packet.flags.clean_session);
        assert_eq!(packet.keep_alive, 60);
    }

    #[test]
    fn round_trips_with_will_and_auth() {
        let packet = ConnectPacket {
            flags: ConnectFlags {
                has_username: true,
                has_password: true,
                will_retain: true,
                will_qos: QoS::AtLeastOnce,
                will: true,
                clean_session: true,
            },
            keep_alive: 30,
            client_id: "device-1".to_string(),
            will_topic: Some("nas/panel/status".to_string()),
            will_message: b"offline".to_vec(),
            username: Some("admin".to_string()),
            password: Some(b"secret".to_vec()),
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
    }
}
