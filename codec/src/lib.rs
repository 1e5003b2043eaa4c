//! Wire codec for the MQTT 3.1.1 subset this broker speaks: CONNECT through
//! DISCONNECT, QoS 0/1 publishes, and the wildcard topic filter grammar.
//! QoS 2 and the MQTT 5 packet types are out of scope; see the broker crate
//! for how QoS 2 SUBSCRIBE requests get downgraded at session level.

mod base;
mod byte_array;
mod connect;
mod connect_ack;
mod disconnect;
mod error;
mod header;
mod pingreq;
mod pingresp;
mod puback;
mod publish;
mod suback;
mod subscribe;
mod topic;
mod unsuback;
mod unsubscribe;
mod var_int;

mod packet;

pub use base::{encode_string, DecodePacket, EncodePacket, PacketId, QoS};
pub use byte_array::ByteArray;
pub use connect::{ConnectFlags, ConnectPacket};
pub use connect_ack::{ConnectAckPacket, ConnectReturnCode};
pub use disconnect::DisconnectPacket;
pub use error::{DecodeError, EncodeError};
pub use header::{FixedHeader, PacketType};
pub use packet::Packet;
pub use pingreq::PingRequestPacket;
pub use pingresp::PingResponsePacket;
pub use puback::PublishAckPacket;
pub use publish::PublishPacket;
pub use suback::{SubscribeAckPacket, SubscribeReturnCode};
pub use subscribe::{SubscribePacket, SubscribeTopic};
pub use topic::{validate_topic_name, TopicError, TopicFilter};
pub use unsuback::UnsubscribeAckPacket;
pub use unsubscribe::UnsubscribePacket;
pub use var_int::{VarInt, MAX_PACKET_LEN};
