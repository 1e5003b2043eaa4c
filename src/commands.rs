use nas_panel_codec::{
    ConnectPacket, PacketId, PublishPacket, SubscribeAckPacket, SubscribePacket,
    UnsubscribeAckPacket, UnsubscribePacket,
};

use crate::document::MetricDocument;
use crate::types::SessionId;

/// Sent from a per-connection session task to the broker core. The broker
/// holds the single coarse lock over session table, subscription index,
/// and retained store; every mutation enters through this channel.
#[derive(Debug, Clone)]
pub enum SessionToBrokerCmd {
    Connect(SessionId, ConnectPacket, String),
    Publish(SessionId, PublishPacket),
    Subscribe(SessionId, SubscribePacket),
    Unsubscribe(SessionId, UnsubscribePacket),
    PingRequest(SessionId),
    /// The client sent DISCONNECT: drop its will, no will publish.
    Disconnect(SessionId),
    /// The connection ended some other way -- EOF, a malformed packet, or
    /// keep-alive expiry: publish the will if one was configured.
    Closed(SessionId),
}

/// Sent from the broker core to one session's outbound queue.
#[derive(Debug, Clone)]
pub enum BrokerToSessionCmd {
    ConnectAck(nas_panel_codec::ConnectAckPacket),
    Publish(PublishPacket),
    PublishAck(PacketId),
    SubscribeAck(SubscribeAckPacket),
    UnsubscribeAck(UnsubscribeAckPacket),
    PingResponse,
    /// The broker is closing this session (duplicate client id, protocol
    /// violation, or shutdown); no further packets will follow.
    Kick,
}

/// Sent from the scheduler to the broker core once per tick, carrying the
/// freshly-collected document to fan out (and retain) on the configured
/// publish topic.
#[derive(Debug, Clone)]
pub struct SchedulerToBrokerCmd {
    pub topic: String,
    pub document: MetricDocument,
}
