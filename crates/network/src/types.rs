use libp2p::core::transport::ListenerId;
pub use libp2p::gossipsub::{IdentTopic, Message, MessageId, TopicHash};
use libp2p::Multiaddr;
pub use libp2p::PeerId;

use crate::stream::Stream;

/// Events surfaced by the overlay event loop.
#[derive(Debug)]
pub enum NetworkEvent {
    ListeningOn {
        listener_id: ListenerId,
        address: Multiaddr,
    },
    Subscribed {
        peer_id: PeerId,
        topic: TopicHash,
    },
    Message {
        id: MessageId,
        message: Message,
    },
    /// First connection to `peer_id` established.
    PeerConnected {
        peer_id: PeerId,
    },
    /// Last connection to `peer_id` closed.
    PeerDisconnected {
        peer_id: PeerId,
    },
    /// A remote peer opened a sync-protocol stream to us.
    StreamOpened {
        peer_id: PeerId,
        stream: Box<Stream>,
    },
}
