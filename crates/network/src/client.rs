use eyre::{eyre, Result as EyreResult, WrapErr};
use libp2p::gossipsub::{IdentTopic, MessageId, TopicHash};
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use tokio::sync::{mpsc, oneshot};

use crate::stream::Stream;

/// Handle to the overlay event loop.
///
/// Commands are serialized through the loop; stream opening goes straight
/// through a dedicated control handle so a long dial cannot stall the loop.
#[derive(Clone)]
pub struct NetworkClient {
    local_peer_id: PeerId,
    sender: mpsc::Sender<Command>,
    control: libp2p_stream::Control,
}

impl core::fmt::Debug for NetworkClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NetworkClient")
            .field("local_peer_id", &self.local_peer_id)
            .finish_non_exhaustive()
    }
}

impl NetworkClient {
    pub(crate) const fn new(
        local_peer_id: PeerId,
        sender: mpsc::Sender<Command>,
        control: libp2p_stream::Control,
    ) -> Self {
        Self {
            local_peer_id,
            sender,
            control,
        }
    }

    pub const fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    pub async fn listen_on(&self, addr: Multiaddr) -> EyreResult<()> {
        let (sender, receiver) = oneshot::channel();
        self.send(Command::ListenOn { addr, sender }).await?;
        receiver.await?
    }

    pub async fn dial(&self, peer_addr: Multiaddr) -> EyreResult<Option<()>> {
        let (sender, receiver) = oneshot::channel();
        self.send(Command::Dial { peer_addr, sender }).await?;
        receiver.await?
    }

    pub async fn bootstrap(&self) -> EyreResult<Option<()>> {
        let (sender, receiver) = oneshot::channel();
        self.send(Command::Bootstrap { sender }).await?;
        receiver.await?
    }

    pub async fn subscribe(&self, topic: IdentTopic) -> EyreResult<IdentTopic> {
        let (sender, receiver) = oneshot::channel();
        self.send(Command::Subscribe { topic, sender }).await?;
        receiver.await?
    }

    pub async fn unsubscribe(&self, topic: IdentTopic) -> EyreResult<IdentTopic> {
        let (sender, receiver) = oneshot::channel();
        self.send(Command::Unsubscribe { topic, sender }).await?;
        receiver.await?
    }

    pub async fn publish(&self, topic: TopicHash, data: Vec<u8>) -> EyreResult<MessageId> {
        let (sender, receiver) = oneshot::channel();
        self.send(Command::Publish {
            topic,
            data,
            sender,
        })
        .await?;
        receiver.await?
    }

    pub async fn connected_peers(&self) -> EyreResult<Vec<PeerId>> {
        let (sender, receiver) = oneshot::channel();
        self.send(Command::ConnectedPeers { sender }).await?;
        Ok(receiver.await?)
    }

    pub async fn peer_count(&self) -> EyreResult<usize> {
        let (sender, receiver) = oneshot::channel();
        self.send(Command::PeerCount { sender }).await?;
        Ok(receiver.await?)
    }

    pub async fn listen_addrs(&self) -> EyreResult<Vec<Multiaddr>> {
        let (sender, receiver) = oneshot::channel();
        self.send(Command::ListenAddrs { sender }).await?;
        Ok(receiver.await?)
    }

    pub async fn open_stream(
        &self,
        peer_id: PeerId,
        protocol: StreamProtocol,
    ) -> EyreResult<Stream> {
        let stream = self
            .control
            .clone()
            .open_stream(peer_id, protocol)
            .await
            .map_err(|err| eyre!("failed to open stream to {peer_id}: {err}"))?;

        Ok(Stream::new(stream))
    }

    async fn send(&self, command: Command) -> EyreResult<()> {
        self.sender
            .send(command)
            .await
            .wrap_err("network event loop terminated")
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    ListenOn {
        addr: Multiaddr,
        sender: oneshot::Sender<EyreResult<()>>,
    },
    Dial {
        peer_addr: Multiaddr,
        sender: oneshot::Sender<EyreResult<Option<()>>>,
    },
    Bootstrap {
        sender: oneshot::Sender<EyreResult<Option<()>>>,
    },
    Subscribe {
        topic: IdentTopic,
        sender: oneshot::Sender<EyreResult<IdentTopic>>,
    },
    Unsubscribe {
        topic: IdentTopic,
        sender: oneshot::Sender<EyreResult<IdentTopic>>,
    },
    Publish {
        topic: TopicHash,
        data: Vec<u8>,
        sender: oneshot::Sender<EyreResult<MessageId>>,
    },
    ConnectedPeers {
        sender: oneshot::Sender<Vec<PeerId>>,
    },
    PeerCount {
        sender: oneshot::Sender<usize>,
    },
    ListenAddrs {
        sender: oneshot::Sender<Vec<Multiaddr>>,
    },
}
