use async_trait::async_trait;
use edgemesh_network::client::NetworkClient;
use edgemesh_network::stream::{Stream, APPSYNC_PROTOCOL};
use eyre::Result as EyreResult;
use libp2p::gossipsub::{IdentTopic, TopicHash};
use libp2p::{Multiaddr, PeerId};

/// The overlay transport as the sync subsystem sees it.
///
/// Production code goes through the libp2p [`NetworkClient`]; tests swap
/// in a scripted fake.
#[async_trait]
pub trait Overlay: Send + Sync + 'static {
    fn local_peer_id(&self) -> PeerId;

    async fn listen_addrs(&self) -> Vec<Multiaddr>;

    async fn connected_peers(&self) -> Vec<PeerId>;

    async fn subscribe(&self, topic: IdentTopic) -> EyreResult<()>;

    async fn unsubscribe(&self, topic: IdentTopic) -> EyreResult<()>;

    async fn publish(&self, topic: TopicHash, data: Vec<u8>) -> EyreResult<()>;

    /// Open an appsync-protocol stream to `peer_id`.
    async fn open_stream(&self, peer_id: PeerId) -> EyreResult<Stream>;
}

#[async_trait]
impl Overlay for NetworkClient {
    fn local_peer_id(&self) -> PeerId {
        Self::local_peer_id(self)
    }

    async fn listen_addrs(&self) -> Vec<Multiaddr> {
        Self::listen_addrs(self).await.unwrap_or_default()
    }

    async fn connected_peers(&self) -> Vec<PeerId> {
        Self::connected_peers(self).await.unwrap_or_default()
    }

    async fn subscribe(&self, topic: IdentTopic) -> EyreResult<()> {
        let _topic = Self::subscribe(self, topic).await?;
        Ok(())
    }

    async fn unsubscribe(&self, topic: IdentTopic) -> EyreResult<()> {
        let _topic = Self::unsubscribe(self, topic).await?;
        Ok(())
    }

    async fn publish(&self, topic: TopicHash, data: Vec<u8>) -> EyreResult<()> {
        let _id = Self::publish(self, topic, data).await?;
        Ok(())
    }

    async fn open_stream(&self, peer_id: PeerId) -> EyreResult<Stream> {
        Self::open_stream(self, peer_id, APPSYNC_PROTOCOL).await
    }
}
