//! Scripted overlay and collaborator fakes for driving the syncer
//! without a real swarm.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use edgemesh_network::stream::{Message, Stream};
use edgemesh_primitives::application::Application;
use edgemesh_primitives::chain::{Block, Header, Receipt};
use edgemesh_primitives::{AppStatus, Hash};
use edgemesh_syncer::wire::{SyncRequest, SyncResponse};
use edgemesh_syncer::{ApplicationStore, BlockchainStore, Overlay};
use eyre::{bail, Result as EyreResult};
use futures_util::{SinkExt, StreamExt};
use libp2p::gossipsub::{IdentTopic, TopicHash};
use libp2p::{Multiaddr, PeerId};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// How a scripted remote answers an opened stream.
#[derive(Clone)]
pub enum Remote {
    /// Answers `GetStatus` with this status.
    Responsive(AppStatus),
    /// Accepts the stream and never sends anything.
    Silent,
}

pub struct FakeOverlay {
    local: PeerId,
    listen: Mutex<Vec<Multiaddr>>,
    pub published: Mutex<Vec<(TopicHash, Vec<u8>)>>,
    pub subscriptions: Mutex<Vec<String>>,
    connected: Mutex<Vec<PeerId>>,
    remotes: Mutex<HashMap<PeerId, Remote>>,
}

impl FakeOverlay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            local: PeerId::random(),
            listen: Mutex::new(vec!["/ip4/127.0.0.1/tcp/6374".parse().unwrap()]),
            published: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            connected: Mutex::new(Vec::new()),
            remotes: Mutex::new(HashMap::new()),
        })
    }

    pub fn local(&self) -> PeerId {
        self.local
    }

    /// Register a connected remote that answers `GetStatus`.
    pub fn add_remote(&self, status: AppStatus) -> PeerId {
        let peer_id: PeerId = status.node_id.parse().unwrap();
        self.connected.lock().unwrap().push(peer_id);
        self.remotes
            .lock()
            .unwrap()
            .insert(peer_id, Remote::Responsive(status));
        peer_id
    }

    /// Register a connected remote that never answers.
    pub fn add_silent_remote(&self) -> PeerId {
        let peer_id = PeerId::random();
        self.connected.lock().unwrap().push(peer_id);
        self.remotes.lock().unwrap().insert(peer_id, Remote::Silent);
        peer_id
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Overlay for FakeOverlay {
    fn local_peer_id(&self) -> PeerId {
        self.local
    }

    async fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.listen.lock().unwrap().clone()
    }

    async fn connected_peers(&self) -> Vec<PeerId> {
        self.connected.lock().unwrap().clone()
    }

    async fn subscribe(&self, topic: IdentTopic) -> EyreResult<()> {
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: IdentTopic) -> EyreResult<()> {
        self.subscriptions
            .lock()
            .unwrap()
            .retain(|subscribed| *subscribed != topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: TopicHash, data: Vec<u8>) -> EyreResult<()> {
        self.published.lock().unwrap().push((topic, data));
        Ok(())
    }

    async fn open_stream(&self, peer_id: PeerId) -> EyreResult<Stream> {
        let remote = self.remotes.lock().unwrap().get(&peer_id).cloned();

        let Some(remote) = remote else {
            bail!("peer {peer_id} is not connected");
        };

        let (caller_io, remote_io) = tokio::io::duplex(64 * 1024);

        let _server = tokio::spawn(async move {
            let mut stream = Stream::from_io(remote_io);

            let Remote::Responsive(status) = remote else {
                // hold the stream open without answering
                std::future::pending::<()>().await;
                return;
            };

            while let Some(Ok(frame)) = stream.next().await {
                let Ok(request) = serde_json::from_slice::<SyncRequest>(&frame.data) else {
                    break;
                };

                match request {
                    SyncRequest::GetStatus => {
                        send_frame(&mut stream, &SyncResponse::Status(status.clone())).await;
                    }
                    SyncRequest::PostStatus { .. } => {
                        send_frame(
                            &mut stream,
                            &SyncResponse::Result {
                                data: "7".to_owned(),
                            },
                        )
                        .await;
                    }
                    SyncRequest::GetData { .. } => {
                        send_frame(
                            &mut stream,
                            &SyncResponse::Error(edgemesh_syncer::wire::CloseStatus::NotFound),
                        )
                        .await;
                    }
                }
            }
        });

        Ok(Stream::from_io(caller_io))
    }
}

pub async fn send_frame<T: Serialize>(stream: &mut Stream, message: &T) {
    let encoded = serde_json::to_vec(message).unwrap();
    stream.send(Message::new(encoded)).await.unwrap();
}

pub async fn recv_frame<T: DeserializeOwned>(stream: &mut Stream) -> Option<T> {
    let frame = stream.next().await?.ok()?;
    Some(serde_json::from_slice(&frame.data).unwrap())
}

pub struct FakeAppStore {
    app: Application,
}

impl FakeAppStore {
    pub fn new(peer_id: PeerId) -> Arc<Self> {
        Arc::new(Self {
            app: Application {
                name: "llama-svc".to_owned(),
                tag: "edge".to_owned(),
                version: "1.2.0".to_owned(),
                peer_id,
                app_origin: "llama".to_owned(),
                model_hash: "m-abc123".to_owned(),
                ip_addr: String::new(),
                mac: "aa:bb:cc:dd:ee:ff".to_owned(),
                mem_info: "64GiB".to_owned(),
                cpu_info: "16-core".to_owned(),
                gpu_info: "rtx-4090".to_owned(),
                average_power: 0.5,
                startup_time: 1_700_000_000,
                uptime: 60,
                gauge_height: 0,
                gauge_max: 4,
                signing_key: "edge-key".to_owned(),
            },
        })
    }
}

impl ApplicationStore for FakeAppStore {
    fn endpoint_application(&self) -> Application {
        self.app.clone()
    }
}

/// A chain holding at most one block.
#[derive(Default)]
pub struct FakeChain {
    block: Option<(Block, Vec<Receipt>)>,
}

impl FakeChain {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_block(block: Block, receipts: Vec<Receipt>) -> Arc<Self> {
        Arc::new(Self {
            block: Some((block, receipts)),
        })
    }
}

impl BlockchainStore for FakeChain {
    fn header(&self) -> Option<Header> {
        self.block.as_ref().map(|(block, _)| block.header.clone())
    }

    fn get_header_by_number(&self, number: u64) -> Option<Header> {
        self.header().filter(|header| header.number == number)
    }

    fn get_block_by_hash(&self, hash: &Hash, _full: bool) -> Option<Block> {
        self.block
            .as_ref()
            .filter(|(block, _)| block.header.hash == *hash)
            .map(|(block, _)| block.clone())
    }

    fn get_block_by_number(&self, number: u64, _full: bool) -> Option<Block> {
        self.block
            .as_ref()
            .filter(|(block, _)| block.header.number == number)
            .map(|(block, _)| block.clone())
    }

    fn read_tx_lookup(&self, tx_hash: &Hash) -> Option<Hash> {
        let (block, _) = self.block.as_ref()?;
        block
            .transactions
            .iter()
            .any(|tx| tx.hash == *tx_hash)
            .then_some(block.header.hash)
    }

    fn get_receipts_by_hash(&self, hash: &Hash) -> EyreResult<Vec<Receipt>> {
        Ok(self
            .block
            .as_ref()
            .filter(|(block, _)| block.header.hash == *hash)
            .map(|(_, receipts)| receipts.clone())
            .unwrap_or_default())
    }
}

/// A plausible remote status for `peer_id`.
pub fn status_for(peer_id: &PeerId) -> AppStatus {
    AppStatus {
        name: "llama-svc".to_owned(),
        startup_time: 1_700_000_000,
        uptime: 600,
        gauge_height: 0,
        gauge_max: 4,
        relay: String::new(),
        node_id: peer_id.to_string(),
        addr: "/ip4/10.0.0.8/tcp/6374".to_owned(),
        app_origin: "llama".to_owned(),
        model_hash: "m-abc123".to_owned(),
        mac: "aa:bb:cc:dd:ee:01".to_owned(),
        mem_info: "32GiB".to_owned(),
        cpu_info: "8-core".to_owned(),
        average_power: 0.25,
        gpu_info: "rtx-3080".to_owned(),
        version: "1.2.0".to_owned(),
    }
}
