use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use edgemesh_network::stream::Stream;
use edgemesh_network::types::NetworkEvent;
use edgemesh_primitives::{AppPeer, AppStatus};
use eyre::{Result as EyreResult, WrapErr};
use libp2p::gossipsub::IdentTopic;
use libp2p::PeerId;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::SyncerConfig;
use crate::error::SyncError;
use crate::overlay::Overlay;
use crate::wire::{self, SyncRequest, SyncResponse, STATUS_TOPIC};

const STATUS_CHANNEL_SIZE: usize = 256;
const PEER_EVENT_CHANNEL_SIZE: usize = 64;
const STREAM_CHANNEL_SIZE: usize = 16;

/// An inbound sync-protocol stream handed over to the service.
pub type IncomingStream = (PeerId, Box<Stream>);

/// Overlay connection changes, as consumed by the connection tracker.
#[derive(Copy, Clone, Debug)]
pub(crate) enum PeerEvent {
    Connected(PeerId),
    Disconnected(PeerId),
}

/// Outbound half of the sync subsystem.
///
/// Owns the overlay event feed: one routing loop splits it into status
/// updates (for the fan-in), connection events (for the tracker) and
/// inbound streams (for the service).
pub struct SyncAppClient {
    overlay: Arc<dyn Overlay>,
    config: SyncerConfig,

    cancel: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
    subscribed: AtomicBool,

    events: Mutex<Option<mpsc::Receiver<NetworkEvent>>>,

    status_tx: Mutex<Option<mpsc::Sender<AppPeer>>>,
    status_rx: Mutex<Option<mpsc::Receiver<AppPeer>>>,
    peer_event_tx: mpsc::Sender<PeerEvent>,
    peer_event_rx: Mutex<Option<mpsc::Receiver<PeerEvent>>>,
    stream_tx: mpsc::Sender<IncomingStream>,
    stream_rx: Mutex<Option<mpsc::Receiver<IncomingStream>>>,
}

impl SyncAppClient {
    pub fn new(
        overlay: Arc<dyn Overlay>,
        events: mpsc::Receiver<NetworkEvent>,
        config: SyncerConfig,
    ) -> Self {
        let (status_tx, status_rx) = mpsc::channel(STATUS_CHANNEL_SIZE);
        let (peer_event_tx, peer_event_rx) = mpsc::channel(PEER_EVENT_CHANNEL_SIZE);
        let (stream_tx, stream_rx) = mpsc::channel(STREAM_CHANNEL_SIZE);

        Self {
            overlay,
            config,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
            subscribed: AtomicBool::new(false),
            events: Mutex::new(Some(events)),
            status_tx: Mutex::new(Some(status_tx)),
            status_rx: Mutex::new(Some(status_rx)),
            peer_event_tx,
            peer_event_rx: Mutex::new(Some(peer_event_rx)),
            stream_tx,
            stream_rx: Mutex::new(Some(stream_rx)),
        }
    }

    /// Subscribe to the status topic (when asked to) and spawn the event
    /// routing loop. A second call fails with [`SyncError::AlreadyStarted`].
    pub async fn start(&self, subscribe_topic: bool) -> EyreResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyStarted.into());
        }

        if subscribe_topic {
            self.overlay
                .subscribe(IdentTopic::new(STATUS_TOPIC))
                .await
                .wrap_err("failed to subscribe to the status topic")?;

            self.subscribed.store(true, Ordering::SeqCst);
        }

        let events = take(&self.events)
            .ok_or_else(|| SyncError::Internal("overlay event feed already consumed".to_owned()))?;

        let status_tx = self
            .status_sender()
            .ok_or_else(|| SyncError::Internal("status channel already closed".to_owned()))?;

        let _handle = self.tracker.spawn(route_events(
            events,
            self.overlay.local_peer_id(),
            status_tx,
            self.peer_event_tx.clone(),
            self.stream_tx.clone(),
            self.cancel.clone(),
        ));

        Ok(())
    }

    /// The read end of the status update channel. Yields `Some` exactly
    /// once.
    pub fn status_update_receiver(&self) -> Option<mpsc::Receiver<AppPeer>> {
        take(&self.status_rx)
    }

    pub(crate) fn peer_event_receiver(&self) -> Option<mpsc::Receiver<PeerEvent>> {
        take(&self.peer_event_rx)
    }

    pub(crate) fn stream_receiver(&self) -> Option<mpsc::Receiver<IncomingStream>> {
        take(&self.stream_rx)
    }

    pub(crate) fn status_sender(&self) -> Option<mpsc::Sender<AppPeer>> {
        self.status_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Poll every currently-connected peer for its status, with a
    /// per-peer timeout. Failures are logged and omitted from the result.
    pub async fn get_connected_peer_statuses(&self) -> Vec<AppPeer> {
        let mut peers = self.overlay.connected_peers().await;
        peers.shuffle(&mut rand::thread_rng());

        let local = self.overlay.local_peer_id();
        let mut statuses = Vec::new();

        for peer_id in peers {
            if peer_id == local {
                continue;
            }

            match timeout(self.config.status_timeout, self.get_peer_status(peer_id)).await {
                Ok(Ok(status)) => statuses.push(status),
                Ok(Err(err)) => debug!(%peer_id, %err, "Failed to fetch peer status"),
                Err(_) => debug!(%peer_id, "Timed out fetching peer status"),
            }
        }

        statuses
    }

    /// One `GetStatus` round trip to `peer_id`.
    pub async fn get_peer_status(&self, peer_id: PeerId) -> EyreResult<AppPeer> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Shutdown.into());
        }

        let mut stream = self.overlay.open_stream(peer_id).await?;

        wire::send(&mut stream, &SyncRequest::GetStatus).await?;

        let response: SyncResponse = wire::recv(&mut stream, self.config.status_timeout)
            .await?
            .ok_or(SyncError::PeerGone)?;

        match response {
            SyncResponse::Status(status) => Ok(status
                .into_peer()
                .map_err(|err| SyncError::Decode(err.to_string()))?),
            SyncResponse::Error(status) => Err(SyncError::from(status).into()),
            other => Err(SyncError::Decode(format!("unexpected response: {other:?}")).into()),
        }
    }

    /// Announce ourselves to `peer_id` and hand back the keep-alive
    /// stream of result records.
    pub async fn post_app_status(&self, peer_id: PeerId) -> EyreResult<Stream> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Shutdown.into());
        }

        let mut stream = self.overlay.open_stream(peer_id).await?;

        wire::send(
            &mut stream,
            &SyncRequest::PostStatus {
                node_id: self.overlay.local_peer_id().to_string(),
            },
        )
        .await?;

        Ok(stream)
    }

    /// Broadcast `status` on the status topic.
    pub async fn publish_application_status(&self, status: AppStatus) -> EyreResult<()> {
        let data = serde_json::to_vec(&status)?;

        self.overlay
            .publish(IdentTopic::new(STATUS_TOPIC).hash(), data)
            .await?;

        debug!(
            node_id = %status.node_id,
            addr = %status.addr,
            mac = %status.mac,
            "App status published"
        );

        Ok(())
    }

    /// Stop the routing loop, close the status update channel and release
    /// the topic subscription.
    pub async fn close(&self) {
        self.cancel.cancel();

        drop(take(&self.status_tx));

        if self.subscribed.swap(false, Ordering::SeqCst) {
            if let Err(err) = self.overlay.unsubscribe(IdentTopic::new(STATUS_TOPIC)).await {
                debug!(%err, "Failed to unsubscribe from the status topic");
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

async fn route_events(
    mut events: mpsc::Receiver<NetworkEvent>,
    local_peer_id: PeerId,
    status_tx: mpsc::Sender<AppPeer>,
    peer_event_tx: mpsc::Sender<PeerEvent>,
    stream_tx: mpsc::Sender<IncomingStream>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };

                match event {
                    NetworkEvent::Message { message, .. } => {
                        ingest_status(&local_peer_id, &message.data, &status_tx).await;
                    }
                    NetworkEvent::PeerConnected { peer_id } => {
                        let _ = peer_event_tx.send(PeerEvent::Connected(peer_id)).await;
                    }
                    NetworkEvent::PeerDisconnected { peer_id } => {
                        let _ = peer_event_tx.send(PeerEvent::Disconnected(peer_id)).await;
                    }
                    NetworkEvent::StreamOpened { peer_id, stream } => {
                        let _ = stream_tx.send((peer_id, stream)).await;
                    }
                    NetworkEvent::ListeningOn { address, .. } => {
                        info!(%address, "Overlay listening");
                    }
                    NetworkEvent::Subscribed { peer_id, topic } => {
                        debug!(%peer_id, %topic, "Peer subscribed");
                    }
                }
            }
        }
    }

    debug!("event routing loop stopped");
}

/// Decode and screen one status broadcast, then push it down the update
/// channel. Blocks when the channel is full; broadcasts are never
/// silently dropped past this point.
async fn ingest_status(local_peer_id: &PeerId, data: &[u8], status_tx: &mpsc::Sender<AppPeer>) {
    let status: AppStatus = match serde_json::from_slice(data) {
        Ok(status) => status,
        Err(err) => {
            debug!(%err, "Discarding undecodable status broadcast");
            return;
        }
    };

    if status.node_id == local_peer_id.to_string() {
        debug!("Ignoring own status broadcast");
        return;
    }

    match status.into_peer() {
        Ok(peer) => {
            if status_tx.send(peer).await.is_err() {
                debug!("Status update channel closed, dropping broadcast");
            }
        }
        Err(err) => debug!(%err, "Discarding invalid status broadcast"),
    }
}
