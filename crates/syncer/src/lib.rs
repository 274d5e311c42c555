//! The application peer synchronization subsystem.
//!
//! Keeps a live view of remote application peers across the overlay,
//! broadcasts this node's own status on a fixed cadence, and serves the
//! point-to-point status and data-fetch streams.
//!
//! ```text
//! overlay ──► SyncAppClient ──► fan-in ──► PeerMap ──► new-status signal
//!    ▲              │                          ▲
//!    │              ├──► ConnectionTracker ────┘ (evicts on disconnect)
//!    │              └──► SyncAppService (one task per inbound stream)
//!    └── publisher tick (own AppStatus)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use edgemesh_primitives::{AppPeer, AppStatus};
use eyre::{eyre, Result as EyreResult};
use futures_util::StreamExt;
use libp2p::PeerId;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

pub mod client;
pub mod config;
pub mod error;
pub mod overlay;
pub mod peer_map;
pub mod service;
pub mod store;
mod tracker;
pub mod wire;

pub use client::SyncAppClient;
pub use config::SyncerConfig;
pub use error::SyncError;
pub use overlay::Overlay;
pub use peer_map::PeerMap;
pub use service::SyncAppService;
pub use store::{ApplicationStore, BlockchainStore};

use tracker::ConnectionTracker;
use wire::SyncResponse;

/// Orchestrates the sync components and owns their lifecycle.
pub struct Syncer {
    config: SyncerConfig,
    overlay: Arc<dyn Overlay>,
    app_store: Arc<dyn ApplicationStore>,

    client: Arc<SyncAppClient>,
    service: Arc<SyncAppService>,
    peer_map: Arc<PeerMap>,

    /// Best block number each peer reported over its keep-alive stream.
    peers_block_num: Arc<Mutex<HashMap<PeerId, u64>>>,

    new_status_tx: Mutex<Option<mpsc::Sender<()>>>,
    new_status_rx: Mutex<Option<mpsc::Receiver<()>>>,

    cancel: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
}

impl Syncer {
    pub fn new(
        client: SyncAppClient,
        service: SyncAppService,
        overlay: Arc<dyn Overlay>,
        app_store: Arc<dyn ApplicationStore>,
        config: SyncerConfig,
    ) -> Self {
        let (new_status_tx, new_status_rx) = mpsc::channel(1);

        Self {
            config,
            overlay,
            app_store,
            client: Arc::new(client),
            service: Arc::new(service),
            peer_map: Arc::new(PeerMap::new()),
            peers_block_num: Arc::new(Mutex::new(HashMap::new())),
            new_status_tx: Mutex::new(Some(new_status_tx)),
            new_status_rx: Mutex::new(Some(new_status_rx)),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Start every background process. Returns once they are spawned.
    pub async fn start(&self, subscribe_topic: bool) -> EyreResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyStarted.into());
        }

        self.client.start(subscribe_topic).await?;

        let streams = self
            .client
            .stream_receiver()
            .ok_or_else(|| eyre!("inbound stream feed already consumed"))?;
        self.service.start(streams)?;

        let status_rx = self
            .client
            .status_update_receiver()
            .ok_or_else(|| eyre!("status update channel already consumed"))?;
        let peer_events = self
            .client
            .peer_event_receiver()
            .ok_or_else(|| eyre!("peer event feed already consumed"))?;
        let probe_tx = self
            .client
            .status_sender()
            .ok_or_else(|| eyre!("status channel already closed"))?;

        let signal = self
            .new_status_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let _fan_in = self.tracker.spawn(fan_in(
            status_rx,
            Arc::clone(&self.peer_map),
            self.overlay.local_peer_id(),
            signal,
        ));

        let connection_tracker = ConnectionTracker {
            peer_map: Arc::clone(&self.peer_map),
            client: Arc::clone(&self.client),
            status_tx: probe_tx,
            config: self.config,
            cancel: self.cancel.clone(),
            tracker: self.tracker.clone(),
        };
        let _tracker = self.tracker.spawn(connection_tracker.run(peer_events));

        let _publisher = self.tracker.spawn(publish_loop(
            Arc::clone(&self.overlay),
            Arc::clone(&self.app_store),
            Arc::clone(&self.client),
            self.config,
            self.cancel.clone(),
        ));

        // seed the map from peers that were connected before we came up
        let client = Arc::clone(&self.client);
        let peer_map = Arc::clone(&self.peer_map);
        let cancel = self.cancel.clone();
        let _seed = self.tracker.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                statuses = client.get_connected_peer_statuses() => {
                    peer_map.put_all(statuses);
                }
            }
        });

        info!("App syncer started");

        Ok(())
    }

    /// Snapshot of one known peer.
    pub fn get_app_peer(&self, peer_id: &PeerId) -> Option<AppPeer> {
        self.peer_map.get(peer_id)
    }

    /// Snapshot of every known peer.
    pub fn peers(&self) -> Vec<AppPeer> {
        self.peer_map.snapshot()
    }

    /// Best block number `peer_id` reported over its keep-alive stream.
    pub fn peer_block_number(&self, peer_id: &PeerId) -> Option<u64> {
        self.peers_block_num
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer_id)
            .copied()
    }

    /// The edge-triggered "peer map changed" signal. Lossy: consumers must
    /// re-check the map on every wake. Yields `Some` exactly once.
    pub fn take_new_status_signal(&self) -> Option<mpsc::Receiver<()>> {
        self.new_status_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Publish our status now, outside the regular cadence.
    pub async fn publish_app_status(&self) {
        do_publish_app_status(&*self.overlay, &*self.app_store, &self.client).await;
    }

    /// Announce ourselves to `peer_id` and track the block numbers it
    /// reports over the keep-alive stream.
    pub async fn post_app_status(&self, peer_id: PeerId) -> EyreResult<()> {
        let mut stream = self.client.post_app_status(peer_id).await?;

        let blocks = Arc::clone(&self.peers_block_num);
        let cancel = self.cancel.clone();

        let _handle = self.tracker.spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    frame = stream.next() => {
                        let Some(Ok(message)) = frame else { break };

                        match serde_json::from_slice::<SyncResponse>(&message.data) {
                            Ok(SyncResponse::Result { data }) => {
                                if let Ok(number) = data.parse::<u64>() {
                                    let _ = blocks
                                        .lock()
                                        .unwrap_or_else(PoisonError::into_inner)
                                        .insert(peer_id, number);
                                }
                            }
                            Ok(SyncResponse::Error(status)) => {
                                debug!(%peer_id, ?status, "Keep-alive stream closed by peer");
                                break;
                            }
                            Ok(_) => {}
                            Err(err) => debug!(%peer_id, %err, "Undecodable keep-alive record"),
                        }
                    }
                }
            }

            debug!(%peer_id, "Keep-alive stream finished");
        });

        Ok(())
    }

    /// Tear everything down. The signal closes first, then the service
    /// (cancelling in-flight streams), then the client (closing the update
    /// channel, which ends the fan-in).
    pub async fn close(&self) -> EyreResult<()> {
        info!("Closing app syncer");

        drop(
            self.new_status_tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        self.cancel.cancel();

        let shutdown = async {
            self.service.close().await;
            self.client.close().await;
            self.tracker.close();
            self.tracker.wait().await;
        };

        timeout(self.config.shutdown_deadline, shutdown)
            .await
            .map_err(|_| {
                eyre!(
                    "background tasks did not stop within {:?}",
                    self.config.shutdown_deadline
                )
            })?;

        Ok(())
    }
}

/// Serializes every status update into the peer map, pulsing the
/// new-status signal after each write. Exits when the update channel
/// closes.
async fn fan_in(
    mut status_rx: mpsc::Receiver<AppPeer>,
    peer_map: Arc<PeerMap>,
    local_peer_id: PeerId,
    signal: Option<mpsc::Sender<()>>,
) {
    while let Some(status) = status_rx.recv().await {
        if status.peer_id == local_peer_id {
            debug!("Refusing to track ourselves in the peer map");
            continue;
        }

        peer_map.put(status);

        if let Some(signal) = &signal {
            // at most one pulse outstanding; extra pulses coalesce
            let _ = signal.try_send(());
        }
    }

    debug!("status fan-in stopped");
}

async fn publish_loop(
    overlay: Arc<dyn Overlay>,
    app_store: Arc<dyn ApplicationStore>,
    client: Arc<SyncAppClient>,
    config: SyncerConfig,
    cancel: CancellationToken,
) {
    // first tick fires immediately; the ticker dies with this task
    let mut ticker = interval(config.publish_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                do_publish_app_status(&*overlay, &*app_store, &client).await;
            }
        }
    }

    debug!("status publisher stopped");
}

async fn do_publish_app_status(
    overlay: &dyn Overlay,
    app_store: &dyn ApplicationStore,
    client: &SyncAppClient,
) {
    let app = app_store.endpoint_application();
    let addr = overlay
        .listen_addrs()
        .await
        .first()
        .map(ToString::to_string)
        .unwrap_or_default();

    let status = AppStatus::from_application(&app, addr);

    if let Err(err) = client.publish_application_status(status).await {
        debug!(%err, "Failed to publish app status, retrying next tick");
    }
}
