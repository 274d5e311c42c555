use std::sync::Arc;

use edgemesh_primitives::AppPeer;
use libp2p::PeerId;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::client::{PeerEvent, SyncAppClient};
use crate::config::SyncerConfig;
use crate::peer_map::PeerMap;

/// Reconciles the peer map against overlay connection changes.
///
/// Peer identity is the liveness source of truth; peer-provided
/// timestamps are advisory. An entry appears lazily on the first status,
/// so a connect is a no-op unless eager probing is enabled.
pub(crate) struct ConnectionTracker {
    pub peer_map: Arc<PeerMap>,
    pub client: Arc<SyncAppClient>,
    pub status_tx: mpsc::Sender<AppPeer>,
    pub config: SyncerConfig,
    pub cancel: CancellationToken,
    pub tracker: TaskTracker,
}

impl ConnectionTracker {
    pub(crate) async fn run(self, mut events: mpsc::Receiver<PeerEvent>) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };

                    match event {
                        PeerEvent::Connected(peer_id) => self.on_connected(peer_id),
                        PeerEvent::Disconnected(peer_id) => {
                            debug!(%peer_id, "Peer disconnected, dropping from peer map");
                            self.peer_map.remove(&peer_id);
                        }
                    }
                }
            }
        }

        debug!("connection tracker stopped");
    }

    fn on_connected(&self, peer_id: PeerId) {
        if !self.config.eager_probe || self.peer_map.get(&peer_id).is_some() {
            return;
        }

        let client = Arc::clone(&self.client);
        let status_tx = self.status_tx.clone();
        let cancel = self.cancel.clone();
        let budget = self.config.status_timeout;

        let _handle = self.tracker.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                probed = timeout(budget, client.get_peer_status(peer_id)) => match probed {
                    Ok(Ok(status)) => {
                        let _ = status_tx.send(status).await;
                    }
                    Ok(Err(err)) => debug!(%peer_id, %err, "Eager status probe failed"),
                    Err(_) => debug!(%peer_id, "Eager status probe timed out"),
                }
            }
        });
    }
}
