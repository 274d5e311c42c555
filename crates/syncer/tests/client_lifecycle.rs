//! Lifecycle and ordering guarantees of the sync client.

use std::sync::Arc;
use std::time::Duration;

use edgemesh_network::types::NetworkEvent;
use edgemesh_primitives::AppStatus;
use edgemesh_syncer::wire::STATUS_TOPIC;
use edgemesh_syncer::{SyncAppClient, SyncError, SyncerConfig};
use libp2p::gossipsub::{IdentTopic, Message as GossipMessage, MessageId, TopicHash};
use libp2p::PeerId;
use tokio::sync::mpsc;
use tokio::time::timeout;

mod support;

use support::{status_for, FakeOverlay};

fn client(overlay: Arc<FakeOverlay>) -> (SyncAppClient, mpsc::Sender<NetworkEvent>) {
    let (events_tx, events_rx) = mpsc::channel(32);
    let config = SyncerConfig {
        status_timeout: Duration::from_millis(300),
        ..SyncerConfig::default()
    };

    (SyncAppClient::new(overlay, events_rx, config), events_tx)
}

fn gossip_event(status: &AppStatus) -> NetworkEvent {
    NetworkEvent::Message {
        id: MessageId::from(b"m".to_vec()),
        message: GossipMessage {
            source: None,
            data: serde_json::to_vec(status).unwrap(),
            sequence_number: None,
            topic: TopicHash::from_raw(STATUS_TOPIC),
        },
    }
}

#[tokio::test]
async fn second_start_is_rejected() {
    let (client, _events) = client(FakeOverlay::new());

    client.start(true).await.unwrap();

    let second = client.start(true).await.unwrap_err();
    assert!(matches!(
        second.downcast_ref::<SyncError>(),
        Some(SyncError::AlreadyStarted)
    ));

    client.close().await;
}

#[tokio::test]
async fn rpcs_fail_after_close() {
    let overlay = FakeOverlay::new();
    let peer_id = overlay.add_remote(status_for(&PeerId::random()));

    let (client, _events) = client(overlay);
    client.start(false).await.unwrap();
    client.close().await;

    let status = client.get_peer_status(peer_id).await.unwrap_err();
    assert!(matches!(
        status.downcast_ref::<SyncError>(),
        Some(SyncError::Shutdown)
    ));

    let post = client.post_app_status(peer_id).await.unwrap_err();
    assert!(matches!(
        post.downcast_ref::<SyncError>(),
        Some(SyncError::Shutdown)
    ));
}

#[tokio::test]
async fn update_channel_preserves_arrival_order() {
    let overlay = FakeOverlay::new();
    let (client, events) = client(overlay);

    let mut updates = client.status_update_receiver().unwrap();
    assert!(client.status_update_receiver().is_none());

    client.start(true).await.unwrap();

    let peer_id = PeerId::random();
    for uptime in [5, 3, 9] {
        let mut status = status_for(&peer_id);
        status.uptime = uptime;
        events.send(gossip_event(&status)).await.unwrap();
    }

    // arrival order on the wire, not any peer-reported ordering
    for expected in [5, 3, 9] {
        let update = timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.peer_id, peer_id);
        assert_eq!(update.uptime, expected);
    }

    client.close().await;

    // closing the client closes the update channel
    assert!(timeout(Duration::from_secs(1), updates.recv())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn publish_targets_the_status_topic() {
    let overlay = FakeOverlay::new();
    let (client, _events) = client(overlay.clone());

    client.start(false).await.unwrap();

    let status = status_for(&overlay.local());
    client.publish_application_status(status.clone()).await.unwrap();

    let published = overlay.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, IdentTopic::new(STATUS_TOPIC).hash());

    let decoded: AppStatus = serde_json::from_slice(&published[0].1).unwrap();
    assert_eq!(decoded, status);

    drop(published);
    client.close().await;
}

#[tokio::test]
async fn poll_fetches_statuses_from_connected_peers() {
    let overlay = FakeOverlay::new();
    let first = overlay.add_remote(status_for(&PeerId::random()));
    let second = overlay.add_remote(status_for(&PeerId::random()));
    let _silent = overlay.add_silent_remote();

    let (client, _events) = client(overlay);
    client.start(false).await.unwrap();

    let statuses = client.get_connected_peer_statuses().await;

    let mut ids: Vec<_> = statuses.iter().map(|status| status.peer_id).collect();
    ids.sort_unstable();
    let mut expected = vec![first, second];
    expected.sort_unstable();

    assert_eq!(ids, expected);

    client.close().await;
}
